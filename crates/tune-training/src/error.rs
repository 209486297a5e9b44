use std::path::PathBuf;
use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("invalid training config: {0}")]
    InvalidConfig(String),

    #[error("failed to read {}: {source}", path.display())]
    ReadPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    WritePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv input is missing required column `{column}`")]
    MissingColumn { column: String },

    #[error("csv line {line} has no value for column `{column}`")]
    MissingField { line: u64, column: String },

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("tracking error: {0}")]
    Tracking(String),

    #[error("cannot resume tracked run {run_id}: {reason}")]
    ResumeFailed { run_id: String, reason: String },

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error("trainer error: {0}")]
    Trainer(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
