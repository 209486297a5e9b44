use crate::error::TrainingResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name reported in `report_to` when tracking is active.
pub const TRACKER_REPORT_NAME: &str = "wandb";

/// How `init_run` treats an existing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeMode {
    /// Always start a new run.
    Never,
    /// Reattach to this run or fail.
    Must(String),
}

#[derive(Debug, Clone)]
pub struct RunInit {
    pub project: String,
    /// Local directory the tracker may use for run files.
    pub dir: PathBuf,
    pub resume: ResumeMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedRun {
    pub project: String,
    pub run_id: String,
    pub resumed: bool,
}

/// Client side of an experiment-tracking service.
#[async_trait]
pub trait ExperimentTracker: Send + Sync {
    fn id(&self) -> &'static str;

    async fn login(&self, api_key: &str) -> TrainingResult<()>;

    async fn init_run(&self, init: &RunInit) -> TrainingResult<TrackedRun>;

    /// Fetch `artifact_name` (`name`, `name:latest` or `name:vN`) into a
    /// directory under `dest_root` and return that directory.
    async fn use_artifact(
        &self,
        run: &TrackedRun,
        artifact_name: &str,
        dest_root: &Path,
    ) -> TrainingResult<PathBuf>;

    async fn finish_run(&self, run: &TrackedRun) -> TrainingResult<()>;
}

/// What the engine should upload to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogModel {
    Off,
    Checkpoint,
}

/// Tracker behavior handed to the engine with the training arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingSettings {
    pub project: Option<String>,
    pub log_model: LogModel,
    /// Engines that auto-enable tracking must be told to stay off.
    pub disabled: bool,
    /// Run the engine attaches to. Always set when tracking is active.
    pub run_id: Option<String>,
    /// The run predates this invocation and must already exist.
    pub resumed: bool,
}

impl TrackingSettings {
    #[must_use]
    pub fn disabled() -> Self {
        Self { project: None, log_model: LogModel::Off, disabled: true, run_id: None, resumed: false }
    }

    #[must_use]
    pub fn active(project: String, run_id: String, resumed: bool) -> Self {
        Self { project: Some(project), log_model: LogModel::Checkpoint, disabled: false, run_id: Some(run_id), resumed }
    }

    /// Environment for an engine launched as a child process.
    ///
    /// Apply these to the child's `Command`; the current process environment
    /// is never touched.
    #[must_use]
    pub fn env_pairs(&self) -> Vec<(&'static str, String)> {
        if self.disabled {
            return vec![("WANDB_DISABLED", "true".to_string())];
        }

        let mut pairs = Vec::new();
        if let Some(project) = &self.project {
            pairs.push(("WANDB_PROJECT", project.clone()));
        }
        if self.log_model == LogModel::Checkpoint {
            pairs.push(("WANDB_LOG_MODEL", "checkpoint".to_string()));
        }
        if let Some(run_id) = &self.run_id {
            pairs.push(("WANDB_RUN_ID", run_id.clone()));
            pairs.push(("WANDB_RESUME", if self.resumed { "must" } else { "allow" }.to_string()));
        }
        pairs
    }
}
