use crate::arguments::TrainingArguments;
use crate::error::TrainingResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the engine starts from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResumeFrom {
    Fresh,
    Checkpoint { dir: PathBuf },
}

/// Model handle as far as this crate is concerned.
pub trait TrainableModel: Send {
    fn use_cache(&self) -> bool;

    /// Toggle the key/value cache. Memory checkpointing requires it off.
    fn set_use_cache(&mut self, enabled: bool);
}

/// A training engine that owns the optimization loop.
#[async_trait]
pub trait Trainer: Send + Sync {
    type Model: TrainableModel;
    type Tokenizer: Send + Sync;
    type Dataset: Send + Sync;

    fn id(&self) -> &'static str;

    /// Train `model` in place.
    async fn train(
        &self,
        args: &TrainingArguments,
        tokenizer: &Self::Tokenizer,
        dataset: &Self::Dataset,
        model: &mut Self::Model,
        resume_from: &ResumeFrom,
    ) -> TrainingResult<()>;
}
