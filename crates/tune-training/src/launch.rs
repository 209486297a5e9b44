//! Engine that hands a prepared job to an external launcher.
//!
//! Instead of running the optimization loop in-process, [`LaunchPlanTrainer`]
//! writes `launch_plan.json` into the output directory. The plan holds the
//! assembled arguments, the resume point and the tracker environment for the
//! launcher to apply to its worker processes.

use crate::arguments::TrainingArguments;
use crate::dataset::{compute_dataset_id, validate_chat_records, ChatDataset, DatasetId};
use crate::distributed::DistributedContext;
use crate::error::{TrainingError, TrainingResult};
use crate::layout::TrainingLayout;
use crate::trainer::{ResumeFrom, TrainableModel, Trainer};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Model reference passed through to the launcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelHandle {
    pub name: String,
    pub use_cache: bool,
}

impl ModelHandle {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), use_cache: true }
    }
}

impl TrainableModel for ModelHandle {
    fn use_cache(&self) -> bool {
        self.use_cache
    }

    fn set_use_cache(&mut self, enabled: bool) {
        self.use_cache = enabled;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchPlan {
    pub created_at: DateTime<Utc>,
    pub model: ModelHandle,
    pub tokenizer: String,
    pub dataset_id: DatasetId,
    pub num_examples: usize,
    pub world_size: usize,
    pub steps_per_epoch: u64,
    pub total_steps: u64,
    pub resume_from: ResumeFrom,
    pub env: BTreeMap<String, String>,
    pub arguments: TrainingArguments,
}

#[derive(Debug, Clone)]
pub struct LaunchPlanTrainer {
    dist: DistributedContext,
}

impl LaunchPlanTrainer {
    #[must_use]
    pub fn new(dist: DistributedContext) -> Self {
        Self { dist }
    }

    /// Optimizer updates per epoch, counting a trailing partial batch.
    #[must_use]
    pub fn steps_per_epoch(&self, args: &TrainingArguments, num_examples: usize) -> u64 {
        let per_update = args.per_device_train_batch_size * args.gradient_accumulation_steps * self.dist.world_size;
        if per_update == 0 {
            return 0;
        }
        num_examples.div_ceil(per_update) as u64
    }
}

#[async_trait]
impl Trainer for LaunchPlanTrainer {
    type Model = ModelHandle;
    type Tokenizer = String;
    type Dataset = ChatDataset;

    fn id(&self) -> &'static str {
        "launch-plan"
    }

    async fn train(
        &self,
        args: &TrainingArguments,
        tokenizer: &Self::Tokenizer,
        dataset: &Self::Dataset,
        model: &mut Self::Model,
        resume_from: &ResumeFrom,
    ) -> TrainingResult<()> {
        validate_chat_records(dataset)?;
        if !self.dist.is_main_process() {
            debug!(rank = self.dist.rank, "Launch plan is written by rank 0");
            return Ok(());
        }

        let steps_per_epoch = self.steps_per_epoch(args, dataset.len());
        let total_steps = (steps_per_epoch as f64 * args.num_train_epochs).ceil() as u64;

        let plan = LaunchPlan {
            created_at: Utc::now(),
            model: model.clone(),
            tokenizer: tokenizer.clone(),
            dataset_id: compute_dataset_id(dataset)?,
            num_examples: dataset.len(),
            world_size: self.dist.world_size,
            steps_per_epoch,
            total_steps,
            resume_from: resume_from.clone(),
            env: args.tracking.env_pairs().into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            arguments: args.clone(),
        };

        let layout = TrainingLayout::new(args.output_dir.clone());
        std::fs::create_dir_all(layout.output_dir())
            .map_err(|source| TrainingError::WritePath { path: layout.output_dir().to_path_buf(), source })?;
        let path = layout.launch_plan_path();
        std::fs::write(&path, serde_json::to_string_pretty(&plan)?)
            .map_err(|source| TrainingError::WritePath { path: path.clone(), source })?;

        info!(path = %path.display(), total_steps, "Wrote launch plan");
        Ok(())
    }
}
