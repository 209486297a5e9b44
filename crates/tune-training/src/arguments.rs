use crate::batch::BatchPlan;
use crate::config::{DeepspeedConfig, TrainingConfig};
use crate::resume::ResumeDecision;
use crate::tracking::{TrackingSettings, TRACKER_REPORT_NAME};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Checkpoints kept on disk while tracking is active.
pub const TRACKED_SAVE_TOTAL_LIMIT: u32 = 20;

/// Padding for the sequence-to-sequence collator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollatorSettings {
    pub pad_to_multiple_of: usize,
    pub padding: bool,
}

impl Default for CollatorSettings {
    fn default() -> Self {
        Self { pad_to_multiple_of: 8, padding: true }
    }
}

/// Parameters handed to the training engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingArguments {
    pub per_device_train_batch_size: usize,
    pub gradient_accumulation_steps: usize,
    pub warmup_steps: u64,
    pub num_train_epochs: f64,
    pub learning_rate: f64,
    pub bf16: bool,
    pub logging_steps: u64,
    pub output_dir: PathBuf,
    pub deepspeed: Option<DeepspeedConfig>,
    pub gradient_checkpointing: bool,
    pub ddp_find_unused_parameters: bool,
    pub group_by_length: bool,
    pub report_to: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_steps: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_total_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lr_scheduler_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optim: Option<String>,
    pub collator: CollatorSettings,
    pub tracking: TrackingSettings,
}

impl TrainingArguments {
    #[must_use]
    pub fn assemble(config: &TrainingConfig, plan: &BatchPlan, decision: &ResumeDecision) -> Self {
        let model = &config.model;
        let tracked = decision.tracking_enabled();

        Self {
            per_device_train_batch_size: plan.per_device_micro_batch_size,
            gradient_accumulation_steps: plan.gradient_accumulation_steps,
            warmup_steps: model.warmup_steps,
            num_train_epochs: model.epochs,
            learning_rate: model.learning_rate,
            bf16: model.bf16,
            logging_steps: 1,
            output_dir: config.working_dir.clone(),
            deepspeed: model.deepspeed_config.clone(),
            gradient_checkpointing: model.gradient_checkpointing,
            ddp_find_unused_parameters: model.ddp_find_unused_parameters(),
            group_by_length: false,
            report_to: if tracked { vec![TRACKER_REPORT_NAME.to_string()] } else { Vec::new() },
            save_steps: tracked.then_some(1),
            save_total_limit: tracked.then_some(TRACKED_SAVE_TOTAL_LIMIT),
            lr_scheduler_type: model.lr_scheduler_type.clone(),
            optim: model.optim.clone(),
            collator: CollatorSettings::default(),
            tracking: decision.tracking_settings(),
        }
    }
}
