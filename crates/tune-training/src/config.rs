//! Declarative training configuration.
//!
//! A config file is TOML (or JSON when the extension is `.json`):
//!
//! ```toml
//! working_dir = "/data/runs/support-bot"
//! wandb_project = "support-bot"
//!
//! [model]
//! batch_size = 64
//! micro_batch_size = 2
//! epochs = 3
//! learning_rate = 3e-4
//! gradient_checkpointing = true
//! ```
//!
//! Keys this crate does not know about are ignored so the same file can carry
//! settings for the model loader and tokenizer.

use crate::error::{TrainingError, TrainingResult};
use crate::resume::ResumeRequest;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable consulted when `wandb_key` is not set in the file.
pub const API_KEY_ENV: &str = "WANDB_API_KEY";

const DEFAULT_WARMUP_STEPS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Output directory for checkpoints and tracker run data.
    pub working_dir: PathBuf,

    pub model: ModelConfig,

    #[serde(default)]
    pub wandb_key: Option<String>,

    #[serde(default)]
    pub wandb_project: Option<String>,

    /// Run to resume. Ignored when `wandb_project` is unset.
    #[serde(default)]
    pub wandb_last_run_id: Option<String>,

    /// Artifact to warm-start from, e.g. `checkpoint-abc123:v4`.
    #[serde(default)]
    pub wandb_checkpoint_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub batch_size: usize,
    pub micro_batch_size: usize,
    pub epochs: f64,
    pub learning_rate: f64,
    #[serde(default)]
    pub gradient_checkpointing: bool,
    #[serde(default)]
    pub bf16: bool,
    #[serde(default)]
    pub lr_scheduler_type: Option<String>,
    #[serde(default)]
    pub optim: Option<String>,
    #[serde(default = "default_warmup_steps")]
    pub warmup_steps: u64,
    #[serde(default)]
    pub deepspeed_config: Option<DeepspeedConfig>,
    #[serde(default)]
    pub load_in_8bit: bool,
    #[serde(default)]
    pub load_in_4bit: bool,
}

fn default_warmup_steps() -> u64 {
    DEFAULT_WARMUP_STEPS
}

/// DeepSpeed settings are handed to the engine untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeepspeedConfig {
    Path(PathBuf),
    Inline(serde_json::Value),
}

impl ModelConfig {
    /// Unused-parameter detection is incompatible with gradient checkpointing
    /// and wasted on quantized loading.
    #[must_use]
    pub fn ddp_find_unused_parameters(&self) -> bool {
        !self.gradient_checkpointing && !self.load_in_8bit && !self.load_in_4bit
    }

    pub fn validate(&self) -> TrainingResult<()> {
        if self.batch_size == 0 {
            return Err(TrainingError::InvalidConfig("model.batch_size must be >= 1".to_string()));
        }
        if self.micro_batch_size == 0 {
            return Err(TrainingError::InvalidConfig(
                "model.micro_batch_size must be >= 1".to_string(),
            ));
        }
        if !self.epochs.is_finite() || self.epochs <= 0.0 {
            return Err(TrainingError::InvalidConfig("model.epochs must be > 0".to_string()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(TrainingError::InvalidConfig("model.learning_rate must be > 0".to_string()));
        }
        Ok(())
    }
}

impl TrainingConfig {
    /// Load a config file, picking the format from its extension.
    pub fn load_from_file(path: &Path) -> TrainingResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| TrainingError::ReadPath { path: path.to_path_buf(), source })?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let config: Self = if is_json {
            serde_json::from_str(&content)
                .map_err(|e| TrainingError::InvalidConfig(format!("{}: {}", path.display(), e)))?
        } else {
            toml::from_str(&content)
                .map_err(|e| TrainingError::InvalidConfig(format!("{}: {}", path.display(), e)))?
        };
        Ok(config.normalized())
    }

    /// Fill unset values from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Fill unset values from `lookup`.
    #[must_use]
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.wandb_key.is_none() {
            self.wandb_key = lookup(API_KEY_ENV);
        }
        self.normalized()
    }

    pub fn validate(&self) -> TrainingResult<()> {
        if self.working_dir.as_os_str().is_empty() {
            return Err(TrainingError::InvalidConfig("working_dir is required".to_string()));
        }
        self.model.validate()
    }

    /// Tracking fields in the shape the resume resolver expects.
    #[must_use]
    pub fn resume_request(&self) -> ResumeRequest {
        ResumeRequest {
            project_name: self.wandb_project.clone(),
            prior_run_id: self.wandb_last_run_id.clone(),
            checkpoint_artifact_name: self.wandb_checkpoint_name.clone(),
            working_dir: self.working_dir.clone(),
        }
    }

    // Blank strings count as unset.
    fn normalized(mut self) -> Self {
        for field in [
            &mut self.wandb_key,
            &mut self.wandb_project,
            &mut self.wandb_last_run_id,
            &mut self.wandb_checkpoint_name,
        ] {
            if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *field = None;
            }
        }
        self
    }
}
