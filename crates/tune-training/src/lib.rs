//! Tune Training
//!
//! Helpers around an external fine-tuning engine:
//! - Sizing per-device batches and gradient accumulation (`compute_batch_plan`)
//! - Starting or resuming tracked runs from checkpoint artifacts (`resolve_resume`)
//! - Assembling engine arguments and invoking a `Trainer` (`run_training`)
//! - Converting CSV instruction/response rows into chat JSONL (`convert`)

pub mod arguments;
pub mod artifacts;
pub mod batch;
pub mod config;
pub mod convert;
pub mod dataset;
pub mod distributed;
pub mod error;
pub mod launch;
pub mod layout;
pub mod local;
pub mod resume;
pub mod run;
pub mod tracking;
pub mod trainer;

pub use arguments::{CollatorSettings, TrainingArguments};
pub use artifacts::{default_checkpoint_artifact, ArtifactAlias, ArtifactManifest, ArtifactRef};
pub use batch::{compute_batch_plan, BatchPlan};
pub use config::{DeepspeedConfig, ModelConfig, TrainingConfig};
pub use convert::{convert, convert_stream, convert_with_options, ConvertOptions, ConvertStats, DEFAULT_SYSTEM_PROMPT};
pub use dataset::{read_chat_jsonl, validate_chat_records, ChatDataset, ChatMessage, ChatRecord, ChatRole, DatasetId};
pub use distributed::DistributedContext;
pub use error::{TrainingError, TrainingResult};
pub use launch::{LaunchPlan, LaunchPlanTrainer, ModelHandle};
pub use layout::TrainingLayout;
pub use local::LocalTracker;
pub use resume::{checkpoint_artifact_name, resolve_resume, ResumeDecision, ResumeRequest};
pub use run::{prepare_run, run_training, PreparedRun};
pub use tracking::{ExperimentTracker, LogModel, ResumeMode, RunInit, TrackedRun, TrackingSettings};
pub use trainer::{ResumeFrom, TrainableModel, Trainer};
