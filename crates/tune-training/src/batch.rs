use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};

/// Per-device batch sizing derived from the global batch size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPlan {
    pub global_batch_size: usize,
    pub world_size: usize,
    /// Examples each device contributes to one optimizer update.
    pub per_device_batch_size: usize,
    /// Examples per forward/backward pass on one device.
    pub per_device_micro_batch_size: usize,
    pub gradient_accumulation_steps: usize,
}

impl BatchPlan {
    /// Batch size actually seen by the optimizer once truncation is applied.
    #[must_use]
    pub fn effective_global_batch_size(&self) -> usize {
        self.per_device_micro_batch_size * self.gradient_accumulation_steps * self.world_size
    }

    /// True when no examples were lost to integer division.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.effective_global_batch_size() == self.global_batch_size
    }

    /// Number of examples per update dropped by truncation.
    #[must_use]
    pub fn dropped_examples(&self) -> usize {
        self.global_batch_size.saturating_sub(self.effective_global_batch_size())
    }
}

/// Split a global batch across `world_size` devices running micro-batches of
/// `micro_batch_size`.
///
/// Both divisions truncate. An inexact split is returned as-is; use
/// [`BatchPlan::is_exact`] to detect it.
pub fn compute_batch_plan(
    global_batch_size: usize,
    world_size: usize,
    micro_batch_size: usize,
) -> TrainingResult<BatchPlan> {
    if world_size == 0 {
        return Err(TrainingError::InvalidConfig("world_size must be >= 1".to_string()));
    }
    if micro_batch_size == 0 {
        return Err(TrainingError::InvalidConfig("micro_batch_size must be >= 1".to_string()));
    }

    let per_device_batch_size = global_batch_size / world_size;
    let gradient_accumulation_steps = per_device_batch_size / micro_batch_size;
    if gradient_accumulation_steps == 0 {
        return Err(TrainingError::InvalidConfig(format!(
            "micro_batch_size {micro_batch_size} exceeds per-device batch size {per_device_batch_size} \
             (batch_size {global_batch_size} over {world_size} processes)"
        )));
    }

    Ok(BatchPlan {
        global_batch_size,
        world_size,
        per_device_batch_size,
        per_device_micro_batch_size: micro_batch_size,
        gradient_accumulation_steps,
    })
}
