use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};

/// This process's view of the distributed job, as exported by the launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributedContext {
    pub world_size: usize,
    pub rank: usize,
    pub local_rank: usize,
}

impl Default for DistributedContext {
    fn default() -> Self {
        Self { world_size: 1, rank: 0, local_rank: 0 }
    }
}

impl DistributedContext {
    pub fn single_process() -> Self {
        Self::default()
    }

    /// Read `WORLD_SIZE`, `RANK` and `LOCAL_RANK`. Unset variables fall back
    /// to a single process.
    pub fn from_env() -> TrainingResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> TrainingResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str, default: usize| -> TrainingResult<usize> {
            match lookup(key) {
                None => Ok(default),
                Some(raw) => raw.trim().parse().map_err(|_| {
                    TrainingError::InvalidConfig(format!("{key} must be a non-negative integer, got `{raw}`"))
                }),
            }
        };

        let ctx = Self {
            world_size: read("WORLD_SIZE", 1)?,
            rank: read("RANK", 0)?,
            local_rank: read("LOCAL_RANK", 0)?,
        };

        if ctx.world_size == 0 {
            return Err(TrainingError::InvalidConfig("WORLD_SIZE must be >= 1".to_string()));
        }
        if ctx.rank >= ctx.world_size {
            return Err(TrainingError::InvalidConfig(format!(
                "RANK {} is out of range for WORLD_SIZE {}",
                ctx.rank, ctx.world_size
            )));
        }
        Ok(ctx)
    }

    #[must_use]
    pub fn is_main_process(&self) -> bool {
        self.rank == 0
    }
}
