use std::path::{Path, PathBuf};

/// Filesystem layout of a training working directory.
///
/// ```text
/// <working_dir>/
///   checkpoint-<step>/        written by the engine
///   artifacts/<name>-<ver>/   downloaded tracker artifacts
///   tracking/                 tracker run files
///   launch_plan.json
/// ```
#[derive(Debug, Clone)]
pub struct TrainingLayout {
    root: PathBuf,
}

impl TrainingLayout {
    #[must_use]
    pub fn new(working_dir: PathBuf) -> Self {
        Self { root: working_dir }
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.root
    }

    /// Parent directory for downloaded artifacts.
    #[must_use]
    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    #[must_use]
    pub fn tracking_dir(&self) -> PathBuf {
        self.root.join("tracking")
    }

    #[must_use]
    pub fn launch_plan_path(&self) -> PathBuf {
        self.root.join("launch_plan.json")
    }
}
