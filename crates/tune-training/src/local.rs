//! Filesystem-backed experiment tracker.
//!
//! Layout under the tracker root:
//!
//! ```text
//! <root>/<project>/runs/<run_id>.json
//! <root>/<project>/artifacts/<name>/v<N>/manifest.json
//! <root>/<project>/artifacts/<name>/v<N>/files/...
//! ```

use crate::artifacts::{copy_tree, verify_files, ArtifactAlias, ArtifactManifest, ArtifactRef};
use crate::error::{TrainingError, TrainingResult};
use crate::tracking::{ExperimentTracker, ResumeMode, RunInit, TrackedRun};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub project: String,
    pub dir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub state: RunState,
    #[serde(default)]
    pub resume_count: u32,
}

#[derive(Debug, Clone)]
pub struct LocalTracker {
    root: PathBuf,
}

impl LocalTracker {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn run_path(&self, project: &str, run_id: &str) -> TrainingResult<PathBuf> {
        let project = path_segment("project", project)?;
        let run_id = path_segment("run id", run_id)?;
        Ok(self.root.join(project).join("runs").join(format!("{run_id}.json")))
    }

    fn artifact_dir(&self, project: &str, name: &str) -> TrainingResult<PathBuf> {
        let project = path_segment("project", project)?;
        let name = path_segment("artifact name", name)?;
        Ok(self.root.join(project).join("artifacts").join(name))
    }

    pub fn load_run(&self, project: &str, run_id: &str) -> TrainingResult<Option<RunRecord>> {
        let path = self.run_path(project, run_id)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(TrainingError::ReadPath { path, source }),
        }
    }

    fn save_run(&self, record: &RunRecord) -> TrainingResult<()> {
        let path = self.run_path(&record.project, &record.run_id)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(record)?)
            .map_err(|source| TrainingError::WritePath { path, source })
    }

    /// Versions logged for `name`, ascending.
    pub fn versions(&self, project: &str, name: &str) -> TrainingResult<Vec<u32>> {
        let dir = self.artifact_dir(project, name)?;
        let entries = match std::fs::read_dir(&dir) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(TrainingError::ReadPath { path: dir, source }),
        };

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(v) = entry.file_name().to_str().and_then(|n| n.strip_prefix('v')).and_then(|n| n.parse().ok()) {
                if entry.path().join("manifest.json").is_file() {
                    versions.push(v);
                }
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    /// Publish the contents of `src_dir` as the next version of `name`.
    pub fn log_artifact(&self, run: &TrackedRun, name: &str, src_dir: &Path) -> TrainingResult<ArtifactManifest> {
        let version = self.versions(&run.project, name)?.last().map_or(0, |v| v + 1);
        let version_dir = self.artifact_dir(&run.project, name)?.join(format!("v{version}"));
        let files = copy_tree(src_dir, &version_dir.join("files"))?;

        let manifest = ArtifactManifest {
            name: name.to_string(),
            version,
            created_at: Utc::now(),
            run_id: run.run_id.clone(),
            files,
        };
        std::fs::write(version_dir.join("manifest.json"), serde_json::to_string_pretty(&manifest)?)?;

        info!(project = %run.project, artifact = name, version, "Logged artifact");
        Ok(manifest)
    }

    fn resolve_version(&self, project: &str, reference: &ArtifactRef) -> TrainingResult<u32> {
        let versions = self.versions(project, &reference.name)?;
        let found = match reference.alias {
            ArtifactAlias::Latest => versions.last().copied(),
            ArtifactAlias::Version(v) => versions.contains(&v).then_some(v),
        };
        found.ok_or_else(|| {
            TrainingError::Artifact(format!("artifact {reference} not found in project {project}"))
        })
    }
}

/// Names from configs become single path components under the tracker root.
fn path_segment<'a>(kind: &str, value: &'a str) -> TrainingResult<&'a str> {
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\\', '\0']) {
        return Err(TrainingError::Tracking(format!("invalid {kind} `{value}`")));
    }
    Ok(value)
}

#[async_trait]
impl ExperimentTracker for LocalTracker {
    fn id(&self) -> &'static str {
        "local"
    }

    async fn login(&self, api_key: &str) -> TrainingResult<()> {
        if api_key.trim().is_empty() {
            return Err(TrainingError::Tracking("api key is empty".to_string()));
        }
        debug!(root = %self.root.display(), "Local tracker needs no credentials");
        Ok(())
    }

    async fn init_run(&self, init: &RunInit) -> TrainingResult<TrackedRun> {
        let now = Utc::now();
        match &init.resume {
            ResumeMode::Never => {
                let run_id = Uuid::new_v4().simple().to_string()[..8].to_string();
                self.save_run(&RunRecord {
                    run_id: run_id.clone(),
                    project: init.project.clone(),
                    dir: init.dir.clone(),
                    created_at: now,
                    updated_at: now,
                    state: RunState::Running,
                    resume_count: 0,
                })?;
                info!(project = %init.project, run_id = %run_id, "Started tracked run");
                Ok(TrackedRun { project: init.project.clone(), run_id, resumed: false })
            }
            ResumeMode::Must(run_id) => {
                let mut record = self.load_run(&init.project, run_id)?.ok_or_else(|| {
                    TrainingError::ResumeFailed {
                        run_id: run_id.clone(),
                        reason: format!("no such run in project {}", init.project),
                    }
                })?;
                record.state = RunState::Running;
                record.updated_at = now;
                record.resume_count += 1;
                self.save_run(&record)?;
                info!(project = %init.project, run_id = %run_id, "Resumed tracked run");
                Ok(TrackedRun { project: init.project.clone(), run_id: run_id.clone(), resumed: true })
            }
        }
    }

    async fn use_artifact(&self, run: &TrackedRun, artifact_name: &str, dest_root: &Path) -> TrainingResult<PathBuf> {
        let reference = ArtifactRef::parse(artifact_name)?;
        let version = self.resolve_version(&run.project, &reference)?;
        let version_dir = self.artifact_dir(&run.project, &reference.name)?.join(format!("v{version}"));
        let manifest: ArtifactManifest = serde_json::from_slice(
            &std::fs::read(version_dir.join("manifest.json"))
                .map_err(|source| TrainingError::ReadPath { path: version_dir.join("manifest.json"), source })?,
        )?;

        let dest = dest_root.join(format!("{}-v{version}", reference.name));
        if dest.exists() {
            std::fs::remove_dir_all(&dest)?;
        }
        std::fs::create_dir_all(&dest)?;
        copy_tree(&version_dir.join("files"), &dest)?;
        verify_files(&dest, &manifest.files)?;

        info!(artifact = %reference, version, dest = %dest.display(), "Downloaded artifact");
        Ok(dest)
    }

    async fn finish_run(&self, run: &TrackedRun) -> TrainingResult<()> {
        let Some(mut record) = self.load_run(&run.project, &run.run_id)? else {
            return Err(TrainingError::Tracking(format!("unknown run {}", run.run_id)));
        };
        record.state = RunState::Finished;
        record.updated_at = Utc::now();
        self.save_run(&record)
    }
}
