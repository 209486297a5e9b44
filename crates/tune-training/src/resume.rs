use crate::artifacts::default_checkpoint_artifact;
use crate::error::{TrainingError, TrainingResult};
use crate::layout::TrainingLayout;
use crate::tracking::{ExperimentTracker, ResumeMode, RunInit, TrackingSettings};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Tracking inputs for [`resolve_resume`].
#[derive(Debug, Clone, Default)]
pub struct ResumeRequest {
    pub project_name: Option<String>,
    pub prior_run_id: Option<String>,
    pub checkpoint_artifact_name: Option<String>,
    pub working_dir: PathBuf,
}

/// Outcome of run resolution, computed once per training invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResumeDecision {
    /// No project configured; tracking is off.
    Disabled,
    FreshRun {
        project_name: String,
        run_id: String,
    },
    ResumeRun {
        project_name: String,
        run_id: String,
        checkpoint_artifact_name: String,
        local_checkpoint_dir: PathBuf,
    },
}

impl ResumeDecision {
    #[must_use]
    pub fn tracking_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Directory the engine must warm-start from, if any.
    #[must_use]
    pub fn checkpoint_dir(&self) -> Option<&PathBuf> {
        match self {
            Self::ResumeRun { local_checkpoint_dir, .. } => Some(local_checkpoint_dir),
            _ => None,
        }
    }

    #[must_use]
    pub fn tracking_settings(&self) -> TrackingSettings {
        match self {
            Self::Disabled => TrackingSettings::disabled(),
            Self::FreshRun { project_name, run_id } => {
                TrackingSettings::active(project_name.clone(), run_id.clone(), false)
            }
            Self::ResumeRun { project_name, run_id, .. } => {
                TrackingSettings::active(project_name.clone(), run_id.clone(), true)
            }
        }
    }
}

/// Artifact to fetch when resuming `run_id`.
#[must_use]
pub fn checkpoint_artifact_name(run_id: &str, override_name: Option<&str>) -> String {
    override_name.map_or_else(|| default_checkpoint_artifact(run_id), str::to_string)
}

/// Decide between no tracking, a fresh tracked run, or resuming a prior run.
///
/// Resuming never falls back to a fresh run: a prior run that cannot be
/// reattached, or whose checkpoint cannot be fetched, is an error.
///
/// The run opened here is finished before returning. The engine attaches to
/// it again through the run id carried in [`ResumeDecision::tracking_settings`].
pub async fn resolve_resume(
    tracker: &dyn ExperimentTracker,
    request: &ResumeRequest,
) -> TrainingResult<ResumeDecision> {
    let Some(project) = request.project_name.clone() else {
        if let Some(run_id) = &request.prior_run_id {
            warn!(run_id = %run_id, "Ignoring prior run id: no tracking project configured");
        }
        info!("No tracking project configured; tracking disabled");
        return Ok(ResumeDecision::Disabled);
    };

    let layout = TrainingLayout::new(request.working_dir.clone());

    let Some(prior_run_id) = request.prior_run_id.clone() else {
        let run = tracker
            .init_run(&RunInit { project: project.clone(), dir: request.working_dir.clone(), resume: ResumeMode::Never })
            .await?;
        tracker.finish_run(&run).await?;
        info!(project = %project, run_id = %run.run_id, "Opened tracked run");
        return Ok(ResumeDecision::FreshRun { project_name: project, run_id: run.run_id });
    };

    let run = tracker
        .init_run(&RunInit {
            project: project.clone(),
            dir: request.working_dir.clone(),
            resume: ResumeMode::Must(prior_run_id.clone()),
        })
        .await
        .map_err(|e| match e {
            TrainingError::ResumeFailed { .. } => e,
            other => TrainingError::ResumeFailed { run_id: prior_run_id.clone(), reason: other.to_string() },
        })?;

    let artifact = checkpoint_artifact_name(&prior_run_id, request.checkpoint_artifact_name.as_deref());
    let fetched = tracker.use_artifact(&run, &artifact, &layout.artifacts_dir()).await;
    // Closed whether or not the download worked. A download error wins over a
    // failure to close.
    let finished = tracker.finish_run(&run).await;
    let local_checkpoint_dir = fetched?;
    finished?;

    info!(
        project = %project,
        run_id = %prior_run_id,
        artifact = %artifact,
        checkpoint_dir = %local_checkpoint_dir.display(),
        "Resuming from tracked checkpoint"
    );

    Ok(ResumeDecision::ResumeRun {
        project_name: project,
        run_id: prior_run_id,
        checkpoint_artifact_name: artifact,
        local_checkpoint_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{LocalTracker, RunState};
    use crate::tracking::{RunInit, TrackedRun};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records calls and fails on any of them.
    #[derive(Default)]
    struct UnreachableTracker {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ExperimentTracker for UnreachableTracker {
        fn id(&self) -> &'static str {
            "unreachable"
        }

        async fn login(&self, _api_key: &str) -> TrainingResult<()> {
            self.calls.lock().unwrap().push("login".to_string());
            Err(TrainingError::Tracking("offline".to_string()))
        }

        async fn init_run(&self, _init: &RunInit) -> TrainingResult<TrackedRun> {
            self.calls.lock().unwrap().push("init_run".to_string());
            Err(TrainingError::Tracking("offline".to_string()))
        }

        async fn use_artifact(&self, _run: &TrackedRun, _name: &str, _dest: &Path) -> TrainingResult<PathBuf> {
            self.calls.lock().unwrap().push("use_artifact".to_string());
            Err(TrainingError::Tracking("offline".to_string()))
        }

        async fn finish_run(&self, _run: &TrackedRun) -> TrainingResult<()> {
            self.calls.lock().unwrap().push("finish_run".to_string());
            Ok(())
        }
    }

    /// Reattaches runs but cannot download or close them.
    struct FailingDownloadTracker;

    #[async_trait]
    impl ExperimentTracker for FailingDownloadTracker {
        fn id(&self) -> &'static str {
            "failing-download"
        }

        async fn login(&self, _api_key: &str) -> TrainingResult<()> {
            Ok(())
        }

        async fn init_run(&self, init: &RunInit) -> TrainingResult<TrackedRun> {
            let run_id = match &init.resume {
                ResumeMode::Must(id) => id.clone(),
                ResumeMode::Never => "new".to_string(),
            };
            Ok(TrackedRun { project: init.project.clone(), run_id, resumed: true })
        }

        async fn use_artifact(&self, _run: &TrackedRun, _name: &str, _dest: &Path) -> TrainingResult<PathBuf> {
            Err(TrainingError::Artifact("checkpoint missing".to_string()))
        }

        async fn finish_run(&self, _run: &TrackedRun) -> TrainingResult<()> {
            Err(TrainingError::Tracking("connection reset".to_string()))
        }
    }

    #[test]
    fn test_artifact_name_defaults_to_latest_checkpoint() {
        assert_eq!(checkpoint_artifact_name("r1", None), "checkpoint-r1:latest");
        assert_eq!(checkpoint_artifact_name("r1", Some("custom:v2")), "custom:v2");
    }

    #[tokio::test]
    async fn test_no_project_disables_tracking_without_calls() {
        let tracker = UnreachableTracker::default();
        let decision = resolve_resume(&tracker, &ResumeRequest::default()).await.unwrap();
        assert_eq!(decision, ResumeDecision::Disabled);
        assert!(decision.tracking_settings().disabled);
        assert!(tracker.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_project_without_prior_run_starts_fresh() {
        let temp = TempDir::new().unwrap();
        let tracker = LocalTracker::new(temp.path().join("tracker"));
        let request = ResumeRequest {
            project_name: Some("p".to_string()),
            working_dir: temp.path().to_path_buf(),
            ..Default::default()
        };

        let decision = resolve_resume(&tracker, &request).await.unwrap();
        let ResumeDecision::FreshRun { project_name, run_id } = &decision else {
            panic!("expected fresh run, got {decision:?}");
        };
        assert_eq!(project_name, "p");
        assert!(decision.checkpoint_dir().is_none());

        // The engine attaches to the run the tracker recorded, which is closed
        // until then.
        let settings = decision.tracking_settings();
        assert_eq!(settings.run_id.as_deref(), Some(run_id.as_str()));
        assert!(!settings.resumed);
        let record = tracker.load_run("p", run_id).unwrap().unwrap();
        assert_eq!(record.state, RunState::Finished);
    }

    #[tokio::test]
    async fn test_prior_run_without_project_is_ignored() {
        let tracker = UnreachableTracker::default();
        let request = ResumeRequest { prior_run_id: Some("r1".to_string()), ..Default::default() };

        let decision = resolve_resume(&tracker, &request).await.unwrap();
        assert_eq!(decision, ResumeDecision::Disabled);
        assert!(tracker.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_error_survives_failed_finish() {
        let tracker = FailingDownloadTracker;
        let request = ResumeRequest {
            project_name: Some("p".to_string()),
            prior_run_id: Some("r1".to_string()),
            ..Default::default()
        };

        let err = resolve_resume(&tracker, &request).await.unwrap_err();
        assert!(matches!(err, TrainingError::Artifact(ref msg) if msg == "checkpoint missing"));
    }

    #[tokio::test]
    async fn test_resume_fetches_default_checkpoint() {
        let temp = TempDir::new().unwrap();
        let tracker = LocalTracker::new(temp.path().join("tracker"));
        let run = tracker
            .init_run(&RunInit { project: "p".to_string(), dir: temp.path().to_path_buf(), resume: ResumeMode::Never })
            .await
            .unwrap();
        let ckpt = temp.path().join("ckpt");
        std::fs::create_dir_all(&ckpt).unwrap();
        std::fs::write(ckpt.join("trainer_state.json"), b"{\"global_step\": 12}").unwrap();
        tracker.log_artifact(&run, &format!("checkpoint-{}", run.run_id), &ckpt).unwrap();

        let working_dir = temp.path().join("work");
        let request = ResumeRequest {
            project_name: Some("p".to_string()),
            prior_run_id: Some(run.run_id.clone()),
            checkpoint_artifact_name: None,
            working_dir: working_dir.clone(),
        };
        let decision = resolve_resume(&tracker, &request).await.unwrap();

        let ResumeDecision::ResumeRun { checkpoint_artifact_name, local_checkpoint_dir, run_id, .. } = &decision else {
            panic!("expected resume, got {decision:?}");
        };
        assert_eq!(checkpoint_artifact_name, &format!("checkpoint-{}:latest", run.run_id));
        assert_eq!(run_id, &run.run_id);
        assert!(local_checkpoint_dir.starts_with(working_dir.join("artifacts")));
        assert!(local_checkpoint_dir.join("trainer_state.json").is_file());
        let settings = decision.tracking_settings();
        assert_eq!(settings.run_id.as_deref(), Some(run.run_id.as_str()));
        assert!(settings.resumed);
    }

    #[tokio::test]
    async fn test_unresumable_run_is_fatal() {
        let tracker = UnreachableTracker::default();
        let request = ResumeRequest {
            project_name: Some("p".to_string()),
            prior_run_id: Some("r1".to_string()),
            ..Default::default()
        };
        let err = resolve_resume(&tracker, &request).await.unwrap_err();
        assert!(matches!(err, TrainingError::ResumeFailed { ref run_id, .. } if run_id == "r1"));
        assert_eq!(*tracker.calls.lock().unwrap(), vec!["init_run".to_string()]);
    }
}
