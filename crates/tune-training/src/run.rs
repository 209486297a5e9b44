use crate::arguments::TrainingArguments;
use crate::batch::compute_batch_plan;
use crate::config::TrainingConfig;
use crate::distributed::DistributedContext;
use crate::error::TrainingResult;
use crate::resume::{resolve_resume, ResumeDecision};
use crate::tracking::ExperimentTracker;
use crate::trainer::{ResumeFrom, TrainableModel, Trainer};
use tracing::{info, warn};

/// Everything the façade decided before handing off to the engine.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub args: TrainingArguments,
    pub decision: ResumeDecision,
    pub resume_from: ResumeFrom,
}

/// Resolve tracking, size the batches and assemble engine arguments.
pub async fn prepare_run(
    config: &TrainingConfig,
    dist: &DistributedContext,
    tracker: &dyn ExperimentTracker,
) -> TrainingResult<PreparedRun> {
    config.validate()?;

    if let Some(key) = config.wandb_key.as_deref() {
        tracker.login(key).await?;
    }
    let decision = resolve_resume(tracker, &config.resume_request()).await?;

    let plan = compute_batch_plan(config.model.batch_size, dist.world_size, config.model.micro_batch_size)?;
    if !plan.is_exact() {
        warn!(
            batch_size = plan.global_batch_size,
            world_size = plan.world_size,
            micro_batch_size = plan.per_device_micro_batch_size,
            effective_batch_size = plan.effective_global_batch_size(),
            "batch_size does not divide evenly; optimizer updates will see fewer examples"
        );
    }
    info!(
        rank = dist.rank,
        local_rank = dist.local_rank,
        per_device_train_batch_size = plan.per_device_micro_batch_size,
        gradient_accumulation_steps = plan.gradient_accumulation_steps,
        "Batch plan"
    );
    if let Some(deepspeed) = &config.model.deepspeed_config {
        info!(?deepspeed, "DeepSpeed config");
    }

    let args = TrainingArguments::assemble(config, &plan, &decision);
    let resume_from = decision
        .checkpoint_dir()
        .map_or(ResumeFrom::Fresh, |dir| ResumeFrom::Checkpoint { dir: dir.clone() });

    Ok(PreparedRun { args, decision, resume_from })
}

/// Configure and run one training invocation, returning the trained model.
///
/// Engine errors are returned as-is.
pub async fn run_training<T: Trainer>(
    config: &TrainingConfig,
    dist: &DistributedContext,
    tracker: &dyn ExperimentTracker,
    trainer: &T,
    tokenizer: &T::Tokenizer,
    dataset: &T::Dataset,
    mut model: T::Model,
) -> TrainingResult<T::Model> {
    let prepared = prepare_run(config, dist, tracker).await?;

    model.set_use_cache(false);
    info!(engine = trainer.id(), resume_from = ?prepared.resume_from, "Starting training");
    trainer
        .train(&prepared.args, tokenizer, dataset, &mut model, &prepared.resume_from)
        .await?;

    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::error::TrainingError;
    use crate::local::LocalTracker;
    use crate::tracking::{ResumeMode, RunInit};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct FakeModel {
        use_cache: bool,
        steps: u32,
    }

    impl TrainableModel for FakeModel {
        fn use_cache(&self) -> bool {
            self.use_cache
        }

        fn set_use_cache(&mut self, enabled: bool) {
            self.use_cache = enabled;
        }
    }

    #[derive(Default)]
    struct RecordingTrainer {
        seen: Mutex<Vec<(TrainingArguments, ResumeFrom, bool)>>,
        fail: bool,
    }

    #[async_trait]
    impl Trainer for RecordingTrainer {
        type Model = FakeModel;
        type Tokenizer = ();
        type Dataset = Vec<String>;

        fn id(&self) -> &'static str {
            "recording"
        }

        async fn train(
            &self,
            args: &TrainingArguments,
            _tokenizer: &Self::Tokenizer,
            dataset: &Self::Dataset,
            model: &mut Self::Model,
            resume_from: &ResumeFrom,
        ) -> TrainingResult<()> {
            self.seen.lock().unwrap().push((args.clone(), resume_from.clone(), model.use_cache()));
            if self.fail {
                return Err(TrainingError::Trainer("out of memory".to_string()));
            }
            model.steps += dataset.len() as u32;
            Ok(())
        }
    }

    fn config(working_dir: PathBuf) -> TrainingConfig {
        TrainingConfig {
            working_dir,
            model: ModelConfig {
                batch_size: 64,
                micro_batch_size: 2,
                epochs: 1.0,
                learning_rate: 1e-4,
                gradient_checkpointing: false,
                bf16: false,
                lr_scheduler_type: Some("cosine".to_string()),
                optim: None,
                warmup_steps: 10,
                deepspeed_config: None,
                load_in_8bit: false,
                load_in_4bit: false,
            },
            wandb_key: None,
            wandb_project: None,
            wandb_last_run_id: None,
            wandb_checkpoint_name: None,
        }
    }

    fn four_workers() -> DistributedContext {
        DistributedContext { world_size: 4, rank: 0, local_rank: 0 }
    }

    #[tokio::test]
    async fn test_untracked_run_trains_from_scratch() {
        let temp = TempDir::new().unwrap();
        let tracker = LocalTracker::new(temp.path().join("tracker"));
        let trainer = RecordingTrainer::default();
        let dataset = vec!["a".to_string(), "b".to_string()];

        let model = run_training(
            &config(temp.path().to_path_buf()),
            &four_workers(),
            &tracker,
            &trainer,
            &(),
            &dataset,
            FakeModel { use_cache: true, steps: 0 },
        )
        .await
        .unwrap();

        assert_eq!(model.steps, 2);
        assert!(!model.use_cache());
        let seen = trainer.seen.lock().unwrap();
        let (args, resume_from, cache_during_training) = &seen[0];
        assert_eq!(args.gradient_accumulation_steps, 8);
        assert!(args.ddp_find_unused_parameters);
        assert_eq!(args.lr_scheduler_type.as_deref(), Some("cosine"));
        assert!(args.tracking.disabled);
        assert_eq!(resume_from, &ResumeFrom::Fresh);
        assert!(!cache_during_training);
    }

    #[tokio::test]
    async fn test_tracked_resume_passes_checkpoint_dir() {
        let temp = TempDir::new().unwrap();
        let tracker = LocalTracker::new(temp.path().join("tracker"));
        let prior = tracker
            .init_run(&RunInit { project: "p".to_string(), dir: temp.path().to_path_buf(), resume: ResumeMode::Never })
            .await
            .unwrap();
        let ckpt = temp.path().join("ckpt");
        std::fs::create_dir_all(&ckpt).unwrap();
        std::fs::write(ckpt.join("adapter_model.bin"), b"w").unwrap();
        tracker.log_artifact(&prior, "best", &ckpt).unwrap();

        let mut config = config(temp.path().join("work"));
        config.wandb_key = Some("secret".to_string());
        config.wandb_project = Some("p".to_string());
        config.wandb_last_run_id = Some(prior.run_id.clone());
        config.wandb_checkpoint_name = Some("best:v0".to_string());

        let trainer = RecordingTrainer::default();
        run_training(&config, &four_workers(), &tracker, &trainer, &(), &Vec::new(), FakeModel { use_cache: true, steps: 0 })
            .await
            .unwrap();

        let seen = trainer.seen.lock().unwrap();
        let (args, resume_from, _) = &seen[0];
        assert_eq!(args.save_steps, Some(1));
        assert_eq!(args.save_total_limit, Some(20));
        assert_eq!(args.report_to, vec!["wandb".to_string()]);
        assert_eq!(args.tracking.run_id.as_deref(), Some(prior.run_id.as_str()));
        assert!(args.tracking.resumed);
        let ResumeFrom::Checkpoint { dir } = resume_from else {
            panic!("expected checkpoint resume");
        };
        assert!(dir.join("adapter_model.bin").is_file());
    }

    #[tokio::test]
    async fn test_fresh_tracked_run_is_handed_to_engine() {
        let temp = TempDir::new().unwrap();
        let tracker = LocalTracker::new(temp.path().join("tracker"));
        let mut config = config(temp.path().join("work"));
        config.wandb_project = Some("p".to_string());

        let prepared = prepare_run(&config, &four_workers(), &tracker).await.unwrap();
        let ResumeDecision::FreshRun { run_id, .. } = &prepared.decision else {
            panic!("expected fresh run, got {:?}", prepared.decision);
        };
        assert_eq!(prepared.args.tracking.run_id.as_deref(), Some(run_id.as_str()));
        assert!(!prepared.args.tracking.resumed);
        assert!(prepared.args.tracking.env_pairs().contains(&("WANDB_RUN_ID", run_id.clone())));
        assert!(tracker.load_run("p", run_id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_prior_run_without_project_trains_untracked() {
        let temp = TempDir::new().unwrap();
        let tracker = LocalTracker::new(temp.path().join("tracker"));
        let mut config = config(temp.path().to_path_buf());
        config.wandb_last_run_id = Some("r1".to_string());

        let prepared = prepare_run(&config, &four_workers(), &tracker).await.unwrap();
        assert_eq!(prepared.decision, ResumeDecision::Disabled);
        assert!(prepared.args.tracking.disabled);
        assert_eq!(prepared.resume_from, ResumeFrom::Fresh);
    }

    #[tokio::test]
    async fn test_engine_errors_propagate() {
        let temp = TempDir::new().unwrap();
        let tracker = LocalTracker::new(temp.path().join("tracker"));
        let trainer = RecordingTrainer { fail: true, ..Default::default() };

        let err = run_training(
            &config(temp.path().to_path_buf()),
            &four_workers(),
            &tracker,
            &trainer,
            &(),
            &Vec::new(),
            FakeModel { use_cache: true, steps: 0 },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TrainingError::Trainer(ref msg) if msg == "out of memory"));
    }

    #[tokio::test]
    async fn test_bad_batch_plan_stops_before_engine() {
        let temp = TempDir::new().unwrap();
        let tracker = LocalTracker::new(temp.path().join("tracker"));
        let trainer = RecordingTrainer::default();
        let mut config = config(temp.path().to_path_buf());
        config.model.batch_size = 4;
        config.model.micro_batch_size = 2;

        let result = run_training(
            &config,
            &four_workers(),
            &tracker,
            &trainer,
            &(),
            &Vec::new(),
            FakeModel { use_cache: true, steps: 0 },
        )
        .await;
        assert!(matches!(result, Err(TrainingError::InvalidConfig(_))));
        assert!(trainer.seen.lock().unwrap().is_empty());
    }
}
