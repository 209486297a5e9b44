//! Resume command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tune_training::{ExperimentTracker, LocalTracker, ResumeDecision, TrainingConfig, TrainingLayout};

/// Load a config file with environment fallbacks applied.
pub fn load_config(path: &Path) -> Result<TrainingConfig> {
    let config = TrainingConfig::load_from_file(path)
        .with_context(|| format!("Failed to load training config: {}", path.display()))?
        .with_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Tracker rooted at `tracking_dir`, or inside the working directory.
pub fn open_tracker(config: &TrainingConfig, tracking_dir: Option<PathBuf>) -> LocalTracker {
    LocalTracker::new(tracking_dir.unwrap_or_else(|| TrainingLayout::new(config.working_dir.clone()).tracking_dir()))
}

pub async fn execute(config_path: PathBuf, tracking_dir: Option<PathBuf>, json_output: bool) -> Result<()> {
    let config = load_config(&config_path)?;
    let tracker = open_tracker(&config, tracking_dir);

    if let Some(key) = config.wandb_key.as_deref() {
        tracker.login(key).await?;
    }
    let decision = tune_training::resolve_resume(&tracker, &config.resume_request()).await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&decision)?);
        return Ok(());
    }

    println!();
    match &decision {
        ResumeDecision::Disabled => {
            println!("{}", "Tracking disabled".bold().yellow());
            println!("  {}", "Set wandb_project in the config to track this run.".dimmed());
        }
        ResumeDecision::FreshRun { project_name, run_id } => {
            println!("{}", "New tracked run".bold().green());
            println!("  Project: {}", project_name.cyan());
            println!("  Run:     {}", run_id.cyan());
        }
        ResumeDecision::ResumeRun { project_name, run_id, checkpoint_artifact_name, local_checkpoint_dir } => {
            println!("{}", "Resuming tracked run".bold().green());
            println!("  Project:    {}", project_name.cyan());
            println!("  Run:        {}", run_id.cyan());
            println!("  Artifact:   {}", checkpoint_artifact_name.cyan());
            println!("  Checkpoint: {}", local_checkpoint_dir.display().to_string().dimmed());
        }
    }
    println!();
    Ok(())
}
