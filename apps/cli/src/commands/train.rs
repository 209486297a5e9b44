//! Training command implementation.

use crate::commands::resume::{load_config, open_tracker};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tune_training::{
    read_chat_jsonl, DistributedContext, LaunchPlan, LaunchPlanTrainer, ModelHandle, TrainingLayout,
};

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Training config (TOML or JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Chat JSONL dataset
    #[arg(short, long)]
    pub data: PathBuf,

    /// Base model name passed to the launcher
    #[arg(long, default_value = "base")]
    pub model: String,

    /// Tokenizer name (defaults to the model name)
    #[arg(long)]
    pub tokenizer: Option<String>,

    /// Tracker root (defaults to <working_dir>/tracking)
    #[arg(long)]
    pub tracking_dir: Option<PathBuf>,

    /// Number of training processes (defaults to WORLD_SIZE or 1)
    #[arg(long)]
    pub world_size: Option<usize>,

    /// Output the launch plan as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: TrainArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let tracker = open_tracker(&config, args.tracking_dir);

    let dist = match args.world_size {
        Some(world_size) => DistributedContext { world_size, ..DistributedContext::single_process() },
        None => DistributedContext::from_env()?,
    };

    let dataset = read_chat_jsonl(&args.data)
        .with_context(|| format!("Failed to read dataset: {}", args.data.display()))?;
    let tokenizer = args.tokenizer.unwrap_or_else(|| args.model.clone());
    let trainer = LaunchPlanTrainer::new(dist);

    tune_training::run_training(&config, &dist, &tracker, &trainer, &tokenizer, &dataset, ModelHandle::new(args.model))
        .await?;
    if !dist.is_main_process() {
        println!("{}", format!("Rank {}: launch plan is written by rank 0", dist.rank).dimmed());
        return Ok(());
    }

    let plan_path = TrainingLayout::new(config.working_dir.clone()).launch_plan_path();
    let plan: LaunchPlan = serde_json::from_slice(&std::fs::read(&plan_path)?)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!();
    println!("{}", "Launch plan ready".bold().green());
    println!("  Model:      {}", plan.model.name.cyan());
    println!("  Examples:   {}", plan.num_examples);
    println!(
        "  Batching:   {} x {} accumulation x {} processes",
        plan.arguments.per_device_train_batch_size,
        plan.arguments.gradient_accumulation_steps,
        plan.world_size
    );
    println!("  Steps:      {} per epoch, {} total", plan.steps_per_epoch, plan.total_steps);
    match &plan.resume_from {
        tune_training::ResumeFrom::Fresh => println!("  Resume:     {}", "fresh start".dimmed()),
        tune_training::ResumeFrom::Checkpoint { dir } => println!("  Resume:     {}", dir.display().to_string().cyan()),
    }
    println!("  Plan:       {}", plan_path.display().to_string().dimmed());
    println!();
    Ok(())
}
