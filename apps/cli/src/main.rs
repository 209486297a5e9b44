//! Tune CLI - command-line front end for fine-tuning launch helpers
//!
//! Provides a `tune` command for sizing batches, resolving tracked runs,
//! preparing training launches and converting CSV datasets.

mod commands;
mod logging;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use commands::{batch_plan, convert, resume, train};

/// Tune CLI - fine-tuning launch helpers
#[derive(Parser, Debug)]
#[command(name = "tune", author, version, about = "Tune - fine-tuning launch helpers")]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute per-device batch size and gradient accumulation steps
    BatchPlan {
        /// Global batch size per optimizer update
        #[arg(long)]
        batch_size: usize,

        /// Number of training processes
        #[arg(long, default_value_t = 1)]
        world_size: usize,

        /// Examples per forward/backward pass on one device
        #[arg(long)]
        micro_batch_size: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start or resume the tracked run described by a config file
    ///
    /// On resume the checkpoint artifact is downloaded into the working
    /// directory and its path is printed.
    Resume {
        /// Training config (TOML or JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Tracker root (defaults to <working_dir>/tracking)
        #[arg(long)]
        tracking_dir: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Prepare a training launch
    ///
    /// Resolves tracking, sizes batches and writes launch_plan.json into the
    /// working directory for the training launcher.
    Train(train::TrainArgs),

    /// Convert CSV instruction/response rows into chat JSONL
    Convert {
        /// Input CSV with `instruction` and `response` columns
        csv_file_path: PathBuf,

        /// Output JSONL path
        jsonl_file_path: PathBuf,

        /// Override the system prompt
        #[arg(long)]
        system_prompt: Option<String>,

        /// Skip rows with missing fields instead of aborting
        #[arg(long)]
        lenient: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logging::init(&args.log_level)?;

    // If no command provided, show help
    let command = if let Some(cmd) = args.command {
        cmd
    } else {
        Args::command().print_help()?;
        return Ok(());
    };

    match command {
        Command::BatchPlan { batch_size, world_size, micro_batch_size, json } => {
            batch_plan::execute(batch_size, world_size, micro_batch_size, json)?;
        }
        Command::Resume { config, tracking_dir, json } => {
            resume::execute(config, tracking_dir, json).await?;
        }
        Command::Train(train_args) => {
            train::execute(train_args).await?;
        }
        Command::Convert { csv_file_path, jsonl_file_path, system_prompt, lenient } => {
            convert::execute(&csv_file_path, &jsonl_file_path, system_prompt, lenient)?;
        }
    }

    Ok(())
}
