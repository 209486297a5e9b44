//! `csv-to-jsonl <csv_file_path> <jsonl_file_path>`
//!
//! Converts CSV instruction/response rows into a chat JSONL dataset with the
//! default system prompt.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "csv-to-jsonl", version, about = "Convert CSV instruction/response rows into chat JSONL")]
struct Args {
    csv_file_path: PathBuf,
    jsonl_file_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    tune_training::convert(&args.csv_file_path, &args.jsonl_file_path).with_context(|| {
        format!(
            "failed to convert {} to {}",
            args.csv_file_path.display(),
            args.jsonl_file_path.display()
        )
    })?;
    Ok(())
}
