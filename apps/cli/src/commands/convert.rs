//! Convert command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use tune_training::ConvertOptions;

pub fn execute(csv_path: &Path, jsonl_path: &Path, system_prompt: Option<String>, lenient: bool) -> Result<()> {
    let mut options = ConvertOptions { lenient, ..Default::default() };
    if let Some(prompt) = system_prompt {
        options.system_prompt = prompt;
    }

    let stats = tune_training::convert_with_options(csv_path, jsonl_path, &options)
        .with_context(|| format!("Failed to convert {}", csv_path.display()))?;

    println!(
        "{} {} records to {}",
        "Wrote".green(),
        stats.records_written,
        jsonl_path.display()
    );
    if stats.rows_skipped > 0 {
        println!("  {}", format!("Skipped {} rows with missing fields", stats.rows_skipped).yellow());
    }
    Ok(())
}
