//! Batch plan command implementation.

use anyhow::Result;
use colored::Colorize;

pub fn execute(batch_size: usize, world_size: usize, micro_batch_size: usize, json_output: bool) -> Result<()> {
    let plan = tune_training::compute_batch_plan(batch_size, world_size, micro_batch_size)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!();
    println!("{}", "Batch Plan".bold().cyan());
    println!("  Global batch size:           {}", plan.global_batch_size);
    println!("  World size:                  {}", plan.world_size);
    println!("  Per-device batch size:       {}", plan.per_device_batch_size);
    println!("  Per-device micro batch size: {}", plan.per_device_micro_batch_size);
    println!("  Gradient accumulation steps: {}", plan.gradient_accumulation_steps.to_string().green());
    if !plan.is_exact() {
        println!();
        println!(
            "  {}",
            format!(
                "batch_size does not divide evenly: each update sees {} examples ({} dropped)",
                plan.effective_global_batch_size(),
                plan.dropped_examples()
            )
            .yellow()
        );
    }
    println!();
    Ok(())
}
