use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use rex_core::{to_canonical_json_bytes, Configuration};
use rex_sweep::{expand, plan_hash, SweepPlan};

#[derive(Args, Debug)]
pub struct ExpandArgs {
    /// Base YAML configuration file.
    #[arg(long)]
    pub config: PathBuf,
    /// YAML sweep plan to expand.
    #[arg(long)]
    pub sweep: PathBuf,
    /// Optional file receiving the expansion as canonical JSON.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Dry-run expansion: show what a batch would contain without executing.
pub fn run(args: &ExpandArgs) -> Result<i32, Box<dyn Error>> {
    let base = Configuration::load_yaml(&args.config)?;
    let plan = SweepPlan::load_yaml(&args.sweep)?;
    let runs = expand(&base, &plan)?;
    println!("plan hash: {}", plan_hash(&base, &plan)?);
    for run in &runs {
        let overrides: Vec<String> = run
            .overrides
            .iter()
            .map(|entry| format!("{}={}", entry.key, entry.value))
            .collect();
        println!("{:<28} {}", run.run_id, overrides.join(" "));
    }
    println!("{} runs", runs.len());
    if let Some(out) = &args.out {
        fs::write(out, to_canonical_json_bytes(&runs)?)?;
    }
    Ok(0)
}
