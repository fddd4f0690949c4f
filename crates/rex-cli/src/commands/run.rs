use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::Utc;
use clap::Args;
use rex_core::{stable_hash_string, Configuration, ErrorInfo, RexError};
use rex_run::{
    aggregate, execute_cluster, execute_parallel, execute_serial, execute_single, persist_report,
    prepare, ClusterOptions, ParallelOptions, RunMode, RunRequest, WorkerCommand,
};
use rex_sched::{dialect_for, JobResources};
use rex_sweep::{expand, single, ExpandedRun, SweepPlan, SweepStrategy};
use tracing::info;

use crate::commands::report::print_summary;
use crate::shell_runner::default_registry;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run mode: single, serial, parallel or cluster.
    #[arg(long)]
    pub mode: String,
    /// Base YAML configuration file.
    #[arg(long)]
    pub config: PathBuf,
    /// Results folder; each invocation creates a timestamped batch inside.
    #[arg(long)]
    pub out: PathBuf,
    /// Ordered runner methods, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub methods: Vec<String>,
    /// YAML sweep plan expanding the base configuration.
    #[arg(long)]
    pub sweep: Option<PathBuf>,
    /// Seeds to repeat each variant over (overrides the plan's seeds).
    #[arg(long, value_delimiter = ',')]
    pub seeds: Option<Vec<u64>>,
    /// Registered runner to drive.
    #[arg(long, default_value = "shell")]
    pub runner: String,
    /// Worker process limit for parallel mode.
    #[arg(long, default_value_t = 2)]
    pub workers: usize,
    /// Scheduler dialect for cluster mode.
    #[arg(long, default_value = "slurm")]
    pub scheduler: String,
    /// CPUs per cluster job.
    #[arg(long, default_value_t = 4)]
    pub cpus: u32,
    /// GPUs per cluster job.
    #[arg(long, default_value_t = 0)]
    pub gpus: u32,
    /// GPU model requested when --gpus is non-zero.
    #[arg(long, default_value = "K80")]
    pub gpu_type: String,
    /// Memory per cluster job in GB.
    #[arg(long, default_value_t = 16)]
    pub memory: u32,
    /// Walltime per cluster job.
    #[arg(long, default_value = "24:0:0")]
    pub walltime: String,
    /// Queue/partition to submit into.
    #[arg(long)]
    pub partition: Option<String>,
    /// Environment setup line inserted into job scripts (repeatable).
    #[arg(long)]
    pub setup: Vec<String>,
    /// Run cluster job commands inline instead of submitting.
    #[arg(long)]
    pub debug_local: bool,
}

pub fn run(args: &RunArgs) -> Result<i32, Box<dyn Error>> {
    let mode = RunMode::from_str(&args.mode)?;
    let base = Configuration::load_yaml(&args.config)?;
    let plan = resolve_plan(args, mode)?;

    let stamp = Utc::now().format("%Y-%m-%d-%H-%M-%S").to_string();
    let batch_root = args.out.join(&stamp);
    fs::create_dir_all(&batch_root)?;
    // verbatim copy of the base configuration at the batch root
    fs::copy(&args.config, batch_root.join("config.yaml"))?;

    let hash = stable_hash_string(&(&base, &plan))?;
    let runs: Vec<ExpandedRun> = match &plan {
        Some(plan) => expand(&base, plan)?,
        None => vec![single(&base)],
    };
    let pairs = prepare(&batch_root, runs)?;
    info!(mode = %mode, runs = pairs.len(), batch = %batch_root.display(), "batch prepared");

    let request = RunRequest {
        runner: &args.runner,
        methods: &args.methods,
    };
    let records = match mode {
        RunMode::Single => execute_single(&default_registry(), request, &pairs)?,
        RunMode::Serial => execute_serial(&default_registry(), request, &pairs)?,
        RunMode::Parallel => {
            let options = ParallelOptions {
                max_workers: args.workers,
                worker: WorkerCommand::current_exe("exec-one")?,
            };
            execute_parallel(request, &pairs, &options)
        }
        RunMode::Cluster => {
            let options = ClusterOptions {
                dialect: dialect_for(&args.scheduler)?,
                resources: JobResources {
                    cpus: args.cpus,
                    gpus: args.gpus,
                    gpu_type: args.gpu_type.clone(),
                    memory_gb: args.memory,
                    walltime: args.walltime.clone(),
                    partition: args.partition.clone(),
                },
                setup_lines: args.setup.clone(),
                worker: WorkerCommand::current_exe("exec-one")?,
                debug_local: args.debug_local,
            };
            execute_cluster(request, &pairs, &options)
        }
    };

    let report = aggregate(stamp, hash, records);
    persist_report(&batch_root, &report)?;
    println!("batch: {}", batch_root.display());
    print_summary(&report);
    Ok(if report.is_success() { 0 } else { 1 })
}

fn resolve_plan(args: &RunArgs, mode: RunMode) -> Result<Option<SweepPlan>, RexError> {
    let mut plan = match &args.sweep {
        Some(path) => Some(SweepPlan::load_yaml(path)?),
        None => None,
    };
    if let Some(seeds) = &args.seeds {
        let base_plan = plan.get_or_insert(SweepPlan {
            strategy: SweepStrategy::Grid { parameters: vec![] },
            seeds: vec![],
        });
        base_plan.seeds = seeds.clone();
    }
    if plan.is_none() && mode != RunMode::Single {
        return Err(RexError::Sweep(
            ErrorInfo::new(
                "sweep-required",
                format!("{mode} mode needs a sweep plan or seeds to define its runs"),
            )
            .with_hint("pass --sweep plan.yaml or --seeds 0,1,2"),
        ));
    }
    Ok(plan)
}
