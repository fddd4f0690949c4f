//! Execution strategies: single, serial, parallel workers, cluster submit.
//!
//! All strategies share the same shape: consume prepared (configuration,
//! workspace) pairs, return one [`RunRecord`] per pair in input order. A
//! failure inside one run never aborts its siblings; only pre-execution
//! errors (arity misuse, unknown runner name) abort the invocation.

use std::fs::File;
use std::path::Path;
use std::process::{Child, ExitStatus, Stdio};
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use rex_core::{ErrorInfo, RexError, RunRecord, RunnerRegistry};
use rex_sched::{JobRequest, JobResources, SchedulerDialect};
use rex_sweep::ExpandedRun;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::invoker::{invoke, Outcome};
use crate::worker::WorkerCommand;
use crate::workspace::Workspace;

/// Interval between poll sweeps over active worker processes.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Closed set of run modes selectable by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Exactly one run, in-process.
    Single,
    /// Every run in-process, one after another.
    Serial,
    /// Every run in its own bounded-pool worker process.
    Parallel,
    /// Every run submitted to an external scheduler.
    Cluster,
}

impl FromStr for RunMode {
    type Err = RexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(RunMode::Single),
            "serial" => Ok(RunMode::Serial),
            "parallel" => Ok(RunMode::Parallel),
            "cluster" => Ok(RunMode::Cluster),
            other => Err(RexError::Arity(
                ErrorInfo::new("run-mode-unknown", format!("unknown run mode '{other}'"))
                    .with_hint("expected one of: single, serial, parallel, cluster"),
            )),
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RunMode::Single => "single",
            RunMode::Serial => "serial",
            RunMode::Parallel => "parallel",
            RunMode::Cluster => "cluster",
        };
        f.write_str(label)
    }
}

/// An expanded run paired with its allocated workspace.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    /// Expansion output: identity, overrides, resolved configuration.
    pub run: ExpandedRun,
    /// Workspace owned exclusively by this run.
    pub workspace: Workspace,
}

impl PreparedRun {
    fn pending_record(&self) -> RunRecord {
        RunRecord::pending(
            self.run.run_id.clone(),
            self.workspace.dir(),
            self.run.overrides.clone(),
            self.run.seed,
        )
    }
}

/// Allocates one workspace per expanded run under `root`.
///
/// Allocation precedes all execution; any failure here aborts the batch
/// before a single runner method has executed.
pub fn prepare(root: &Path, runs: Vec<ExpandedRun>) -> Result<Vec<PreparedRun>, RexError> {
    let mut prepared = Vec::with_capacity(runs.len());
    for run in runs {
        let workspace = Workspace::allocate(root, &run.run_id, &run.config, &run.overrides)?;
        prepared.push(PreparedRun { run, workspace });
    }
    Ok(prepared)
}

/// What to run: the registered runner and the ordered method list.
#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    /// Name the runner is registered under.
    pub runner: &'a str,
    /// Methods invoked in order on each run's runner.
    pub methods: &'a [String],
}

/// Options for the parallel strategy.
pub struct ParallelOptions {
    /// Upper bound on concurrently live worker processes (minimum 1).
    pub max_workers: usize,
    /// Command re-invoking one run in a fresh process.
    pub worker: WorkerCommand,
}

/// Options for the cluster strategy.
pub struct ClusterOptions {
    /// Scheduler dialect rendering and submitting job scripts.
    pub dialect: Box<dyn SchedulerDialect>,
    /// Resource directives attached to every job.
    pub resources: JobResources,
    /// Environment setup lines inserted before the run command.
    pub setup_lines: Vec<String>,
    /// Command re-invoking one run, rendered into the job script.
    pub worker: WorkerCommand,
    /// Run the job command inline instead of submitting (pipeline testing).
    pub debug_local: bool,
}

/// Single strategy: exactly one prepared run, executed in-process.
pub fn execute_single(
    registry: &RunnerRegistry,
    request: RunRequest<'_>,
    pairs: &[PreparedRun],
) -> Result<Vec<RunRecord>, RexError> {
    if pairs.len() != 1 {
        return Err(RexError::Arity(
            ErrorInfo::new("arity-single", "single mode requires exactly one run")
                .with_context("runs", pairs.len().to_string())
                .with_hint("use serial or parallel mode for multi-run batches"),
        ));
    }
    execute_serial(registry, request, pairs)
}

/// Serial strategy: in-process runs in input order, isolated failures.
pub fn execute_serial(
    registry: &RunnerRegistry,
    request: RunRequest<'_>,
    pairs: &[PreparedRun],
) -> Result<Vec<RunRecord>, RexError> {
    let factory = registry.resolve(request.runner)?;
    let mut records = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let mut record = pair.pending_record();
        record.mark_started();
        info!(run_id = record.run_id.as_str(), "starting run");
        match pair.workspace.load_config() {
            Ok(config) => {
                let outcome = invoke(factory, &config, pair.workspace.paths(), request.methods);
                if let Err(err) = pair.workspace.write_outcome(&outcome) {
                    warn!(run_id = record.run_id.as_str(), error = %err, "could not persist outcome");
                }
                apply_outcome(&mut record, outcome);
            }
            Err(err) => record.mark_failed(err.info().clone()),
        }
        records.push(record);
    }
    Ok(records)
}

/// Parallel strategy: a bounded pool of worker processes.
///
/// Workers never share in-process state; results travel back through each
/// workspace's outcome file with the exit status as fallback. All workers
/// run to completion regardless of sibling failures, and records come back
/// in input order.
pub fn execute_parallel(request: RunRequest<'_>, pairs: &[PreparedRun], options: &ParallelOptions) -> Vec<RunRecord> {
    let limit = options.max_workers.max(1);
    let mut records: Vec<RunRecord> = pairs.iter().map(PreparedRun::pending_record).collect();
    let mut active: Vec<(usize, Child)> = Vec::new();
    let mut next = 0usize;

    loop {
        while active.len() < limit && next < pairs.len() {
            let idx = next;
            next += 1;
            records[idx].mark_started();
            match spawn_worker(&options.worker, &pairs[idx], request) {
                Ok(child) => {
                    info!(run_id = records[idx].run_id.as_str(), pid = child.id(), "worker spawned");
                    active.push((idx, child));
                }
                Err(err) => {
                    warn!(run_id = records[idx].run_id.as_str(), error = %err, "worker spawn failed");
                    records[idx].mark_failed(err.info().clone());
                }
            }
        }
        if active.is_empty() && next >= pairs.len() {
            break;
        }

        let mut offset = 0;
        while offset < active.len() {
            match active[offset].1.try_wait() {
                Ok(Some(status)) => {
                    let (idx, _child) = active.swap_remove(offset);
                    settle_worker(&mut records[idx], &pairs[idx], status);
                }
                Ok(None) => offset += 1,
                Err(err) => {
                    let (idx, mut child) = active.swap_remove(offset);
                    let _ = child.kill();
                    let run_id = records[idx].run_id.clone();
                    records[idx].mark_failed(
                        ErrorInfo::new("worker-wait", err.to_string())
                            .with_context("run_id", run_id),
                    );
                }
            }
        }
        if !active.is_empty() {
            thread::sleep(POLL_INTERVAL);
        }
    }
    records
}

/// Cluster strategy: render, write and submit one job per run.
///
/// Submission is the only local work: a record becomes `submitted` as soon
/// as the scheduler accepts the script, and the remote lifecycle is out of
/// scope. A failed submission is recorded per run without touching siblings.
pub fn execute_cluster(request: RunRequest<'_>, pairs: &[PreparedRun], options: &ClusterOptions) -> Vec<RunRecord> {
    let mut records = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let mut record = pair.pending_record();
        record.mark_started();
        let run_command =
            options
                .worker
                .shell_line(pair.workspace.dir(), request.runner, request.methods);
        let job = JobRequest {
            run_command,
            resources: options.resources.clone(),
            setup_lines: options.setup_lines.clone(),
            output_path: pair.workspace.output_log(),
            error_path: pair.workspace.error_log(),
        };
        match rex_sched::submit(
            options.dialect.as_ref(),
            &job,
            pair.workspace.dir(),
            options.debug_local,
        ) {
            Ok(_handle) if options.debug_local => {
                // The job ran inline; settle from the outcome it left behind.
                match pair.workspace.load_outcome() {
                    Ok(outcome) => apply_outcome(&mut record, outcome),
                    Err(err) => record.mark_failed(err.info().clone()),
                }
            }
            Ok(_handle) => record.mark_submitted(),
            Err(err) => {
                warn!(run_id = record.run_id.as_str(), error = %err, "submission failed");
                record.mark_failed(err.info().clone());
            }
        }
        records.push(record);
    }
    records
}

fn spawn_worker(
    worker: &WorkerCommand,
    pair: &PreparedRun,
    request: RunRequest<'_>,
) -> Result<Child, RexError> {
    let stdout = File::create(pair.workspace.output_log())
        .map_err(|err| worker_error("worker-log", pair, err))?;
    let stderr = File::create(pair.workspace.error_log())
        .map_err(|err| worker_error("worker-log", pair, err))?;
    worker
        .command(pair.workspace.dir(), request.runner, request.methods)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .spawn()
        .map_err(|err| worker_error("worker-spawn", pair, err))
}

fn worker_error(code: &str, pair: &PreparedRun, err: std::io::Error) -> RexError {
    RexError::Runner(
        ErrorInfo::new(code, err.to_string()).with_context("run_id", pair.run.run_id.clone()),
    )
}

fn settle_worker(record: &mut RunRecord, pair: &PreparedRun, status: ExitStatus) {
    match pair.workspace.load_outcome() {
        Ok(outcome) => apply_outcome(record, outcome),
        Err(_) if status.success() => record.mark_failed(
            ErrorInfo::new("worker-outcome-missing", "worker exited cleanly without an outcome")
                .with_context("run_id", record.run_id.clone()),
        ),
        Err(_) => record.mark_failed(
            ErrorInfo::new("worker-exit", format!("worker exited with {status}"))
                .with_context("run_id", record.run_id.clone()),
        ),
    }
}

fn apply_outcome(record: &mut RunRecord, outcome: Outcome) {
    use rex_core::RunStatus;
    match outcome.status {
        RunStatus::Succeeded => record.mark_succeeded(),
        _ => record.mark_failed(outcome.cause.unwrap_or_else(|| {
            ErrorInfo::new("runner-failed", "run failed without a recorded cause")
        })),
    }
}
