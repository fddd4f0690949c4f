//! Run workspaces, runner invocation and execution strategies for rex.

mod aggregate;
mod executor;
mod invoker;
mod worker;
mod workspace;

pub use aggregate::{aggregate, persist_report, REPORT_FILE, RUNS_CSV};
pub use executor::{
    execute_cluster, execute_parallel, execute_serial, execute_single, prepare, ClusterOptions,
    ParallelOptions, PreparedRun, RunMode, RunRequest,
};
pub use invoker::{invoke, invoke_named, Outcome};
pub use worker::WorkerCommand;
pub use workspace::{
    Workspace, CHECKPOINTS_DIR, CONFIG_SNAPSHOT, ERROR_LOG, LOGS_DIR, OUTCOME_FILE, OUTPUT_LOG,
    OVERRIDES_FILE,
};
