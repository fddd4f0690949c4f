use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use rex_core::RunStatus;
use rex_run::{invoke_named, Workspace};

use crate::shell_runner::default_registry;

#[derive(Args, Debug)]
pub struct ExecOneArgs {
    /// Workspace directory of an already-allocated run.
    #[arg(long)]
    pub workspace: PathBuf,
    /// Registered runner to drive.
    #[arg(long, default_value = "shell")]
    pub runner: String,
    /// Ordered runner methods, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub methods: Vec<String>,
}

/// Worker entry point: executes one run from its workspace snapshot.
///
/// Parallel workers and cluster job scripts re-invoke the binary through
/// this subcommand; the parent recovers the result from the outcome file
/// this writes, with the exit code as fallback.
pub fn run(args: &ExecOneArgs) -> Result<i32, Box<dyn Error>> {
    let workspace = Workspace::open(&args.workspace)?;
    let config = workspace.load_config()?;
    let outcome = invoke_named(
        &default_registry(),
        &args.runner,
        &config,
        workspace.paths(),
        &args.methods,
    )?;
    workspace.write_outcome(&outcome)?;
    if let Some(cause) = &outcome.cause {
        eprintln!("run {} failed: {cause}", outcome.run_id);
    }
    Ok(if outcome.status == RunStatus::Succeeded {
        0
    } else {
        1
    })
}
