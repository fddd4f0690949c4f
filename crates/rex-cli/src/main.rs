use std::error::Error;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use commands::{exec_one::ExecOneArgs, expand::ExpandArgs, report::ReportArgs, run::RunArgs};
use tracing_subscriber::EnvFilter;

mod commands;
mod shell_runner;

#[derive(Parser, Debug)]
#[command(name = "rex", about = "Run-mode orchestration for configured experiments")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Expand, allocate and execute a batch of runs.
    Run(RunArgs),
    /// Show a sweep expansion without executing anything.
    Expand(ExpandArgs),
    /// Execute one run from an existing workspace (worker entry point).
    ExecOne(ExecOneArgs),
    /// Reprint a stored batch report.
    Report(ReportArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn dispatch(cli: &Cli) -> Result<i32, Box<dyn Error>> {
    match &cli.command {
        Command::Run(args) => commands::run::run(args),
        Command::Expand(args) => commands::expand::run(args),
        Command::ExecOne(args) => commands::exec_one::run(args),
        Command::Report(args) => commands::report::run(args),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();
    match dispatch(&cli) {
        Ok(code) => ExitCode::from(code.clamp(0, u8::MAX as i32) as u8),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}
