//! Worker re-invocation: the command line that reproduces one run in a
//! fresh process, shared by the parallel strategy and cluster job scripts.

use std::path::{Path, PathBuf};
use std::process::Command;

use rex_core::{ErrorInfo, RexError};

/// A command prefix that accepts the standard worker arguments
/// (`--workspace <dir> --runner <name> --methods <a,b>`) appended to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl WorkerCommand {
    /// Builds a worker command from an explicit program and leading args.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Re-invokes the current executable with the given subcommand; the
    /// default for binaries embedding the orchestrator.
    pub fn current_exe(subcommand: &str) -> Result<Self, RexError> {
        let exe = std::env::current_exe().map_err(|err| {
            RexError::Runner(ErrorInfo::new("worker-exe", err.to_string()).with_hint(
                "pass an explicit worker command when the executable path is unavailable",
            ))
        })?;
        Ok(Self::new(exe, vec![subcommand.to_string()]))
    }

    fn worker_args(workspace: &Path, runner: &str, methods: &[String]) -> Vec<String> {
        vec![
            "--workspace".to_string(),
            workspace.display().to_string(),
            "--runner".to_string(),
            runner.to_string(),
            "--methods".to_string(),
            methods.join(","),
        ]
    }

    /// Builds a spawnable [`Command`] for one run.
    pub fn command(&self, workspace: &Path, runner: &str, methods: &[String]) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command.args(Self::worker_args(workspace, runner, methods));
        command
    }

    /// Renders the invocation as a single shell line for job scripts.
    pub fn shell_line(&self, workspace: &Path, runner: &str, methods: &[String]) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.extend(Self::worker_args(workspace, runner, methods));
        parts
            .iter()
            .map(|part| shell_quote(part))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn shell_quote(part: &str) -> String {
    let plain = part
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ',' | ':' | '='));
    if plain && !part.is_empty() {
        part.to_string()
    } else {
        format!("'{}'", part.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_line_quotes_only_where_needed() {
        let worker = WorkerCommand::new("/usr/local/bin/rex", vec!["exec-one".to_string()]);
        let methods = vec!["train".to_string(), "test".to_string()];
        let line = worker.shell_line(Path::new("/tmp/batch/job_0000"), "shell", &methods);
        let expected = "/usr/local/bin/rex exec-one --workspace /tmp/batch/job_0000 \
--runner shell --methods train,test";
        assert_eq!(line, expected);
        let odd = worker.shell_line(Path::new("/tmp/my runs/job"), "shell", &methods);
        assert!(odd.contains("'/tmp/my runs/job'"));
    }
}
