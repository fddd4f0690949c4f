//! Built-in runner mapping method names to shell command lines.
//!
//! Methods are declared in the configuration under `commands:`; each value
//! is executed through `sh -c` with the workspace as working directory and
//! the run's identity exported as `REX_*` environment variables. This is
//! the runner worker processes and cluster jobs execute by default.

use std::collections::BTreeMap;
use std::process::Command;

use rex_core::{Configuration, ErrorInfo, RexError, Runner, RunnerFactory, WorkspacePaths};
use serde_json::Value;

/// Configuration key holding the method-to-command mapping.
pub const COMMANDS_KEY: &str = "commands";

pub struct ShellRunner {
    commands: BTreeMap<String, String>,
    paths: WorkspacePaths,
    seed: Option<u64>,
}

impl Runner for ShellRunner {
    fn invoke(&mut self, method: &str) -> Result<(), ErrorInfo> {
        let line = self.commands.get(method).ok_or_else(|| {
            ErrorInfo::new(
                "shell-method-unknown",
                format!("no command declared for method '{method}'"),
            )
            .with_hint(format!(
                "declare it under '{COMMANDS_KEY}:' in the configuration"
            ))
        })?;
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(line)
            .current_dir(&self.paths.root)
            .env("REX_RUN_ID", &self.paths.run_id)
            .env("REX_CONFIG", &self.paths.config_snapshot)
            .env("REX_CHECKPOINT_DIR", &self.paths.checkpoint_dir)
            .env("REX_LOG_DIR", &self.paths.log_dir);
        if let Some(seed) = self.seed {
            command.env("REX_SEED", seed.to_string());
        }
        let status = command.status().map_err(|err| {
            ErrorInfo::new("shell-spawn", err.to_string()).with_context("command", line.clone())
        })?;
        if !status.success() {
            return Err(ErrorInfo::new(
                "shell-exit",
                format!("command exited with {status}"),
            )
            .with_context("command", line.clone()));
        }
        Ok(())
    }
}

/// Factory for [`ShellRunner`], registered as `shell`.
pub struct ShellRunnerFactory;

impl RunnerFactory for ShellRunnerFactory {
    fn build(
        &self,
        config: &Configuration,
        paths: &WorkspacePaths,
    ) -> Result<Box<dyn Runner>, RexError> {
        let table = config.get(COMMANDS_KEY).ok_or_else(|| {
            RexError::Runner(
                ErrorInfo::new("shell-commands-missing", "configuration has no command table")
                    .with_hint(format!("add a '{COMMANDS_KEY}:' mapping of method to shell line")),
            )
        })?;
        let entries = table.as_object().ok_or_else(|| {
            RexError::Runner(ErrorInfo::new(
                "shell-commands-invalid",
                format!("'{COMMANDS_KEY}' must map method names to strings"),
            ))
        })?;
        let mut commands = BTreeMap::new();
        for (method, line) in entries {
            match line {
                Value::String(line) => {
                    commands.insert(method.clone(), line.clone());
                }
                _ => {
                    return Err(RexError::Runner(
                        ErrorInfo::new(
                            "shell-commands-invalid",
                            "command line must be a string",
                        )
                        .with_context("method", method.clone()),
                    ))
                }
            }
        }
        Ok(Box::new(ShellRunner {
            commands,
            paths: paths.clone(),
            seed: config.seed(),
        }))
    }
}

/// Registry with the built-in runners this binary can resolve.
pub fn default_registry() -> rex_core::RunnerRegistry {
    let mut registry = rex_core::RunnerRegistry::new();
    registry.register("shell", Box::new(ShellRunnerFactory));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(root: &std::path::Path) -> WorkspacePaths {
        WorkspacePaths {
            run_id: "run".to_string(),
            root: root.to_path_buf(),
            config_snapshot: root.join("config.yaml"),
            checkpoint_dir: root.join("checkpoints"),
            log_dir: root.join("logs"),
        }
    }

    #[test]
    fn commands_run_in_the_workspace_with_env() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = Configuration::from_yaml_str(
            "seed: 9\ncommands:\n  train: printf '%s' \"$REX_RUN_ID:$REX_SEED\" > trained\n",
        )
        .expect("parse");
        let mut runner = ShellRunnerFactory
            .build(&config, &paths(tmp.path()))
            .expect("build");
        runner.invoke("train").expect("invoke");
        let contents = std::fs::read_to_string(tmp.path().join("trained")).expect("read");
        assert_eq!(contents, "run:9");
    }

    #[test]
    fn failing_command_reports_exit_status() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config =
            Configuration::from_yaml_str("commands:\n  train: exit 7\n").expect("parse");
        let mut runner = ShellRunnerFactory
            .build(&config, &paths(tmp.path()))
            .expect("build");
        let err = runner.invoke("train").unwrap_err();
        assert_eq!(err.code, "shell-exit");
    }

    #[test]
    fn missing_command_table_fails_at_build() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = Configuration::from_yaml_str("lr: 0.1\n").expect("parse");
        let err = ShellRunnerFactory
            .build(&config, &paths(tmp.path()))
            .err()
            .expect("error");
        assert_eq!(err.info().code, "shell-commands-missing");
    }

    #[test]
    fn undeclared_method_is_a_method_failure() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config =
            Configuration::from_yaml_str("commands:\n  train: 'true'\n").expect("parse");
        let mut runner = ShellRunnerFactory
            .build(&config, &paths(tmp.path()))
            .expect("build");
        let err = runner.invoke("plot").unwrap_err();
        assert_eq!(err.code, "shell-method-unknown");
    }
}
