//! Per-run workspace allocation.
//!
//! A workspace is built in a staging directory and renamed into place, so a
//! caller never observes a partially created run tree. The configuration
//! snapshot is on disk before any runner method can execute.

use std::fs;
use std::path::{Path, PathBuf};

use rex_core::{keys, Configuration, ErrorInfo, Override, RexError, WorkspacePaths};
use serde_json::json;
use tracing::info;

use crate::invoker::Outcome;

/// File name of the resolved configuration snapshot.
pub const CONFIG_SNAPSHOT: &str = "config.yaml";
/// File name of the per-run override list.
pub const OVERRIDES_FILE: &str = "overrides.json";
/// File name of the outcome record written after a run.
pub const OUTCOME_FILE: &str = "outcome.json";
/// Directory reserved for runner checkpoints.
pub const CHECKPOINTS_DIR: &str = "checkpoints";
/// Directory reserved for logs and data files.
pub const LOGS_DIR: &str = "logs";
/// Captured stdout of worker processes and cluster jobs.
pub const OUTPUT_LOG: &str = "output.log";
/// Captured stderr of worker processes and cluster jobs.
pub const ERROR_LOG: &str = "error.log";

/// An allocated, isolated run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    paths: WorkspacePaths,
}

impl Workspace {
    /// Allocates `<root>/<run_id>/` with snapshot, overrides and run
    /// subdirectories.
    ///
    /// The resolved snapshot additionally carries the orchestrator keys
    /// (`run_id`, `checkpoint_dir`, `log_dir`), so the file alone is enough
    /// to re-invoke the run. An existing target directory fails with a
    /// `workspace-collision` error rather than overwriting.
    pub fn allocate(
        root: &Path,
        run_id: &str,
        config: &Configuration,
        overrides: &[Override],
    ) -> Result<Self, RexError> {
        validate_run_id(run_id)?;
        let final_dir = root.join(run_id);
        if final_dir.exists() {
            return Err(RexError::Workspace(
                ErrorInfo::new("workspace-collision", "run id already allocated under this root")
                    .with_context("run_id", run_id.to_string())
                    .with_context("path", final_dir.display().to_string()),
            ));
        }
        fs::create_dir_all(root).map_err(|err| io_error("workspace-root", root, err))?;

        let paths = WorkspacePaths {
            run_id: run_id.to_string(),
            root: final_dir.clone(),
            config_snapshot: final_dir.join(CONFIG_SNAPSHOT),
            checkpoint_dir: final_dir.join(CHECKPOINTS_DIR),
            log_dir: final_dir.join(LOGS_DIR),
        };
        let resolved = config.with_overrides(&[
            Override::new(keys::RUN_ID, json!(run_id)),
            Override::new(
                keys::CHECKPOINT_DIR,
                json!(paths.checkpoint_dir.display().to_string()),
            ),
            Override::new(keys::LOG_DIR, json!(paths.log_dir.display().to_string())),
        ]);

        let staging = root.join(format!(".stage-{run_id}"));
        if staging.exists() {
            // Leftover from a crashed allocation; safe to discard.
            fs::remove_dir_all(&staging)
                .map_err(|err| io_error("workspace-stage-clear", &staging, err))?;
        }
        if let Err(err) = populate_staging(&staging, &resolved, overrides) {
            let _ = fs::remove_dir_all(&staging);
            return Err(err);
        }
        if let Err(err) = fs::rename(&staging, &final_dir) {
            let _ = fs::remove_dir_all(&staging);
            if final_dir.exists() {
                return Err(RexError::Workspace(
                    ErrorInfo::new("workspace-collision", "run id allocated concurrently")
                        .with_context("run_id", run_id.to_string())
                        .with_context("path", final_dir.display().to_string()),
                ));
            }
            return Err(io_error("workspace-commit", &final_dir, err));
        }
        info!(run_id, path = %final_dir.display(), "workspace allocated");
        Ok(Self { paths })
    }

    /// Opens an existing workspace directory (worker processes, `exec-one`).
    pub fn open(dir: &Path) -> Result<Self, RexError> {
        let run_id = dir
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                RexError::Workspace(
                    ErrorInfo::new("workspace-open", "directory has no usable name")
                        .with_context("path", dir.display().to_string()),
                )
            })?
            .to_string();
        let snapshot = dir.join(CONFIG_SNAPSHOT);
        if !snapshot.is_file() {
            return Err(RexError::Workspace(
                ErrorInfo::new("workspace-open", "configuration snapshot missing")
                    .with_context("path", snapshot.display().to_string())
                    .with_hint("was this directory produced by a rex allocation?"),
            ));
        }
        Ok(Self {
            paths: WorkspacePaths {
                run_id,
                root: dir.to_path_buf(),
                config_snapshot: snapshot,
                checkpoint_dir: dir.join(CHECKPOINTS_DIR),
                log_dir: dir.join(LOGS_DIR),
            },
        })
    }

    /// Filesystem identity of this workspace.
    pub fn paths(&self) -> &WorkspacePaths {
        &self.paths
    }

    /// Workspace root directory.
    pub fn dir(&self) -> &Path {
        &self.paths.root
    }

    /// Run id owning this workspace.
    pub fn run_id(&self) -> &str {
        &self.paths.run_id
    }

    /// Loads the resolved configuration snapshot.
    pub fn load_config(&self) -> Result<Configuration, RexError> {
        Configuration::load_yaml(&self.paths.config_snapshot)
    }

    /// Path of the captured stdout log.
    pub fn output_log(&self) -> PathBuf {
        self.paths.log_dir.join(OUTPUT_LOG)
    }

    /// Path of the captured stderr log.
    pub fn error_log(&self) -> PathBuf {
        self.paths.log_dir.join(ERROR_LOG)
    }

    /// Writes the run outcome record.
    pub fn write_outcome(&self, outcome: &Outcome) -> Result<(), RexError> {
        let path = self.paths.root.join(OUTCOME_FILE);
        let json = serde_json::to_string_pretty(outcome)
            .map_err(|err| RexError::Serde(ErrorInfo::new("outcome-serialize", err.to_string())))?;
        fs::write(&path, json).map_err(|err| io_error("outcome-write", &path, err))
    }

    /// Loads the run outcome record, if the run got far enough to write one.
    pub fn load_outcome(&self) -> Result<Outcome, RexError> {
        let path = self.paths.root.join(OUTCOME_FILE);
        let contents =
            fs::read_to_string(&path).map_err(|err| io_error("outcome-read", &path, err))?;
        serde_json::from_str(&contents).map_err(|err| {
            RexError::Serde(
                ErrorInfo::new("outcome-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

fn populate_staging(
    staging: &Path,
    resolved: &Configuration,
    overrides: &[Override],
) -> Result<(), RexError> {
    fs::create_dir(staging).map_err(|err| io_error("workspace-stage", staging, err))?;
    fs::create_dir(staging.join(CHECKPOINTS_DIR))
        .map_err(|err| io_error("workspace-stage", staging, err))?;
    fs::create_dir(staging.join(LOGS_DIR))
        .map_err(|err| io_error("workspace-stage", staging, err))?;
    resolved.write_yaml(&staging.join(CONFIG_SNAPSHOT))?;
    let overrides_json = serde_json::to_string_pretty(overrides)
        .map_err(|err| RexError::Serde(ErrorInfo::new("overrides-serialize", err.to_string())))?;
    let overrides_path = staging.join(OVERRIDES_FILE);
    fs::write(&overrides_path, overrides_json)
        .map_err(|err| io_error("overrides-write", &overrides_path, err))
}

fn validate_run_id(run_id: &str) -> Result<(), RexError> {
    let ok = !run_id.is_empty()
        && !run_id.starts_with('.')
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        return Ok(());
    }
    Err(RexError::Workspace(
        ErrorInfo::new("workspace-run-id", "run id is not a valid directory name")
            .with_context("run_id", run_id.to_string()),
    ))
}

fn io_error(code: &str, path: &Path, err: std::io::Error) -> RexError {
    RexError::Workspace(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rex_core::RunStatus;

    fn base() -> Configuration {
        Configuration::from_yaml_str("lr: 0.1\n").expect("parse")
    }

    #[test]
    fn allocation_writes_snapshot_with_orchestrator_keys() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ws = Workspace::allocate(tmp.path(), "job_0000", &base(), &[]).expect("allocate");
        let config = ws.load_config().expect("load");
        assert_eq!(config.get_str(keys::RUN_ID), Some("job_0000"));
        assert!(config.get_str(keys::CHECKPOINT_DIR).unwrap().ends_with("checkpoints"));
        assert!(ws.paths().checkpoint_dir.is_dir());
        assert!(ws.paths().log_dir.is_dir());
        assert!(ws.dir().join(OVERRIDES_FILE).is_file());
    }

    #[test]
    fn distinct_run_ids_never_overlap() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let a = Workspace::allocate(tmp.path(), "a", &base(), &[]).expect("allocate");
        let b = Workspace::allocate(tmp.path(), "b", &base(), &[]).expect("allocate");
        assert_ne!(a.dir(), b.dir());
        assert!(!a.dir().starts_with(b.dir()));
        assert!(!b.dir().starts_with(a.dir()));
    }

    #[test]
    fn same_run_id_collides_instead_of_overwriting() {
        let tmp = tempfile::tempdir().expect("tempdir");
        Workspace::allocate(tmp.path(), "job_0000", &base(), &[]).expect("allocate");
        let err = Workspace::allocate(tmp.path(), "job_0000", &base(), &[]).unwrap_err();
        assert_eq!(err.info().code, "workspace-collision");
    }

    #[test]
    fn invalid_run_id_leaves_no_partial_tree() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = Workspace::allocate(tmp.path(), "a/b", &base(), &[]).unwrap_err();
        assert_eq!(err.info().code, "workspace-run-id");
        assert!(fs::read_dir(tmp.path()).expect("read dir").next().is_none());
    }

    #[test]
    fn outcome_round_trips_through_workspace() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ws = Workspace::allocate(tmp.path(), "run", &base(), &[]).expect("allocate");
        let outcome = Outcome {
            run_id: "run".to_string(),
            status: RunStatus::Succeeded,
            cause: None,
            invoked: vec!["train".to_string()],
        };
        ws.write_outcome(&outcome).expect("write");
        assert_eq!(ws.load_outcome().expect("load"), outcome);
    }

    #[test]
    fn open_rejects_directories_without_snapshot() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("not-a-workspace");
        fs::create_dir(&dir).expect("mkdir");
        let err = Workspace::open(&dir).unwrap_err();
        assert_eq!(err.info().code, "workspace-open");
    }
}
