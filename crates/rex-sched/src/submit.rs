//! Synchronous job submission: script written into the workspace first,
//! then handed to the scheduler's submit command.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use rex_core::{ErrorInfo, RexError};
use tracing::{info, warn};

use crate::dialect::{JobRequest, SchedulerDialect};

/// Receipt for an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionHandle {
    /// Scheduler job id, when it could be parsed from stdout.
    pub job_id: Option<String>,
    /// Raw stdout of the submit command.
    pub raw_stdout: String,
    /// Path of the job script written for auditability.
    pub script_path: PathBuf,
}

/// Renders and submits one job.
///
/// The script always lands in the workspace before anything is executed, so
/// a failed submission is still post-mortem inspectable. With `debug_local`
/// the run command executes inline through `sh` instead of being submitted,
/// which exercises the full script path without a scheduler present.
pub fn submit(
    dialect: &dyn SchedulerDialect,
    request: &JobRequest,
    workspace_dir: &Path,
    debug_local: bool,
) -> Result<SubmissionHandle, RexError> {
    let script = dialect.render_script(request);
    let script_path = workspace_dir.join(dialect.script_file_name());
    fs::write(&script_path, &script).map_err(|err| {
        RexError::Submission(
            ErrorInfo::new("script-write", err.to_string())
                .with_context("path", script_path.display().to_string()),
        )
    })?;

    let output = if debug_local {
        Command::new("sh").arg("-c").arg(&request.run_command).output()
    } else {
        Command::new(dialect.submit_program()).arg(&script_path).output()
    };

    let output = output.map_err(|err| {
        let info = ErrorInfo::new("submit-spawn", err.to_string())
            .with_context("program", dialect.submit_program().to_string());
        let info = if err.kind() == io::ErrorKind::NotFound {
            info.with_hint("is the scheduler's submit command on PATH?")
        } else {
            info
        };
        RexError::Submission(info)
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let log_path = workspace_dir.join("logs").join("submit.log");
    if let Err(err) = fs::write(&log_path, format!("{stdout}{stderr}")) {
        warn!(path = %log_path.display(), error = %err, "could not record submission output");
    }

    if !output.status.success() {
        return Err(RexError::Submission(
            ErrorInfo::new(
                "submit-exit",
                format!("submit command exited with {}", output.status),
            )
            .with_context("program", dialect.submit_program().to_string())
            .with_context("stderr", stderr.trim().to_string()),
        ));
    }

    let job_id = if debug_local {
        None
    } else {
        dialect.parse_job_id(&stdout)
    };
    info!(
        scheduler = dialect.name(),
        job_id = job_id.as_deref().unwrap_or("?"),
        script = %script_path.display(),
        "job submitted"
    );
    Ok(SubmissionHandle {
        job_id,
        raw_stdout: stdout,
        script_path,
    })
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use super::*;
    use crate::dialect::{JobResources, Slurm};

    fn request(workspace: &Path) -> JobRequest {
        JobRequest {
            run_command: "true".to_string(),
            resources: JobResources::default(),
            setup_lines: vec![],
            output_path: workspace.join("logs/output.log"),
            error_path: workspace.join("logs/error.log"),
        }
    }

    fn write_stub(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write stub");
        let mut perms = fs::metadata(&path).expect("stat").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("chmod");
        path
    }

    fn workspace(dir: &Path) -> PathBuf {
        let ws = dir.join("ws");
        fs::create_dir_all(ws.join("logs")).expect("mkdir");
        ws
    }

    #[test]
    fn successful_submission_returns_job_id_and_writes_script() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ws = workspace(tmp.path());
        let stub = write_stub(tmp.path(), "sbatch", "echo Submitted batch job 77");
        let dialect = Slurm::with_submit_program(stub.display().to_string());
        let handle = submit(&dialect, &request(&ws), &ws, false).expect("submit");
        assert_eq!(handle.job_id, Some("77".to_string()));
        assert!(handle.script_path.exists());
        let script = fs::read_to_string(&handle.script_path).expect("read script");
        assert!(script.contains("#SBATCH --ntasks=4"));
    }

    #[test]
    fn nonzero_submit_exit_is_a_submission_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ws = workspace(tmp.path());
        let stub = write_stub(tmp.path(), "sbatch", "echo broken >&2; exit 3");
        let dialect = Slurm::with_submit_program(stub.display().to_string());
        let err = submit(&dialect, &request(&ws), &ws, false).unwrap_err();
        assert_eq!(err.info().code, "submit-exit");
        assert!(err.info().context["stderr"].contains("broken"));
        // script still written before the failed attempt
        assert!(ws.join("job_script.sh").exists());
    }

    #[test]
    fn missing_submit_program_is_a_spawn_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ws = workspace(tmp.path());
        let dialect = Slurm::with_submit_program("/nonexistent/sbatch-missing");
        let err = submit(&dialect, &request(&ws), &ws, false).unwrap_err();
        assert_eq!(err.info().code, "submit-spawn");
    }

    #[test]
    fn debug_local_runs_the_command_inline() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ws = workspace(tmp.path());
        let marker = ws.join("ran");
        let mut req = request(&ws);
        req.run_command = format!("touch {}", marker.display());
        let dialect = Slurm::default();
        let handle = submit(&dialect, &req, &ws, true).expect("submit");
        assert!(marker.exists());
        assert_eq!(handle.job_id, None);
    }
}
