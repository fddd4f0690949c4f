//! Per-run records and the aggregate execution report.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Override;
use crate::errors::{ErrorInfo, RexError};

/// Lifecycle state of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Created but not yet dispatched.
    Pending,
    /// Dispatched and currently executing locally.
    Running,
    /// All requested methods completed.
    Succeeded,
    /// A method, worker process or submission failed.
    Failed,
    /// Handed to an external scheduler; remote lifecycle unknown.
    Submitted,
}

impl RunStatus {
    /// Whether the status is terminal for this orchestration invocation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Submitted
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Submitted => "submitted",
        };
        f.write_str(label)
    }
}

/// Record describing one run's identity and outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Identifier unique within the batch.
    pub run_id: String,
    /// Workspace directory allocated to the run.
    pub workspace: PathBuf,
    /// Overrides applied to the base configuration for this run.
    #[serde(default)]
    pub overrides: Vec<Override>,
    /// Seed assigned by the expansion, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Current lifecycle state.
    pub status: RunStatus,
    /// Failure payload when `status` is [`RunStatus::Failed`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<ErrorInfo>,
    /// Dispatch time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Completion (or submission) time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Creates a pending record for a run that has not been dispatched yet.
    pub fn pending(
        run_id: impl Into<String>,
        workspace: impl Into<PathBuf>,
        overrides: Vec<Override>,
        seed: Option<u64>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            workspace: workspace.into(),
            overrides,
            seed,
            status: RunStatus::Pending,
            cause: None,
            started_at: None,
            ended_at: None,
        }
    }

    /// Marks the record as running as of now.
    pub fn mark_started(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Marks the record succeeded.
    pub fn mark_succeeded(&mut self) {
        self.status = RunStatus::Succeeded;
        self.ended_at = Some(Utc::now());
    }

    /// Marks the record failed with the given cause.
    pub fn mark_failed(&mut self, cause: ErrorInfo) {
        self.status = RunStatus::Failed;
        self.cause = Some(cause);
        self.ended_at = Some(Utc::now());
    }

    /// Marks the record as submitted to an external scheduler.
    pub fn mark_submitted(&mut self) {
        self.status = RunStatus::Submitted;
        self.ended_at = Some(Utc::now());
    }
}

/// Overall outcome of an orchestration invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// Every run succeeded or was accepted by the scheduler.
    Succeeded,
    /// At least one run failed.
    PartialFailure,
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OverallStatus::Succeeded => "succeeded",
            OverallStatus::PartialFailure => "partial_failure",
        };
        f.write_str(label)
    }
}

/// Ordered set of run records plus batch-level identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Timestamp label of the batch directory.
    pub stamp: String,
    /// Stable hash of (sweep plan, base configuration).
    pub plan_hash: String,
    /// Overall invocation outcome.
    pub overall: OverallStatus,
    /// Records in input (expansion) order, regardless of completion order.
    pub runs: Vec<RunRecord>,
}

impl ExecutionReport {
    /// Assembles a report, deriving the overall status from the records.
    pub fn from_records(
        stamp: impl Into<String>,
        plan_hash: impl Into<String>,
        runs: Vec<RunRecord>,
    ) -> Self {
        let overall = if runs
            .iter()
            .all(|r| matches!(r.status, RunStatus::Succeeded | RunStatus::Submitted))
        {
            OverallStatus::Succeeded
        } else {
            OverallStatus::PartialFailure
        };
        Self {
            stamp: stamp.into(),
            plan_hash: plan_hash.into(),
            overall,
            runs,
        }
    }

    /// Whether every run succeeded or was submitted.
    pub fn is_success(&self) -> bool {
        self.overall == OverallStatus::Succeeded
    }

    /// Writes the report to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), RexError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                RexError::Serde(
                    ErrorInfo::new("report-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            RexError::Serde(
                ErrorInfo::new("report-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            RexError::Serde(
                ErrorInfo::new("report-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Loads a report from disk.
    pub fn load(path: &Path) -> Result<Self, RexError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            RexError::Serde(
                ErrorInfo::new("report-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            RexError::Serde(
                ErrorInfo::new("report-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_status_requires_every_run_terminal_good() {
        let mut ok = RunRecord::pending("a", "/tmp/a", vec![], None);
        ok.mark_started();
        ok.mark_succeeded();
        let mut bad = RunRecord::pending("b", "/tmp/b", vec![], None);
        bad.mark_started();
        bad.mark_failed(ErrorInfo::new("runner-method", "train exploded"));

        let report = ExecutionReport::from_records("stamp", "hash", vec![ok.clone(), bad]);
        assert_eq!(report.overall, OverallStatus::PartialFailure);

        let mut submitted = RunRecord::pending("c", "/tmp/c", vec![], None);
        submitted.mark_submitted();
        let report = ExecutionReport::from_records("stamp", "hash", vec![ok, submitted]);
        assert_eq!(report.overall, OverallStatus::Succeeded);
        assert!(report.is_success());
    }
}
