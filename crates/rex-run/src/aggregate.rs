//! Report assembly and persistence: canonical JSON for machines, a flat
//! CSV table for quick inspection.

use std::fs;
use std::path::Path;

use rex_core::{to_canonical_json_bytes, ErrorInfo, ExecutionReport, RexError, RunRecord};
use tracing::info;

/// File name of the batch report.
pub const REPORT_FILE: &str = "report.json";
/// File name of the per-run summary table.
pub const RUNS_CSV: &str = "runs.csv";

/// Assembles the final report from per-run records, deriving overall status.
pub fn aggregate(
    stamp: impl Into<String>,
    plan_hash: impl Into<String>,
    records: Vec<RunRecord>,
) -> ExecutionReport {
    ExecutionReport::from_records(stamp, plan_hash, records)
}

/// Writes `report.json` (canonical) and `runs.csv` under the batch root.
pub fn persist_report(dir: &Path, report: &ExecutionReport) -> Result<(), RexError> {
    let json_path = dir.join(REPORT_FILE);
    let bytes = to_canonical_json_bytes(report)?;
    fs::write(&json_path, bytes).map_err(|err| {
        RexError::Serde(
            ErrorInfo::new("report-write", err.to_string())
                .with_context("path", json_path.display().to_string()),
        )
    })?;
    write_csv(&dir.join(RUNS_CSV), &report.runs)?;
    info!(
        path = %json_path.display(),
        runs = report.runs.len(),
        overall = %report.overall,
        "report persisted"
    );
    Ok(())
}

fn write_csv(path: &Path, records: &[RunRecord]) -> Result<(), RexError> {
    let csv_error = |err: csv::Error| {
        RexError::Serde(
            ErrorInfo::new("report-csv", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    };
    let mut writer = csv::WriterBuilder::new()
        .from_path(path)
        .map_err(csv_error)?;
    writer
        .write_record([
            "run_id",
            "status",
            "seed",
            "workspace",
            "cause_code",
            "cause_message",
            "started_at",
            "ended_at",
        ])
        .map_err(csv_error)?;
    for record in records {
        writer
            .write_record([
                record.run_id.clone(),
                record.status.to_string(),
                record.seed.map(|s| s.to_string()).unwrap_or_default(),
                record.workspace.display().to_string(),
                record
                    .cause
                    .as_ref()
                    .map(|c| c.code.clone())
                    .unwrap_or_default(),
                record
                    .cause
                    .as_ref()
                    .map(|c| c.message.clone())
                    .unwrap_or_default(),
                record
                    .started_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
                record.ended_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            ])
            .map_err(csv_error)?;
    }
    writer.flush().map_err(|err| {
        RexError::Serde(
            ErrorInfo::new("report-csv", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })
}
