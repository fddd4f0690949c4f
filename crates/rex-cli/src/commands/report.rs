use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use rex_core::ExecutionReport;
use rex_run::REPORT_FILE;

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Batch directory containing report.json.
    #[arg(long)]
    pub dir: PathBuf,
}

/// Reprints a stored batch report; exit code mirrors the overall status.
pub fn run(args: &ReportArgs) -> Result<i32, Box<dyn Error>> {
    let report = ExecutionReport::load(&args.dir.join(REPORT_FILE))?;
    print_summary(&report);
    Ok(if report.is_success() { 0 } else { 1 })
}

pub fn print_summary(report: &ExecutionReport) {
    for record in &report.runs {
        match &record.cause {
            Some(cause) => println!("{:<28} {:<10} {cause}", record.run_id, record.status),
            None => println!("{:<28} {}", record.run_id, record.status),
        }
    }
    println!("overall: {}", report.overall);
}
