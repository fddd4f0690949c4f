#![deny(missing_docs)]
#![doc = "Core types for the rex experiment orchestration harness: configurations, run records, runner capability traits and structured errors."]

pub mod config;
pub mod errors;
mod hash;
mod record;
mod runner;
mod serde;

pub use config::{keys, Configuration, Override};
pub use errors::{ErrorInfo, RexError};
pub use hash::stable_hash_string;
pub use record::{ExecutionReport, OverallStatus, RunRecord, RunStatus};
pub use runner::{Runner, RunnerFactory, RunnerRegistry, WorkspacePaths};
pub use serde::{from_json_slice, to_canonical_json_bytes};
