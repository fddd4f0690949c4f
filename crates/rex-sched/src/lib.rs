//! Cluster scheduler dialects and synchronous job submission for rex.

mod dialect;
mod submit;

pub use dialect::{dialect_for, JobRequest, JobResources, SchedulerDialect, Slurm, Univa};
pub use submit::{submit, SubmissionHandle};
