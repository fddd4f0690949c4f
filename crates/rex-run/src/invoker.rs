//! In-process runner invocation: build the runner, call each requested
//! method in order, stop at the first failure.

use rex_core::{Configuration, ErrorInfo, RexError, RunStatus, RunnerFactory, WorkspacePaths};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Terminal outcome of one run's method sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Run the outcome belongs to.
    pub run_id: String,
    /// Either [`RunStatus::Succeeded`] or [`RunStatus::Failed`].
    pub status: RunStatus,
    /// Failure payload when the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<ErrorInfo>,
    /// Methods that were actually invoked, in order.
    pub invoked: Vec<String>,
}

impl Outcome {
    fn succeeded(run_id: &str, invoked: Vec<String>) -> Self {
        Self {
            run_id: run_id.to_string(),
            status: RunStatus::Succeeded,
            cause: None,
            invoked,
        }
    }

    fn failed(run_id: &str, cause: ErrorInfo, invoked: Vec<String>) -> Self {
        Self {
            run_id: run_id.to_string(),
            status: RunStatus::Failed,
            cause: Some(cause),
            invoked,
        }
    }
}

/// Builds the runner and drives the method sequence.
///
/// Methods run strictly in the given order; a failing method stops the run
/// immediately, so later stages never observe missing artifacts from
/// earlier ones. Construction failures produce a failed outcome rather than
/// aborting the batch.
pub fn invoke(
    factory: &dyn RunnerFactory,
    config: &Configuration,
    paths: &WorkspacePaths,
    methods: &[String],
) -> Outcome {
    let run_id = paths.run_id.clone();
    let mut runner = match factory.build(config, paths) {
        Ok(runner) => runner,
        Err(err) => {
            warn!(run_id, error = %err, "runner construction failed");
            return Outcome::failed(&run_id, err.info().clone(), Vec::new());
        }
    };

    let mut invoked = Vec::with_capacity(methods.len());
    for method in methods {
        info!(run_id, method = method.as_str(), "invoking runner method");
        invoked.push(method.clone());
        if let Err(cause) = runner.invoke(method) {
            warn!(run_id, method = method.as_str(), "runner method failed");
            let cause = cause.with_context("method", method.clone());
            return Outcome::failed(&run_id, cause, invoked);
        }
    }
    Outcome::succeeded(&run_id, invoked)
}

/// Convenience wrapper resolving the factory from a registry by name.
pub fn invoke_named(
    registry: &rex_core::RunnerRegistry,
    runner: &str,
    config: &Configuration,
    paths: &WorkspacePaths,
    methods: &[String],
) -> Result<Outcome, RexError> {
    let factory = registry.resolve(runner)?;
    Ok(invoke(factory, config, paths, methods))
}
