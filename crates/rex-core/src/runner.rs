//! The capability contract runners must satisfy, plus the name registry
//! used to resolve runners in re-invoked worker processes.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::Configuration;
use crate::errors::{ErrorInfo, RexError};

/// Filesystem identity handed to a runner at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspacePaths {
    /// Identifier of the run owning this workspace.
    pub run_id: String,
    /// Workspace root directory.
    pub root: PathBuf,
    /// Path of the durable configuration snapshot.
    pub config_snapshot: PathBuf,
    /// Directory reserved for runner checkpoints.
    pub checkpoint_dir: PathBuf,
    /// Directory reserved for log and data files.
    pub log_dir: PathBuf,
}

/// A caller-supplied experiment runner.
///
/// The orchestrator drives a runner purely by method name: each name in the
/// requested method list is passed to [`Runner::invoke`] in order, and the
/// first failure stops the run. Runners must signal failure through the
/// returned payload rather than completing partially in silence.
pub trait Runner {
    /// Invokes the named method. Unknown names are a failure of that method.
    fn invoke(&mut self, method: &str) -> Result<(), ErrorInfo>;
}

/// Builds a [`Runner`] from a resolved configuration and workspace paths.
pub trait RunnerFactory {
    /// Constructs the runner for one run.
    fn build(
        &self,
        config: &Configuration,
        paths: &WorkspacePaths,
    ) -> Result<Box<dyn Runner>, RexError>;
}

impl std::fmt::Debug for dyn RunnerFactory + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerFactory").finish()
    }
}

/// Name-indexed set of runner factories.
///
/// Worker processes and cluster job scripts carry only a runner *name*; the
/// re-invoked binary resolves it against the registry its author populated.
#[derive(Default)]
pub struct RunnerRegistry {
    factories: BTreeMap<String, Box<dyn RunnerFactory>>,
}

impl RunnerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, factory: Box<dyn RunnerFactory>) {
        self.factories.insert(name.into(), factory);
    }

    /// Resolves a factory by name.
    pub fn resolve(&self, name: &str) -> Result<&dyn RunnerFactory, RexError> {
        self.factories.get(name).map(Box::as_ref).ok_or_else(|| {
            RexError::Runner(
                ErrorInfo::new("runner-unknown", format!("no runner registered as '{name}'"))
                    .with_hint(format!(
                        "known runners: [{}]",
                        self.names().collect::<Vec<_>>().join(", ")
                    )),
            )
        })
    }

    /// Iterates over registered runner names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl Runner for Noop {
        fn invoke(&mut self, _method: &str) -> Result<(), ErrorInfo> {
            Ok(())
        }
    }

    struct NoopFactory;

    impl RunnerFactory for NoopFactory {
        fn build(
            &self,
            _config: &Configuration,
            _paths: &WorkspacePaths,
        ) -> Result<Box<dyn Runner>, RexError> {
            Ok(Box::new(Noop))
        }
    }

    #[test]
    fn registry_resolves_and_rejects() {
        let mut registry = RunnerRegistry::new();
        registry.register("noop", Box::new(NoopFactory));
        assert!(registry.resolve("noop").is_ok());
        let err = registry.resolve("missing").unwrap_err();
        assert_eq!(err.info().code, "runner-unknown");
    }
}
