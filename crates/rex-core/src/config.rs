//! Immutable experiment configuration snapshots.
//!
//! The configuration schema itself belongs to the caller; the orchestrator
//! treats a configuration as an opaque, validated mapping from parameter
//! name to value. Every mutation goes through a copy-on-write constructor so
//! a captured snapshot can never drift from what a run actually used.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ErrorInfo, RexError};

/// Well-known parameter names the orchestrator writes into a run's resolved
/// configuration before the runner is constructed.
pub mod keys {
    /// Seed assigned to the run by the sweep expansion.
    pub const SEED: &str = "seed";
    /// Absolute path of the run's checkpoint directory.
    pub const CHECKPOINT_DIR: &str = "checkpoint_dir";
    /// Absolute path of the run's log directory.
    pub const LOG_DIR: &str = "log_dir";
    /// Identifier of the run within its batch.
    pub const RUN_ID: &str = "run_id";
}

/// A single parameter override applied on top of a base configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Override {
    /// Parameter name to replace or introduce.
    pub key: String,
    /// Replacement value.
    pub value: Value,
}

impl Override {
    /// Convenience constructor.
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Immutable mapping from parameter name to value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Configuration {
    values: BTreeMap<String, Value>,
}

impl Configuration {
    /// Wraps an existing parameter mapping.
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    /// Parses a configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, RexError> {
        serde_yaml::from_str(text).map_err(|err| {
            RexError::Serde(ErrorInfo::new("config-parse", err.to_string()))
        })
    }

    /// Loads a configuration from a YAML file.
    pub fn load_yaml(path: &Path) -> Result<Self, RexError> {
        let text = fs::read_to_string(path).map_err(|err| {
            RexError::Serde(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&text)
    }

    /// Renders the configuration as YAML text.
    pub fn to_yaml_string(&self) -> Result<String, RexError> {
        serde_yaml::to_string(self).map_err(|err| {
            RexError::Serde(ErrorInfo::new("config-serialize", err.to_string()))
        })
    }

    /// Writes the configuration to a YAML file.
    pub fn write_yaml(&self, path: &Path) -> Result<(), RexError> {
        let text = self.to_yaml_string()?;
        fs::write(path, text).map_err(|err| {
            RexError::Serde(
                ErrorInfo::new("config-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Returns the value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the value under `key` as a string slice, if it is one.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Returns the value under `key` as an unsigned integer, if it is one.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    /// Whether the configuration defines `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Iterates over parameter names in sorted order.
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the configuration is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Seed assigned to this configuration, if the expansion set one.
    pub fn seed(&self) -> Option<u64> {
        self.get_u64(keys::SEED)
    }

    /// Returns a copy with a single parameter replaced or introduced.
    pub fn with_override(&self, entry: &Override) -> Self {
        let mut values = self.values.clone();
        values.insert(entry.key.clone(), entry.value.clone());
        Self { values }
    }

    /// Returns a copy with all overrides applied in order.
    pub fn with_overrides(&self, entries: &[Override]) -> Self {
        let mut values = self.values.clone();
        for entry in entries {
            values.insert(entry.key.clone(), entry.value.clone());
        }
        Self { values }
    }
}
