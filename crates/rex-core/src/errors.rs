//! Structured error types shared across rex crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`RexError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (run ids, paths, commands, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

/// Canonical error type for the rex orchestration core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum RexError {
    /// Sweep specification errors (unknown keys, empty value lists).
    #[error("sweep error: {0}")]
    Sweep(ErrorInfo),
    /// Workspace allocation errors, including run id collisions.
    #[error("workspace error: {0}")]
    Workspace(ErrorInfo),
    /// Runner construction or invocation errors.
    #[error("runner error: {0}")]
    Runner(ErrorInfo),
    /// Cluster submission errors.
    #[error("submission error: {0}")]
    Submission(ErrorInfo),
    /// Strategy misuse (wrong number of runs for the selected mode).
    #[error("arity error: {0}")]
    Arity(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl RexError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            RexError::Sweep(info)
            | RexError::Workspace(info)
            | RexError::Runner(info)
            | RexError::Submission(info)
            | RexError::Arity(info)
            | RexError::Serde(info) => info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_accessor_reaches_payload() {
        let err = RexError::Workspace(
            ErrorInfo::new("workspace-collision", "run id already allocated")
                .with_context("run_id", "job_0001"),
        );
        assert_eq!(err.info().code, "workspace-collision");
        assert!(err.to_string().contains("run_id=job_0001"));
    }
}
