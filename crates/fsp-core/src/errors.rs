//! Structured error types shared across FSP crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`FspError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (dataset, stage, command, file).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the operator resolve the issue.
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

    /// Adds a `path` context entry rendered with [`Path::display`].
    pub fn with_path(self, path: &Path) -> Self {
        self.with_context("path", path.display().to_string())
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum FspError {
    /// An external tool exited non-zero, was killed, or could not be spawned.
    #[error("execution error: {0}")]
    Execution(ErrorInfo),
    /// A required input never appeared within the readiness timeout.
    #[error("file not ready: {0}")]
    FileNotReady(ErrorInfo),
    /// A file expected on disk does not exist.
    #[error("file not found: {0}")]
    FileNotFound(ErrorInfo),
    /// Read or write failure on the filesystem.
    #[error("io error: {0}")]
    Io(ErrorInfo),
    /// Invalid or inconsistent configuration.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
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

impl FspError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            FspError::Execution(info)
            | FspError::FileNotReady(info)
            | FspError::FileNotFound(info)
            | FspError::Io(info)
            | FspError::Config(info)
            | FspError::Serde(info) => info,
        }
    }

    /// Returns a copy of the error with an extra context entry.
    pub fn with_context(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match self {
            FspError::Execution(info) => FspError::Execution(info.with_context(key, value)),
            FspError::FileNotReady(info) => FspError::FileNotReady(info.with_context(key, value)),
            FspError::FileNotFound(info) => FspError::FileNotFound(info.with_context(key, value)),
            FspError::Io(info) => FspError::Io(info.with_context(key, value)),
            FspError::Config(info) => FspError::Config(info.with_context(key, value)),
            FspError::Serde(info) => FspError::Serde(info.with_context(key, value)),
        }
    }

    /// Short family label used in logs and reports.
    pub fn family(&self) -> &'static str {
        match self {
            FspError::Execution(_) => "execution",
            FspError::FileNotReady(_) => "file-not-ready",
            FspError::FileNotFound(_) => "file-not-found",
            FspError::Io(_) => "io",
            FspError::Config(_) => "config",
            FspError::Serde(_) => "serde",
        }
    }

    /// Wraps a filesystem failure on `path` into [`FspError::Io`].
    pub fn io(code: &str, path: &Path, err: impl ToString) -> Self {
        FspError::Io(ErrorInfo::new(code, err.to_string()).with_path(path))
    }
}
