//! FIM-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Top-level error type for the FIM scenario harness.
///
/// Every variant is fatal at the point of detection; `is_retryable` only
/// marks variants the enclosing bounded retry loops (freshness poll, stop
/// escalation) are allowed to continue past.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("[FIM-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[FIM-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[FIM-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[FIM-2001] fixture IO failure at {path}: {source}")]
    FixtureIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[FIM-2002] fixture state violation: {details}")]
    FixtureState { details: String },

    #[error("[FIM-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[FIM-3001] daemon failed to start: {details} (check system logs)")]
    DaemonNotStarted { details: String },

    #[error("[FIM-3002] daemon not running but liveness is required: {details}")]
    DaemonNotRunning { details: String },

    #[error("[FIM-3003] daemon pid {pid} still alive after forced stop")]
    DaemonUnresponsive { pid: i32 },

    #[error("[FIM-3004] signal delivery to pid {pid} failed: {details}")]
    SignalDelivery { pid: i32, details: String },

    #[error("[FIM-4001] report parse failure at {path}: {details}")]
    ReportParse { path: PathBuf, details: String },

    #[error("[FIM-4002] report contract violation for {path}: {details}")]
    ContractViolation { path: PathBuf, details: String },

    #[error("[FIM-4101] no fresh report within {waited_secs}s deadline at {path}")]
    PollDeadline { path: PathBuf, waited_secs: u64 },

    #[error("[FIM-5001] scenario assertion failed in phase '{phase}':\n{report}")]
    AssertionFailed { phase: String, report: String },

    #[error("[FIM-5002] scenario interrupted by operator")]
    Interrupted,
}

impl HarnessError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "FIM-1001",
            Self::MissingConfig { .. } => "FIM-1002",
            Self::ConfigParse { .. } => "FIM-1003",
            Self::FixtureIo { .. } => "FIM-2001",
            Self::FixtureState { .. } => "FIM-2002",
            Self::Serialization { .. } => "FIM-2101",
            Self::DaemonNotStarted { .. } => "FIM-3001",
            Self::DaemonNotRunning { .. } => "FIM-3002",
            Self::DaemonUnresponsive { .. } => "FIM-3003",
            Self::SignalDelivery { .. } => "FIM-3004",
            Self::ReportParse { .. } => "FIM-4001",
            Self::ContractViolation { .. } => "FIM-4002",
            Self::PollDeadline { .. } => "FIM-4101",
            Self::AssertionFailed { .. } => "FIM-5001",
            Self::Interrupted => "FIM-5002",
        }
    }

    /// Whether the enclosing bounded retry loop may continue past this error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::FixtureIo { .. } | Self::SignalDelivery { .. })
    }

    /// Convenience constructor for fixture IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::FixtureIo {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for HarnessError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
