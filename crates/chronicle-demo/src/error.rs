//! Chronicle demo: error types.

use chronicle_core::config::ConfigError;
use chronicle_core::error::ErrorClass;
use chronicle_ledger::LedgerError;
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the demo binary.
#[derive(Debug, Error)]
pub enum AppError {
    /// A configuration variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A scenario step that was expected to succeed failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The report could not be written.
    #[error("report error: {0}")]
    Report(#[from] serde_json::Error),
}

/// JSON body describing a rejected step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

impl From<&LedgerError> for ErrorBody {
    fn from(err: &LedgerError) -> Self {
        let error = match err.class() {
            ErrorClass::NotFound => "aggregate_not_found",
            ErrorClass::Client => "validation_error",
            ErrorClass::Conflict => "conflict",
            ErrorClass::Server => "infrastructure_error",
        };
        Self {
            error,
            message: err.to_string(),
        }
    }
}
