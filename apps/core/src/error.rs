use std::io;
use thiserror::Error;

/// Crate-wide error type, consolidating all possible errors into a single enum.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing policy corpus, or an invalid engine configuration.
    /// Fatal at load time: the affected domain is not served until corrected.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected request (empty conversation, unknown domain with no fallback).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A single analysis pass failed. Recovered by the orchestrator, which
    /// marks the corresponding section of the result as degraded.
    #[error("Stage '{stage}' failed: {reason}")]
    Stage { stage: String, reason: String },

    /// Represents standard input/output errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Represents errors from operations that did not complete in time.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Represents unexpected internal errors that indicate a bug.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short machine-readable code used in degraded markers and logs.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "configuration_error",
            AppError::Validation(_) => "input_validation_error",
            AppError::Stage { .. } => "stage_failure",
            AppError::Io(_) => "io_error",
            AppError::Timeout(_) => "timeout",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        match self {
            AppError::Config(s) => AppError::Config(s.clone()),
            AppError::Validation(s) => AppError::Validation(s.clone()),
            AppError::Stage { stage, reason } => AppError::Stage {
                stage: stage.clone(),
                reason: reason.clone(),
            },
            AppError::Io(e) => AppError::Io(io::Error::new(e.kind(), e.to_string())),
            AppError::Timeout(s) => AppError::Timeout(s.clone()),
            AppError::Internal(s) => AppError::Internal(s.clone()),
        }
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        AppError::Timeout(format!("Operation timed out: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("Validation errors: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::Config("x".into()).code(), "configuration_error");
        assert_eq!(AppError::Validation("x".into()).code(), "input_validation_error");
        assert_eq!(
            AppError::Stage {
                stage: "tone".into(),
                reason: "boom".into()
            }
            .code(),
            "stage_failure"
        );
    }

    #[test]
    fn test_clone_preserves_message() {
        let err = AppError::Io(io::Error::new(io::ErrorKind::NotFound, "missing.json"));
        let cloned = err.clone();
        assert!(cloned.to_string().contains("missing.json"));
    }
}
