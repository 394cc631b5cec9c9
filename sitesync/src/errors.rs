//! Error types for the deploy sync engine

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for the deploy sync engine
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The remote side answered with a non-success status
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to walk {}: {message}", path.display())]
    WalkError { path: PathBuf, message: String },

    #[error("Cannot fetch deploy without an ID")]
    MissingDeployId,

    /// The deploy entered the `error` state while being prepared
    #[error("Preprocessing deploy failed: {0}")]
    PreparationFailed(String),

    #[error("Preprocessing deploy timed out after {0:?}")]
    PreparationTimeout(Duration),

    /// The deploy entered the `error` state after uploads completed
    #[error("Deploy processing failed: {0}")]
    RemoteProcessing(String),

    #[error("Timeout while waiting for processing ({0:?})")]
    ReadinessTimeout(Duration),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Whether retrying the same request could succeed.
    ///
    /// Transport failures, server errors, request timeouts and rate limiting
    /// are transient. Local I/O and client errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::HttpError(_) => true,
            SyncError::ApiError { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => false,
        }
    }

    /// Whether this error is one of the two local timeouts
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SyncError::PreparationTimeout(_) | SyncError::ReadinessTimeout(_)
        )
    }
}

impl From<walkdir::Error> for SyncError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
        SyncError::WalkError {
            path,
            message: err.to_string(),
        }
    }
}
