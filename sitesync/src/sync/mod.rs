//! Deploy synchronization pipeline
//!
//! Manifest, negotiation, optional preparation, uploads and readiness run one
//! after the other. Only the upload stage fans out.

pub mod failure;
pub mod negotiator;
pub mod pipeline;
pub mod preparation;
pub mod readiness;
pub mod uploader;

pub use failure::FirstFailure;
pub use pipeline::{DeployParams, DeploySource, DeploySync};
pub use uploader::{UploadOutcome, UploadReport, UploadScheduler};

use thiserror::Error;

use crate::errors::SyncError;
use crate::models::deploy::Deploy;

/// A failed sync: the error plus the last deploy seen, if one was created
#[derive(Error, Debug)]
#[error("{error}")]
pub struct FailedSync {
    #[source]
    pub error: SyncError,
    pub deploy: Option<Deploy>,
}

impl FailedSync {
    pub fn new(error: SyncError, deploy: Deploy) -> Self {
        Self {
            error,
            deploy: Some(deploy),
        }
    }
}

impl From<SyncError> for FailedSync {
    fn from(error: SyncError) -> Self {
        Self {
            error,
            deploy: None,
        }
    }
}
