//! Remote deploy API

pub mod client;
pub mod deploys;

use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;

use crate::errors::SyncError;
use crate::models::deploy::{Deploy, DeployBody};

/// An open local file streamed as a request body
#[derive(Debug)]
pub struct FileBody {
    file: File,
    length: u64,
}

impl FileBody {
    /// Open `path` and record its length for `Content-Length`
    pub async fn open(path: &Path) -> Result<Self, SyncError> {
        let file = File::open(path).await?;
        let length = file.metadata().await?.len();
        Ok(Self { file, length })
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn into_parts(self) -> (File, u64) {
        (self.file, self.length)
    }
}

/// Transport seam used by the sync engine.
///
/// `HttpClient` implements it against the real API; tests substitute an
/// in-memory fake.
#[async_trait]
pub trait DeployApi: Send + Sync {
    /// Create a deploy for a site from a file manifest or a zip archive
    async fn submit(
        &self,
        site_id: &str,
        body: DeployBody,
        draft: bool,
    ) -> Result<Deploy, SyncError>;

    /// Fetch the current state of a deploy
    async fn fetch(&self, deploy_id: &str) -> Result<Deploy, SyncError>;

    /// Upload the content of one file of a deploy
    async fn upload(&self, deploy_id: &str, path: &str, body: FileBody) -> Result<(), SyncError>;

    /// Make a previous deploy the live one
    async fn restore(&self, deploy_id: &str) -> Result<Deploy, SyncError>;
}
