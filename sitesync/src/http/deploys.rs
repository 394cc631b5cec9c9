//! Deploy API client

use async_trait::async_trait;
use tracing::debug;

use crate::errors::SyncError;
use crate::http::client::HttpClient;
use crate::http::{DeployApi, FileBody};
use crate::models::deploy::{Deploy, DeployBody};

/// Content type of individual file uploads
pub const FILE_CONTENT_TYPE: &str = "application/octet-stream";

impl HttpClient {
    /// Create a deploy with a single request.
    ///
    /// Directory deploys send the JSON file manifest, archive deploys stream
    /// the zip file. Drafts carry `draft=true`.
    pub async fn create_deploy(
        &self,
        site_id: &str,
        body: DeployBody,
        draft: bool,
    ) -> Result<Deploy, SyncError> {
        let mut url = self.endpoint(["sites", site_id, "deploys"])?;
        if draft {
            url.query_pairs_mut().append_pair("draft", "true");
        }

        let content_type = body.content_type();
        match body {
            DeployBody::Files(files) => {
                debug!(
                    "Submitting manifest of {} files (async: {})",
                    files.files.len(),
                    files.is_async
                );
                self.post_json(url, &files).await
            }
            DeployBody::Archive(path) => {
                let file = FileBody::open(&path).await?;
                self.post_file(url, content_type, file).await
            }
        }
    }

    /// Get a deploy by ID
    pub async fn get_deploy(&self, deploy_id: &str) -> Result<Deploy, SyncError> {
        if deploy_id.is_empty() {
            return Err(SyncError::MissingDeployId);
        }
        let url = self.endpoint(["deploys", deploy_id])?;
        self.get(url).await
    }

    /// Upload one file of a deploy to `/deploys/{id}/files/{path}`
    pub async fn upload_deploy_file(
        &self,
        deploy_id: &str,
        path: &str,
        body: FileBody,
    ) -> Result<(), SyncError> {
        if deploy_id.is_empty() {
            return Err(SyncError::MissingDeployId);
        }
        let segments = ["deploys", deploy_id, "files"]
            .into_iter()
            .chain(path.split('/').filter(|s| !s.is_empty()));
        let url = self.endpoint(segments)?;
        self.put_file(url, FILE_CONTENT_TYPE, body).await
    }

    /// Restore an old deploy, making it the active deploy of its site
    pub async fn restore_deploy(&self, deploy_id: &str) -> Result<Deploy, SyncError> {
        if deploy_id.is_empty() {
            return Err(SyncError::MissingDeployId);
        }
        let url = self.endpoint(["deploys", deploy_id, "restore"])?;
        self.post_json(url, &serde_json::json!({})).await
    }
}

#[async_trait]
impl DeployApi for HttpClient {
    async fn submit(
        &self,
        site_id: &str,
        body: DeployBody,
        draft: bool,
    ) -> Result<Deploy, SyncError> {
        self.create_deploy(site_id, body, draft).await
    }

    async fn fetch(&self, deploy_id: &str) -> Result<Deploy, SyncError> {
        self.get_deploy(deploy_id).await
    }

    async fn upload(&self, deploy_id: &str, path: &str, body: FileBody) -> Result<(), SyncError> {
        self.upload_deploy_file(deploy_id, path, body).await
    }

    async fn restore(&self, deploy_id: &str) -> Result<Deploy, SyncError> {
        self.restore_deploy(deploy_id).await
    }
}
