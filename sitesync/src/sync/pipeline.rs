//! End-to-end deploy of a directory or zip archive

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::app::options::SyncOptions;
use crate::errors::SyncError;
use crate::http::DeployApi;
use crate::manifest::builder::build_manifest;
use crate::models::deploy::Deploy;
use crate::sync::negotiator::{negotiate_archive, negotiate_manifest, Negotiation};
use crate::sync::preparation::wait_for_preparation;
use crate::sync::readiness;
use crate::sync::uploader::UploadScheduler;
use crate::sync::FailedSync;

/// What to deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploySource {
    /// A directory, hashed and synced file by file
    Directory(PathBuf),

    /// A zip archive, uploaded as the deploy body
    Archive(PathBuf),
}

impl DeploySource {
    /// Paths ending in `.zip` are archives, everything else a directory
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let is_zip = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        if is_zip {
            DeploySource::Archive(path)
        } else {
            DeploySource::Directory(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            DeploySource::Directory(path) | DeploySource::Archive(path) => path,
        }
    }
}

/// Per-deploy parameters
#[derive(Debug, Clone, Default)]
pub struct DeployParams {
    pub draft: bool,

    /// Wait for the deploy to be ready after uploading
    pub wait_for_ready: bool,

    /// Readiness timeout, zero for the configured default
    pub ready_timeout: Duration,
}

/// Deploy synchronization engine
pub struct DeploySync {
    api: Arc<dyn DeployApi>,
    options: SyncOptions,
}

impl DeploySync {
    pub fn new(api: Arc<dyn DeployApi>, options: SyncOptions) -> Self {
        Self { api, options }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Run every stage for `source` and return the final deploy
    pub async fn deploy(
        &self,
        site_id: &str,
        source: DeploySource,
        params: &DeployParams,
    ) -> Result<Deploy, FailedSync> {
        let deploy = match &source {
            DeploySource::Directory(dir) => {
                self.sync_directory(site_id, dir, params.draft).await?
            }
            DeploySource::Archive(archive) => {
                negotiate_archive(self.api.as_ref(), site_id, archive, params.draft)
                    .await?
                    .deploy
            }
        };

        if !params.wait_for_ready {
            return Ok(deploy);
        }
        self.wait_for_ready(deploy, params.ready_timeout).await
    }

    pub async fn deploy_dir(
        &self,
        site_id: &str,
        dir: impl Into<PathBuf>,
    ) -> Result<Deploy, FailedSync> {
        let source = DeploySource::Directory(dir.into());
        self.deploy(site_id, source, &DeployParams::default()).await
    }

    pub async fn deploy_archive(
        &self,
        site_id: &str,
        archive: impl Into<PathBuf>,
    ) -> Result<Deploy, FailedSync> {
        let source = DeploySource::Archive(archive.into());
        self.deploy(site_id, source, &DeployParams::default()).await
    }

    /// Create a production deploy from a directory or `.zip`
    pub async fn create(
        &self,
        site_id: &str,
        path: impl Into<PathBuf>,
    ) -> Result<Deploy, FailedSync> {
        let source = DeploySource::from_path(path);
        self.deploy(site_id, source, &DeployParams::default()).await
    }

    /// Create a draft deploy from a directory or `.zip`
    pub async fn create_draft(
        &self,
        site_id: &str,
        path: impl Into<PathBuf>,
    ) -> Result<Deploy, FailedSync> {
        let params = DeployParams {
            draft: true,
            ..Default::default()
        };
        self.deploy(site_id, DeploySource::from_path(path), &params).await
    }

    pub async fn wait_for_ready(
        &self,
        deploy: Deploy,
        timeout: Duration,
    ) -> Result<Deploy, FailedSync> {
        let api = Arc::clone(&self.api);
        readiness::wait_for_ready(api, deploy, timeout, &self.options.readiness).await
    }

    pub async fn get_deploy(&self, deploy_id: &str) -> Result<Deploy, SyncError> {
        if deploy_id.is_empty() {
            return Err(SyncError::MissingDeployId);
        }
        self.api.fetch(deploy_id).await
    }

    /// Make an existing deploy the live one
    pub async fn restore_deploy(&self, deploy_id: &str) -> Result<Deploy, SyncError> {
        if deploy_id.is_empty() {
            return Err(SyncError::MissingDeployId);
        }
        info!("Restoring deploy {}", deploy_id);
        self.api.restore(deploy_id).await
    }

    /// Publish a draft deploy
    pub async fn publish(&self, deploy: &Deploy) -> Result<Deploy, SyncError> {
        self.restore_deploy(&deploy.id).await
    }

    async fn sync_directory(
        &self,
        site_id: &str,
        dir: &Path,
        draft: bool,
    ) -> Result<Deploy, FailedSync> {
        let root = dir.to_path_buf();
        let manifest = tokio::task::spawn_blocking(move || build_manifest(&root))
            .await
            .map_err(|e| SyncError::Internal(format!("manifest task failed: {}", e)))??;

        let Negotiation { mut deploy, is_async } = negotiate_manifest(
            self.api.as_ref(),
            site_id,
            &manifest,
            draft,
            self.options.sync_file_threshold,
        )
        .await?;

        if is_async {
            let prepared =
                wait_for_preparation(self.api.as_ref(), &mut deploy, &self.options.preparation)
                    .await;
            if let Err(e) = prepared {
                error!("Deploy {} was not prepared: {}", deploy.id, e);
                return Err(FailedSync::new(e, deploy));
            }
        }

        let report = UploadScheduler::new(Arc::clone(&self.api), &self.options)
            .run(&deploy, &manifest)
            .await;
        if let Err(e) = report.into_result() {
            return Err(FailedSync::new(e, deploy));
        }

        Ok(deploy)
    }
}
