//! Deploy negotiation
//!
//! One request tells the remote side what the deploy contains and gets back
//! the deploy record with the digests it still needs.

use std::path::Path;

use tracing::{debug, info};

use crate::errors::SyncError;
use crate::http::DeployApi;
use crate::manifest::FileManifest;
use crate::models::deploy::{Deploy, DeployBody};

/// Result of a successful negotiation
#[derive(Debug, Clone)]
pub struct Negotiation {
    pub deploy: Deploy,

    /// The server was asked to prepare the deploy in the background
    pub is_async: bool,
}

/// Whether a manifest of `file_count` files must be submitted asynchronously
pub fn requires_async(file_count: usize, threshold: usize) -> bool {
    file_count > threshold
}

/// Submit a file manifest
pub async fn negotiate_manifest(
    api: &dyn DeployApi,
    site_id: &str,
    manifest: &FileManifest,
    draft: bool,
    sync_file_threshold: usize,
) -> Result<Negotiation, SyncError> {
    validate_site_id(site_id)?;

    let is_async = requires_async(manifest.len(), sync_file_threshold);
    info!(
        "Creating {}deploy for site {} with {} files (async: {})",
        if draft { "draft " } else { "" },
        site_id,
        manifest.len(),
        is_async
    );

    let body = DeployBody::Files(manifest.to_deploy_files(is_async));
    let deploy = api.submit(site_id, body, draft).await?;
    check_deploy(&deploy)?;

    debug!(
        "Deploy {} created in state {}, {} digests required",
        deploy.id,
        deploy.state,
        deploy.required.len()
    );
    Ok(Negotiation { deploy, is_async })
}

/// Submit a zip archive as a single streamed upload
pub async fn negotiate_archive(
    api: &dyn DeployApi,
    site_id: &str,
    archive: &Path,
    draft: bool,
) -> Result<Negotiation, SyncError> {
    validate_site_id(site_id)?;

    let length = tokio::fs::metadata(archive).await?.len();
    info!(
        "Creating {}deploy for site {} from archive {} ({} bytes)",
        if draft { "draft " } else { "" },
        site_id,
        archive.display(),
        length
    );

    let body = DeployBody::Archive(archive.to_path_buf());
    let deploy = api.submit(site_id, body, draft).await?;
    check_deploy(&deploy)?;

    Ok(Negotiation {
        deploy,
        is_async: false,
    })
}

fn validate_site_id(site_id: &str) -> Result<(), SyncError> {
    if site_id.trim().is_empty() {
        return Err(SyncError::ValidationError(
            "You can only create a new deploy for an existing site".to_string(),
        ));
    }
    Ok(())
}

fn check_deploy(deploy: &Deploy) -> Result<(), SyncError> {
    if deploy.id.is_empty() {
        return Err(SyncError::MissingDeployId);
    }
    Ok(())
}
