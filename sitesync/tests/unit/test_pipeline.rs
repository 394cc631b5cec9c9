//! End-to-end pipeline tests against the in-memory API

use std::sync::Arc;
use std::time::Duration;

use sitesync::app::options::{PreparationOptions, ReadinessOptions, SyncOptions};
use sitesync::errors::SyncError;
use sitesync::manifest::hasher::digest_bytes;
use sitesync::models::deploy::{DeployBody, DeployState};
use sitesync::sync::{DeployParams, DeploySource, DeploySync};
use tokio_test::{assert_err, assert_ok};

use crate::fake::{FakeApi, DEPLOY_ID};
use crate::write_tree;

fn fast_options() -> SyncOptions {
    SyncOptions {
        preparation: PreparationOptions {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
            retry_delay: Duration::from_millis(10),
        },
        readiness: ReadinessOptions {
            default_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn test_directory_deploy_uploads_only_required() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("index.html", "<html/>"), ("style.css", "body {}")]);

    let api = Arc::new(FakeApi::new(vec![digest_bytes(b"body {}")]));
    let engine = DeploySync::new(api.clone(), fast_options());

    let deploy = assert_ok!(engine.deploy_dir("site-1", dir.path()).await);

    assert_eq!(deploy.id, DEPLOY_ID);
    assert_eq!(api.uploads(), vec!["style.css"]);

    let submitted = api.submitted();
    assert_eq!(submitted.len(), 1);
    let (site_id, body, draft) = &submitted[0];
    assert_eq!(site_id, "site-1");
    assert!(!draft);
    match body {
        DeployBody::Files(files) => {
            assert!(!files.is_async);
            assert_eq!(files.files.len(), 2);
            assert_eq!(files.files["index.html"], digest_bytes(b"<html/>"));
        }
        other => panic!("unexpected body {other:?}"),
    }
}

#[tokio::test]
async fn test_large_manifest_is_prepared_before_uploading() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("a.txt", "a"), ("b.txt", "b"), ("c.txt", "c")]);

    let api = Arc::new(
        FakeApi::new(vec![digest_bytes(b"b")]).with_fetch_script(vec![
            Ok(sitesync::models::deploy::Deploy {
                id: DEPLOY_ID.to_string(),
                state: DeployState::Preparing,
                ..Default::default()
            }),
        ]).with_fetch_state(DeployState::Prepared),
    );
    let options = SyncOptions {
        sync_file_threshold: 2,
        ..fast_options()
    };
    let engine = DeploySync::new(api.clone(), options);

    let deploy = assert_ok!(engine.deploy_dir("site-1", dir.path()).await);
    assert_eq!(deploy.state, DeployState::Prepared);
    assert_eq!(api.uploads(), vec!["b.txt"]);

    let (_, body, _) = &api.submitted()[0];
    assert!(matches!(body, DeployBody::Files(files) if files.is_async));

    // Required digests only come back from the preparation poll
    let events = api.events();
    assert_eq!(events, vec!["submit", "fetch", "fetch", "upload:b.txt"]);
}

#[tokio::test]
async fn test_deploy_waits_for_ready() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("index.html", "hi")]);

    let api = Arc::new(FakeApi::new(vec![digest_bytes(b"hi")]).with_fetch_script(vec![Ok(
        sitesync::models::deploy::Deploy {
            id: DEPLOY_ID.to_string(),
            state: DeployState::Processing,
            ..Default::default()
        },
    )]));
    let engine = DeploySync::new(api.clone(), fast_options());
    let params = DeployParams {
        wait_for_ready: true,
        ..Default::default()
    };

    let deploy = assert_ok!(
        engine
            .deploy("site-1", DeploySource::Directory(dir.path().to_path_buf()), &params)
            .await
    );
    assert_eq!(deploy.state, DeployState::Ready);
    assert_eq!(api.fetches(), 2);
}

#[tokio::test]
async fn test_zip_draft_is_submitted_as_archive() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("site.zip");
    std::fs::write(&archive, b"PK\x03\x04fake").unwrap();

    let api = Arc::new(FakeApi::new(Vec::new()));
    let engine = DeploySync::new(api.clone(), fast_options());

    assert_ok!(engine.create_draft("site-1", &archive).await);

    let (_, body, draft) = &api.submitted()[0];
    assert!(draft);
    assert_eq!(body, &DeployBody::Archive(archive.clone()));
    assert!(api.uploads().is_empty());
}

#[tokio::test]
async fn test_upload_failure_returns_last_deploy() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("index.html", "hi")]);

    let api = Arc::new(FakeApi::new(vec![digest_bytes(b"hi")]).fail_always("index.html", 400));
    let engine = DeploySync::new(api.clone(), fast_options());

    let failure = assert_err!(engine.create("site-1", dir.path()).await);

    assert!(matches!(failure.error, SyncError::ApiError { status: 400, .. }));
    assert_eq!(failure.deploy.map(|d| d.id), Some(DEPLOY_ID.to_string()));
}

#[tokio::test]
async fn test_missing_site_is_rejected_before_submitting() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("index.html", "hi")]);

    let api = Arc::new(FakeApi::new(Vec::new()));
    let engine = DeploySync::new(api.clone(), fast_options());

    let failure = assert_err!(engine.deploy_dir("", dir.path()).await);

    assert!(matches!(failure.error, SyncError::ValidationError(_)));
    assert!(failure.deploy.is_none());
    assert!(api.submitted().is_empty());
}

#[tokio::test]
async fn test_deploy_lookup_and_restore() {
    let api = Arc::new(FakeApi::new(Vec::new()));
    let engine = DeploySync::new(api.clone(), fast_options());

    assert!(matches!(engine.get_deploy("").await, Err(SyncError::MissingDeployId)));
    assert!(matches!(engine.restore_deploy("").await, Err(SyncError::MissingDeployId)));

    let deploy = assert_ok!(engine.get_deploy(DEPLOY_ID).await);
    let restored = assert_ok!(engine.publish(&deploy).await);

    assert_eq!(restored.state, DeployState::Ready);
    assert_eq!(api.events(), vec!["fetch".to_string(), format!("restore:{DEPLOY_ID}")]);
}
