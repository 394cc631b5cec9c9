//! Upload scheduler tests

use std::sync::Arc;
use std::time::Duration;

use sitesync::app::options::SyncOptions;
use sitesync::errors::SyncError;
use sitesync::manifest::builder::build_manifest;
use sitesync::manifest::hasher::digest_bytes;
use sitesync::models::deploy::Deploy;
use sitesync::sync::{UploadOutcome, UploadScheduler};
use sitesync::utils::BackoffOptions;

use crate::fake::{FakeApi, DEPLOY_ID};
use crate::write_tree;

fn deploy_requiring(required: Vec<String>) -> Deploy {
    Deploy {
        id: DEPLOY_ID.to_string(),
        required,
        ..Default::default()
    }
}

fn options(concurrency: usize) -> SyncOptions {
    SyncOptions {
        max_concurrent_uploads: concurrency,
        upload_retry: BackoffOptions {
            initial_interval: Duration::from_millis(5),
            max_interval: Duration::from_millis(20),
            multiplier: 2.0,
            max_elapsed: Duration::from_millis(200),
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn test_only_required_files_are_uploaded() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("index.html", "<html/>"), ("style.css", "body {}")]);
    let manifest = build_manifest(dir.path()).unwrap();

    let required = vec![digest_bytes(b"body {}")];
    let api = Arc::new(FakeApi::new(required.clone()));
    let scheduler = UploadScheduler::new(api.clone(), &options(10));

    let report = scheduler.run(&deploy_requiring(required), &manifest).await;

    assert!(report.is_success());
    assert_eq!(report.len(), 1);
    assert_eq!(report.outcome("style.css"), Some(&UploadOutcome::Succeeded));
    assert_eq!(report.outcome("index.html"), None);
    assert_eq!(api.uploads(), vec!["style.css"]);
    assert_eq!(api.upload_size("style.css"), Some(7));
}

#[tokio::test]
async fn test_every_path_sharing_a_digest_is_uploaded() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[("a/logo.png", "png"), ("b/logo.png", "png"), ("c.txt", "c")],
    );
    let manifest = build_manifest(dir.path()).unwrap();

    let required = vec![digest_bytes(b"png").to_uppercase()];
    let api = Arc::new(FakeApi::new(required.clone()));
    let report = UploadScheduler::new(api.clone(), &options(10))
        .run(&deploy_requiring(required), &manifest)
        .await;

    assert_eq!(report.succeeded(), 2);
    assert_eq!(api.uploads(), vec!["a/logo.png", "b/logo.png"]);
}

#[tokio::test]
async fn test_nothing_required_uploads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("index.html", "x")]);
    let manifest = build_manifest(dir.path()).unwrap();

    let api = Arc::new(FakeApi::new(Vec::new()));
    let report = UploadScheduler::new(api.clone(), &options(10))
        .run(&deploy_requiring(Vec::new()), &manifest)
        .await;

    assert!(report.is_empty());
    assert!(report.is_success());
    assert!(api.uploads().is_empty());
}

#[tokio::test]
async fn test_concurrency_never_exceeds_limit() {
    let dir = tempfile::tempdir().unwrap();
    let files: Vec<(String, String)> = (0..12)
        .map(|i| (format!("file-{i:02}.txt"), format!("content {i}")))
        .collect();
    let refs: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
    write_tree(dir.path(), &refs);
    let manifest = build_manifest(dir.path()).unwrap();

    let required: Vec<String> = files.iter().map(|(_, c)| digest_bytes(c.as_bytes())).collect();
    let api = FakeApi::new(required.clone()).with_upload_delay(Duration::from_millis(20));
    let api = Arc::new(api);
    let report = UploadScheduler::new(api.clone(), &options(3))
        .run(&deploy_requiring(required), &manifest)
        .await;

    assert!(report.is_success());
    assert_eq!(api.uploads().len(), 12);
    assert!(api.max_in_flight() <= 3, "max in flight was {}", api.max_in_flight());
}

#[tokio::test]
async fn test_permanent_failure_cancels_unstarted_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let names = ["a.txt", "b.txt", "c.txt", "d.txt", "e.txt"];
    let files: Vec<(&str, &str)> = names.iter().map(|n| (*n, *n)).collect();
    write_tree(dir.path(), &files);
    let manifest = build_manifest(dir.path()).unwrap();

    let mut api = FakeApi::new(names.iter().map(|n| digest_bytes(n.as_bytes())).collect());
    for name in names {
        api = api.fail_always(name, 422);
    }
    let api = Arc::new(api);
    let required = names.iter().map(|n| digest_bytes(n.as_bytes())).collect();

    let report = UploadScheduler::new(api.clone(), &options(1))
        .run(&deploy_requiring(required), &manifest)
        .await;

    // One upload runs and fails, every later one sees the recorded failure
    assert_eq!(report.failed(), 1);
    assert_eq!(report.cancelled(), 4);
    assert_eq!(api.events().len(), 1);
    assert!(matches!(
        report.failure(),
        Some(SyncError::ApiError { status: 422, .. })
    ));
    assert!(report.into_result().is_err());
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("flaky.txt", "flaky"), ("solid.txt", "solid")]);
    let manifest = build_manifest(dir.path()).unwrap();

    let required = vec![digest_bytes(b"flaky"), digest_bytes(b"solid")];
    let api = Arc::new(FakeApi::new(required.clone()).fail_times("flaky.txt", vec![503, 500]));
    let report = UploadScheduler::new(api.clone(), &options(2))
        .run(&deploy_requiring(required), &manifest)
        .await;

    assert!(report.is_success());
    assert_eq!(api.upload_attempts("flaky.txt"), 3);
    assert_eq!(api.upload_attempts("solid.txt"), 1);
}

#[tokio::test]
async fn test_retry_budget_exhaustion_is_permanent() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("down.txt", "down")]);
    let manifest = build_manifest(dir.path()).unwrap();

    let required = vec![digest_bytes(b"down")];
    let api = Arc::new(FakeApi::new(required.clone()).fail_always("down.txt", 502));
    let report = UploadScheduler::new(api.clone(), &options(1))
        .run(&deploy_requiring(required), &manifest)
        .await;

    assert!(matches!(report.outcome("down.txt"), Some(UploadOutcome::Failed(_))));
    assert!(matches!(
        report.failure(),
        Some(SyncError::ApiError { status: 502, .. })
    ));
    assert!(api.upload_attempts("down.txt") > 1);
}

#[tokio::test]
async fn test_missing_local_file_fails_only_that_file() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[("gone.txt", "gone"), ("kept.txt", "kept"), ("also.txt", "also")],
    );
    let manifest = build_manifest(dir.path()).unwrap();
    std::fs::remove_file(dir.path().join("gone.txt")).unwrap();

    let required = vec![
        digest_bytes(b"gone"),
        digest_bytes(b"kept"),
        digest_bytes(b"also"),
    ];
    let api = Arc::new(FakeApi::new(required.clone()));
    let report = UploadScheduler::new(api.clone(), &options(10))
        .run(&deploy_requiring(required), &manifest)
        .await;

    assert!(matches!(report.outcome("gone.txt"), Some(UploadOutcome::Failed(_))));
    assert_eq!(report.outcome("kept.txt"), Some(&UploadOutcome::Succeeded));
    assert_eq!(report.outcome("also.txt"), Some(&UploadOutcome::Succeeded));
    assert!(matches!(report.failure(), Some(SyncError::IoError(_))));
    assert_eq!(api.upload_attempts("gone.txt"), 0);
}

#[tokio::test]
async fn test_retrying_upload_stops_when_another_fails_permanently() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("bad.txt", "bad"), ("flaky.txt", "flaky")]);
    let manifest = build_manifest(dir.path()).unwrap();

    let required = vec![digest_bytes(b"bad"), digest_bytes(b"flaky")];
    let api = FakeApi::new(required.clone())
        .with_path_delay("bad.txt", Duration::from_millis(50))
        .fail_always("bad.txt", 400)
        .fail_always("flaky.txt", 503);
    let api = Arc::new(api);

    let report = UploadScheduler::new(api.clone(), &options(2))
        .run(&deploy_requiring(required), &manifest)
        .await;

    // flaky.txt is between retries when bad.txt is rejected
    assert!(matches!(report.outcome("bad.txt"), Some(UploadOutcome::Failed(_))));
    assert_eq!(report.outcome("flaky.txt"), Some(&UploadOutcome::Cancelled));
    assert!(api.upload_attempts("flaky.txt") >= 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.cancelled(), 1);
    assert!(matches!(
        report.failure(),
        Some(SyncError::ApiError { status: 400, .. })
    ));
}
