//! Manifest builder tests

use sitesync::errors::SyncError;
use sitesync::manifest::builder::build_manifest;
use sitesync::manifest::hasher::digest_bytes;

use crate::write_tree;

#[test]
fn test_manifest_maps_relative_paths_to_digests() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[
            ("index.html", "<h1>hello</h1>"),
            ("css/site.css", "body {}"),
            ("assets/img/logo.svg", "<svg/>"),
        ],
    );

    let manifest = build_manifest(dir.path()).unwrap();

    assert_eq!(manifest.len(), 3);
    assert_eq!(manifest.get("index.html"), Some(digest_bytes(b"<h1>hello</h1>").as_str()));
    assert_eq!(manifest.get("css/site.css"), Some(digest_bytes(b"body {}").as_str()));
    assert!(manifest.get("assets/img/logo.svg").is_some());
    assert_eq!(manifest.local_path("css/site.css"), dir.path().join("css").join("site.css"));
}

#[test]
fn test_manifest_skips_hidden_and_junk_but_keeps_well_known() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[
            (".git/config", "[core]"),
            ("__MACOS/._index.html", "junk"),
            ("__MACOSX/._style.css", "junk"),
            (".env", "SECRET=1"),
            ("blog/.draft.md", "wip"),
            (".well-known/acme-challenge/token", "challenge"),
        ],
    );

    let manifest = build_manifest(dir.path()).unwrap();
    let paths: Vec<&str> = manifest.iter().map(|(path, _)| path).collect();

    assert_eq!(paths, vec![".well-known/acme-challenge/token"]);
}

#[test]
fn test_manifest_is_stable_for_unchanged_content() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[("index.html", "a"), ("b/c.txt", "c"), ("b/d/e.txt", "e")],
    );

    let first = build_manifest(dir.path()).unwrap();
    let second = build_manifest(dir.path()).unwrap();
    assert_eq!(first, second);

    write_tree(dir.path(), &[("b/c.txt", "changed")]);
    let third = build_manifest(dir.path()).unwrap();
    assert_ne!(first.get("b/c.txt"), third.get("b/c.txt"));
    assert_eq!(first.get("index.html"), third.get("index.html"));
}

#[test]
fn test_identical_content_shares_a_digest() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("a.txt", "same"), ("nested/b.txt", "same")]);

    let manifest = build_manifest(dir.path()).unwrap();
    let digest = digest_bytes(b"same");

    let index = manifest.digest_index();
    assert_eq!(index.len(), 1);
    assert_eq!(index[digest.as_str()], vec!["a.txt", "nested/b.txt"]);
}

#[test]
fn test_manifest_requires_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("file.txt", "x")]);

    let missing = build_manifest(&dir.path().join("missing")).unwrap_err();
    assert!(matches!(missing, SyncError::IoError(_)));

    let not_dir = build_manifest(&dir.path().join("file.txt")).unwrap_err();
    assert!(matches!(not_dir, SyncError::ValidationError(_)));
}

#[test]
fn test_manifest_body_shape() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("index.html", "hello"), ("style.css", "body")]);

    let manifest = build_manifest(dir.path()).unwrap();
    let body = serde_json::to_value(manifest.to_deploy_files(false)).unwrap();

    assert_eq!(
        body,
        serde_json::json!({
            "files": {
                "index.html": digest_bytes(b"hello"),
                "style.css": digest_bytes(b"body"),
            },
            "async": false
        })
    );
}
