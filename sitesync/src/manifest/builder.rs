//! Manifest construction from a directory tree.
//!
//! Hidden entries (any path segment starting with `.`) and macOS archive junk
//! (`__MACOS`, `__MACOSX`) are skipped, with the exception of a top-level
//! `.well-known` directory which is always deployed.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Component, Path};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::errors::SyncError;
use crate::manifest::hasher::digest_file;
use crate::manifest::FileManifest;

/// Reserved directory exempt from the hidden-file rule
pub const WELL_KNOWN_DIR: &str = ".well-known";

/// Metadata directories dropped from every deploy
pub const JUNK_DIRS: &[&str] = &["__MACOS", "__MACOSX"];

/// Whether a root-relative, forward-slash path is excluded from deploys
pub fn is_excluded(relative: &str) -> bool {
    relative.split('/').enumerate().any(|(i, segment)| {
        if i == 0 && segment == WELL_KNOWN_DIR {
            return false;
        }
        segment.starts_with('.') || JUNK_DIRS.contains(&segment)
    })
}

/// Convert a path under `root` into a forward-slash relative path
pub fn relative_path(root: &Path, path: &Path) -> Result<String, SyncError> {
    let rel = path.strip_prefix(root).map_err(|_| {
        SyncError::ValidationError(format!("{} is outside {}", path.display(), root.display()))
    })?;

    let mut segments = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(segment) => {
                let segment = segment.to_str().ok_or_else(|| {
                    let message = format!("Path is not valid UTF-8: {}", path.display());
                    SyncError::ValidationError(message)
                })?;
                segments.push(segment);
            }
            Component::CurDir => {}
            _ => {
                return Err(SyncError::ValidationError(format!(
                    "Unexpected path component in {}",
                    path.display()
                )))
            }
        }
    }

    Ok(segments.join("/"))
}

/// Walk `root` and digest every deployable regular file
pub fn build_manifest(root: &Path) -> Result<FileManifest, SyncError> {
    let metadata = std::fs::metadata(root)?;
    if !metadata.is_dir() {
        return Err(SyncError::ValidationError(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut files = BTreeMap::new();

    // Excluded directories are pruned so they are never read
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || relative_path(root, entry.path())
                    .map(|rel| !is_excluded(&rel))
                    .unwrap_or(true)
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if is_denied_on_excluded(root, &err) => {
                debug!("Skipping unreadable excluded path: {}", err);
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let rel = relative_path(root, entry.path())?;
        let digest = digest_file(entry.path())?;
        debug!("Hashed {} -> {}", rel, digest);
        files.insert(rel, digest);
    }

    info!("Built manifest of {} files from {}", files.len(), root.display());
    Ok(FileManifest::from_entries(root, files))
}

fn is_denied_on_excluded(root: &Path, err: &walkdir::Error) -> bool {
    let denied = err
        .io_error()
        .map(|e| e.kind() == ErrorKind::PermissionDenied)
        .unwrap_or(false);

    denied
        && err
            .path()
            .and_then(|p| relative_path(root, p).ok())
            .map(|rel| is_excluded(&rel))
            .unwrap_or(false)
}
