//! Content-addressed file manifests
//!
//! A manifest maps each root-relative, forward-slash path of a local file set
//! to the hex SHA1 of its content. It is built once per deploy and never
//! mutated afterwards.

pub mod builder;
pub mod hasher;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::models::deploy::DeployFiles;
use hasher::normalize_digest;

/// Mapping of relative file path to content digest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileManifest {
    root: PathBuf,
    files: BTreeMap<String, String>,
}

impl FileManifest {
    /// Build a manifest from already-computed entries.
    ///
    /// Digests are normalized to lowercase.
    pub fn from_entries<I, P, D>(root: impl Into<PathBuf>, entries: I) -> Self
    where
        I: IntoIterator<Item = (P, D)>,
        P: Into<String>,
        D: AsRef<str>,
    {
        let files = entries
            .into_iter()
            .map(|(path, digest)| (path.into(), normalize_digest(digest.as_ref())))
            .collect();
        Self {
            root: root.into(),
            files,
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, d)| (p.as_str(), d.as_str()))
    }

    /// Absolute location of a relative manifest path
    pub fn local_path(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }

    /// Digest to all paths sharing it
    pub fn digest_index(&self) -> HashMap<&str, Vec<&str>> {
        let mut index: HashMap<&str, Vec<&str>> = HashMap::new();
        for (path, digest) in &self.files {
            index.entry(digest.as_str()).or_default().push(path.as_str());
        }
        index
    }

    /// Request body for submitting this manifest
    pub fn to_deploy_files(&self, is_async: bool) -> DeployFiles {
        DeployFiles {
            files: self.files.clone(),
            is_async,
        }
    }
}
