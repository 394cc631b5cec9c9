//! Bounded-concurrency upload of the files a deploy still requires.
//!
//! Every required path gets its own task. A semaphore caps how many run at
//! once, and a shared [`FirstFailure`] slot stops tasks that have not started
//! yet once any upload fails permanently. Tasks already uploading are left
//! to finish and are reported like every other file.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::app::options::SyncOptions;
use crate::errors::SyncError;
use crate::http::{DeployApi, FileBody};
use crate::manifest::hasher::normalize_digest;
use crate::manifest::FileManifest;
use crate::models::deploy::Deploy;
use crate::sync::failure::FirstFailure;
use crate::utils::{BackoffOptions, ExponentialBackoff};

/// Per-file upload state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Pending,
    InFlight,
    Succeeded,
    Failed(String),
    /// Skipped because another upload already failed
    Cancelled,
}

/// Outcome of every file scheduled in one batch
#[derive(Debug, Default)]
pub struct UploadReport {
    outcomes: BTreeMap<String, UploadOutcome>,
    failure: Option<SyncError>,
}

impl UploadReport {
    pub fn outcome(&self, path: &str) -> Option<&UploadOutcome> {
        self.outcomes.get(path)
    }

    pub fn outcomes(&self) -> impl Iterator<Item = (&str, &UploadOutcome)> {
        self.outcomes.iter().map(|(p, o)| (p.as_str(), o))
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn count(&self, matches: impl Fn(&UploadOutcome) -> bool) -> usize {
        self.outcomes.values().filter(|o| matches(o)).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| *o == UploadOutcome::Succeeded)
    }

    pub fn cancelled(&self) -> usize {
        self.count(|o| *o == UploadOutcome::Cancelled)
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, UploadOutcome::Failed(_)))
    }

    /// First permanent failure of the batch
    pub fn failure(&self) -> Option<&SyncError> {
        self.failure.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.succeeded() == self.outcomes.len()
    }

    /// Turn the report into the batch result
    pub fn into_result(mut self) -> Result<UploadReport, SyncError> {
        match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Relative paths whose digest is in the deploy's required set
pub fn required_paths(deploy: &Deploy, manifest: &FileManifest) -> Vec<String> {
    let required: HashSet<String> = deploy.required.iter().map(|d| normalize_digest(d)).collect();
    let index = manifest.digest_index();

    let mut paths = Vec::new();
    for digest in &required {
        match index.get(digest.as_str()) {
            Some(found) => paths.extend(found.iter().map(|p| p.to_string())),
            None => warn!("Deploy {} requires unknown digest {}", deploy.id, digest),
        }
    }
    paths.sort();
    paths
}

type Tracker = Arc<Mutex<BTreeMap<String, UploadOutcome>>>;

fn track(tracker: &Tracker, path: &str, outcome: UploadOutcome) {
    let mut outcomes = tracker.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    outcomes.insert(path.to_string(), outcome);
}

/// Uploads required files for one deploy
pub struct UploadScheduler {
    api: Arc<dyn DeployApi>,
    concurrency: usize,
    retry: BackoffOptions,
}

impl UploadScheduler {
    pub fn new(api: Arc<dyn DeployApi>, options: &SyncOptions) -> Self {
        Self {
            api,
            concurrency: options.upload_concurrency(),
            retry: options.upload_retry.clone(),
        }
    }

    /// Upload every required file and wait for all tasks to finish
    pub async fn run(&self, deploy: &Deploy, manifest: &FileManifest) -> UploadReport {
        let paths = required_paths(deploy, manifest);
        info!(
            "Uploading {} of {} files for deploy {} ({} at a time)",
            paths.len(),
            manifest.len(),
            deploy.id,
            self.concurrency
        );

        let tracker: Tracker = Arc::new(Mutex::new(
            paths
                .iter()
                .map(|p| (p.clone(), UploadOutcome::Pending))
                .collect(),
        ));
        let failure = Arc::new(FirstFailure::new());
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(paths.len());

        for path in paths {
            let job = UploadJob {
                api: Arc::clone(&self.api),
                deploy_id: deploy.id.clone(),
                local: manifest.local_path(&path),
                path: path.clone(),
                retry: self.retry.clone(),
                failure: Arc::clone(&failure),
                tracker: Arc::clone(&tracker),
            };
            let sem = Arc::clone(&semaphore);
            handles.push((
                path,
                tokio::spawn(async move {
                    let Ok(_permit) = sem.acquire().await else {
                        return UploadOutcome::Cancelled;
                    };
                    job.run().await
                }),
            ));
        }

        for (path, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Upload task for {} did not complete: {}", path, e);
                    let message = format!("upload of {} aborted: {}", path, e);
                    failure.record(SyncError::Internal(message));
                    UploadOutcome::Failed(e.to_string())
                }
            };
            track(&tracker, &path, outcome);
        }

        let outcomes = {
            let mut guard = tracker.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::take(&mut *guard)
        };
        let report = UploadReport {
            outcomes,
            failure: failure.take(),
        };

        info!(
            "Upload finished: {} succeeded, {} failed, {} cancelled",
            report.succeeded(),
            report.failed(),
            report.cancelled()
        );
        report
    }
}

struct UploadJob {
    api: Arc<dyn DeployApi>,
    deploy_id: String,
    path: String,
    local: PathBuf,
    retry: BackoffOptions,
    failure: Arc<FirstFailure<SyncError>>,
    tracker: Tracker,
}

impl UploadJob {
    async fn run(self) -> UploadOutcome {
        if self.failure.is_set() {
            debug!("Skipping {}, batch already failed", self.path);
            return UploadOutcome::Cancelled;
        }
        track(&self.tracker, &self.path, UploadOutcome::InFlight);

        let mut backoff = ExponentialBackoff::new(self.retry.clone());
        loop {
            let err = match self.attempt().await {
                Ok(()) => {
                    debug!("Uploaded {}", self.path);
                    return UploadOutcome::Succeeded;
                }
                Err(e) => e,
            };

            let delay = if err.is_transient() { backoff.next_delay() } else { None };
            match delay {
                Some(delay) => {
                    warn!(
                        "Error while uploading {} (attempt {}), retrying in {:?}: {}",
                        self.path,
                        backoff.attempts(),
                        delay,
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    error!("Upload of {} failed permanently: {}", self.path, err);
                    let message = err.to_string();
                    self.failure.record(err);
                    return UploadOutcome::Failed(message);
                }
            }

            if self.failure.is_set() {
                debug!("Abandoning retries of {}, batch already failed", self.path);
                return UploadOutcome::Cancelled;
            }
        }
    }

    async fn attempt(&self) -> Result<(), SyncError> {
        info!("Uploading file: {}", self.path);
        let body = FileBody::open(&self.local).await?;
        self.api.upload(&self.deploy_id, &self.path, body).await
    }
}
