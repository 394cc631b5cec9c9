//! Engine configuration options

use std::time::Duration;

use crate::utils::BackoffOptions;

/// Default number of simultaneous file uploads
pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 10;

/// Most simultaneous file uploads accepted from configuration
pub const MAX_CONCURRENT_UPLOADS: usize = 256;

/// Manifests with more files than this are submitted asynchronously
pub const MAX_FILES_FOR_SYNC_DEPLOY: usize = 7000;

/// Options consumed by the sync pipeline
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Upper bound on uploads in flight
    pub max_concurrent_uploads: usize,

    /// File count above which the server prepares the deploy in the background
    pub sync_file_threshold: usize,

    /// Preparation phase options
    pub preparation: PreparationOptions,

    /// Readiness phase options
    pub readiness: ReadinessOptions,

    /// Per-file upload retry
    pub upload_retry: BackoffOptions,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
            sync_file_threshold: MAX_FILES_FOR_SYNC_DEPLOY,
            preparation: PreparationOptions::default(),
            readiness: ReadinessOptions::default(),
            upload_retry: BackoffOptions::default(),
        }
    }
}

impl SyncOptions {
    /// Concurrency limit with the zero value mapped to the default and
    /// larger values clamped to `MAX_CONCURRENT_UPLOADS`
    pub fn upload_concurrency(&self) -> usize {
        if self.max_concurrent_uploads == 0 {
            DEFAULT_MAX_CONCURRENT_UPLOADS
        } else {
            self.max_concurrent_uploads.min(MAX_CONCURRENT_UPLOADS)
        }
    }
}

/// Options for polling an asynchronously submitted deploy
#[derive(Debug, Clone)]
pub struct PreparationOptions {
    /// Give up after this much wall-clock time
    pub timeout: Duration,

    /// Delay between successful polls
    pub poll_interval: Duration,

    /// Delay after a failed poll
    pub retry_delay: Duration,
}

impl Default for PreparationOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300), // 5 minutes
            poll_interval: Duration::from_secs(2),
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Options for waiting until a deploy is ready
#[derive(Debug, Clone)]
pub struct ReadinessOptions {
    /// Used when the caller passes a zero timeout
    pub default_timeout: Duration,

    pub poll_interval: Duration,
}

impl Default for ReadinessOptions {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(300), // 5 minutes
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl ReadinessOptions {
    /// Resolve a caller-provided timeout, zero meaning "use the default"
    pub fn effective_timeout(&self, requested: Duration) -> Duration {
        if requested.is_zero() {
            self.default_timeout
        } else {
            requested
        }
    }
}
