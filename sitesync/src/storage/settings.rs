//! Settings file management

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::app::options::{
    PreparationOptions, ReadinessOptions, SyncOptions, DEFAULT_MAX_CONCURRENT_UPLOADS,
    MAX_CONCURRENT_UPLOADS, MAX_FILES_FOR_SYNC_DEPLOY,
};
use crate::errors::SyncError;
use crate::http::client::ClientOptions;
use crate::logs::LogLevel;
use crate::utils::{default_user_agent, BackoffOptions};

/// Sync settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,

    /// Deploy API configuration
    #[serde(default)]
    pub api: ApiSettings,

    /// Engine configuration
    #[serde(default)]
    pub sync: SyncSettings,
}

impl Settings {
    /// Read settings from a JSON file
    pub async fn load(path: &Path) -> Result<Self, SyncError> {
        let contents = tokio::fs::read_to_string(path).await?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    /// Engine options, rejecting values the engine cannot run with
    pub fn sync_options(&self) -> Result<SyncOptions, SyncError> {
        let sync = &self.sync;
        if !sync.backoff_multiplier.is_finite() || sync.backoff_multiplier < 1.0 {
            return Err(SyncError::ConfigError(format!(
                "backoff_multiplier must be a finite number of at least 1.0, got {}",
                sync.backoff_multiplier
            )));
        }
        if sync.max_concurrent_uploads > MAX_CONCURRENT_UPLOADS {
            return Err(SyncError::ConfigError(format!(
                "max_concurrent_uploads must be at most {}, got {}",
                MAX_CONCURRENT_UPLOADS, sync.max_concurrent_uploads
            )));
        }

        Ok(SyncOptions {
            max_concurrent_uploads: sync.max_concurrent_uploads,
            sync_file_threshold: sync.sync_file_threshold,
            preparation: PreparationOptions {
                timeout: Duration::from_secs(sync.preparation_timeout_secs),
                poll_interval: Duration::from_secs(sync.preparation_poll_interval_secs),
                retry_delay: Duration::from_secs(sync.preparation_retry_delay_secs),
            },
            readiness: ReadinessOptions {
                default_timeout: Duration::from_secs(sync.readiness_timeout_secs),
                poll_interval: Duration::from_secs(sync.readiness_poll_interval_secs),
            },
            upload_retry: BackoffOptions {
                initial_interval: Duration::from_millis(sync.backoff_initial_interval_ms),
                max_interval: Duration::from_secs(sync.backoff_max_interval_secs),
                multiplier: sync.backoff_multiplier,
                max_elapsed: Duration::from_secs(sync.upload_retry_budget_secs),
            },
        })
    }

    pub fn client_options(&self, access_token: SecretString) -> ClientOptions {
        ClientOptions {
            base_url: self.api.base_url.clone(),
            access_token,
            user_agent: self.api.user_agent.clone(),
            request_timeout: Duration::from_secs(self.api.request_timeout_secs),
            upload_timeout: match self.api.upload_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            ..Default::default()
        }
    }
}

/// Deploy API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL, without the `/api/v1` suffix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Total timeout of one file upload, 0 for none
    #[serde(default)]
    pub upload_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.netlify.com".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            upload_timeout_secs: 0,
        }
    }
}

/// Engine settings, durations in whole seconds unless noted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_max_concurrent_uploads")]
    pub max_concurrent_uploads: usize,

    #[serde(default = "default_sync_file_threshold")]
    pub sync_file_threshold: usize,

    #[serde(default = "default_five_minutes")]
    pub preparation_timeout_secs: u64,

    #[serde(default = "default_preparation_poll_interval")]
    pub preparation_poll_interval_secs: u64,

    #[serde(default = "default_preparation_retry_delay")]
    pub preparation_retry_delay_secs: u64,

    #[serde(default = "default_five_minutes")]
    pub readiness_timeout_secs: u64,

    #[serde(default = "default_readiness_poll_interval")]
    pub readiness_poll_interval_secs: u64,

    #[serde(default = "default_upload_retry_budget")]
    pub upload_retry_budget_secs: u64,

    #[serde(default = "default_backoff_initial_interval")]
    pub backoff_initial_interval_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_backoff_max_interval")]
    pub backoff_max_interval_secs: u64,
}

fn default_max_concurrent_uploads() -> usize {
    DEFAULT_MAX_CONCURRENT_UPLOADS
}

fn default_sync_file_threshold() -> usize {
    MAX_FILES_FOR_SYNC_DEPLOY
}

fn default_five_minutes() -> u64 {
    300
}

fn default_preparation_poll_interval() -> u64 {
    2
}

fn default_preparation_retry_delay() -> u64 {
    5
}

fn default_readiness_poll_interval() -> u64 {
    1
}

fn default_upload_retry_budget() -> u64 {
    120
}

fn default_backoff_initial_interval() -> u64 {
    500
}

fn default_backoff_multiplier() -> f64 {
    1.5
}

fn default_backoff_max_interval() -> u64 {
    60
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_concurrent_uploads: default_max_concurrent_uploads(),
            sync_file_threshold: default_sync_file_threshold(),
            preparation_timeout_secs: default_five_minutes(),
            preparation_poll_interval_secs: default_preparation_poll_interval(),
            preparation_retry_delay_secs: default_preparation_retry_delay(),
            readiness_timeout_secs: default_five_minutes(),
            readiness_poll_interval_secs: default_readiness_poll_interval(),
            upload_retry_budget_secs: default_upload_retry_budget(),
            backoff_initial_interval_ms: default_backoff_initial_interval(),
            backoff_multiplier: default_backoff_multiplier(),
            backoff_max_interval_secs: default_backoff_max_interval(),
        }
    }
}
