//! Utility functions

use serde::{Deserialize, Serialize};
use std::time::Duration;

use tokio::time::Instant;

/// Version information for the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub name: String,
    pub version: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Default user agent sent with every API request
pub fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Options for exponential backoff
#[derive(Debug, Clone)]
pub struct BackoffOptions {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    /// Total time budget across all attempts
    pub max_elapsed: Duration,
}

impl Default for BackoffOptions {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(60),
            multiplier: 1.5,
            max_elapsed: Duration::from_secs(120), // 2 minutes
        }
    }
}

/// Calculate exponential backoff delay for the given attempt (0-based).
///
/// Values that are not a valid duration fall back to `max_interval`.
pub fn calc_exp_backoff(options: &BackoffOptions, attempt: u32) -> Duration {
    let exponent = attempt.min(i32::MAX as u32) as i32;
    let initial = options.initial_interval.as_secs_f64();
    let delay_secs = initial * options.multiplier.powi(exponent);
    let capped_delay = delay_secs.min(options.max_interval.as_secs_f64());
    Duration::try_from_secs_f64(capped_delay).unwrap_or(options.max_interval)
}

/// Stateful backoff bounded by a total elapsed budget.
///
/// `next_delay` returns `None` once sleeping for the next delay would take
/// the operation past `max_elapsed`.
#[derive(Debug)]
pub struct ExponentialBackoff {
    options: BackoffOptions,
    started_at: Instant,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(options: BackoffOptions) -> Self {
        Self {
            options,
            started_at: Instant::now(),
            attempt: 0,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Number of delays handed out so far
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = calc_exp_backoff(&self.options, self.attempt);
        if self.elapsed() + delay > self.options.max_elapsed {
            return None;
        }
        self.attempt += 1;
        Some(delay)
    }
}
