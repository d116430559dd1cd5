//! Tunables for the request controller.

use std::time::Duration;

use anyhow::{Result, ensure};
use serde::Deserialize;

/// Retry, backoff and throttling settings.
///
/// Durations are expressed in seconds so the struct maps directly onto
/// the `[client]` section of the CLI config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
#[allow(clippy::module_name_repetitions)]
pub struct ClientConfig {
    /// Maximum attempts per logical request (default: 10).
    pub max_retries: u32,
    /// Backoff floor in seconds (default: 2.0).
    pub initial_backoff: f64,
    /// Multiplier applied after each HTTP 429 (default: 2.0).
    pub backoff_factor: f64,
    /// Multiplier applied after each success (default: 0.95).
    pub backoff_decay: f64,
    /// Live requests per backoff period (default: 5.0).
    pub rate_limit_qps: f64,
    /// Fixed wait before re-asking after HTTP 202, in seconds (default: 2.0).
    pub queued_retry_delay: f64,
    /// HTTP timeout in seconds (default: 30).
    pub timeout_secs: u64,
    /// Bearer token sent with every API request.
    pub api_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_backoff: 2.0,
            backoff_factor: 2.0,
            backoff_decay: 0.95,
            rate_limit_qps: 5.0,
            queued_retry_delay: 2.0,
            timeout_secs: 30,
            api_token: None,
        }
    }
}

impl ClientConfig {
    /// Checks that every value is usable by the controller.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first out-of-range field.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_retries >= 1, "max_retries must be at least 1");
        ensure!(
            self.initial_backoff.is_finite() && self.initial_backoff > 0.0,
            "initial_backoff must be a positive number of seconds"
        );
        ensure!(
            self.backoff_factor.is_finite() && self.backoff_factor >= 1.0,
            "backoff_factor must be >= 1.0"
        );
        ensure!(
            self.backoff_decay > 0.0 && self.backoff_decay <= 1.0,
            "backoff_decay must be in (0, 1]"
        );
        ensure!(
            self.rate_limit_qps.is_finite() && self.rate_limit_qps >= 0.0,
            "rate_limit_qps must be >= 0"
        );
        ensure!(
            self.queued_retry_delay.is_finite() && self.queued_retry_delay >= 0.0,
            "queued_retry_delay must be >= 0"
        );
        Ok(())
    }

    /// HTTP timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Converts seconds to a `Duration`, saturating on overflow.
pub(crate) fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}
