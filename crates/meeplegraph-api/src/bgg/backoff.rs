//! Adaptive backoff and request throttling.

use std::time::Duration;

use tokio::time::Instant;

use super::config::{ClientConfig, secs};

/// Backoff state shared by every request of one controller.
///
/// `current` grows by `factor` on each HTTP 429 and decays toward
/// `initial` on each success. The spacing between live requests is
/// `current / qps`.
#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct BackoffState {
    /// Floor of `current`, in seconds.
    initial: f64,
    /// Growth multiplier on rate limiting.
    factor: f64,
    /// Decay multiplier on success.
    decay: f64,
    /// Live requests per backoff period; `0` disables spacing.
    qps: f64,
    /// Current backoff in seconds.
    current: f64,
    /// Instant of the last live request.
    last_request: Option<Instant>,
}

impl BackoffState {
    /// Creates a state at the configured floor.
    pub(crate) const fn new(config: &ClientConfig) -> Self {
        Self {
            initial: config.initial_backoff,
            factor: config.backoff_factor,
            decay: config.backoff_decay,
            qps: config.rate_limit_qps,
            current: config.initial_backoff,
            last_request: None,
        }
    }

    /// Current backoff.
    #[must_use]
    pub fn current(&self) -> Duration {
        secs(self.current)
    }

    /// Current backoff in seconds.
    #[must_use]
    pub const fn current_secs(&self) -> f64 {
        self.current
    }

    /// Instant of the last live request, if any.
    #[must_use]
    pub const fn last_request(&self) -> Option<Instant> {
        self.last_request
    }

    /// Minimum spacing between live requests.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        if self.qps > 0.0 {
            secs(self.current / self.qps)
        } else {
            Duration::ZERO
        }
    }

    /// Waits until the next live request is allowed, then records it.
    pub async fn throttle(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = Instant::now().duration_since(last);
            let min_interval = self.min_interval();
            if elapsed < min_interval {
                let wait = min_interval.saturating_sub(elapsed);
                tracing::debug!(wait_secs = wait.as_secs_f64(), "Throttling request");
                tokio::time::sleep(wait).await;
            }
        }
        self.last_request = Some(Instant::now());
    }

    /// Grows the backoff after HTTP 429 and returns how long to wait first.
    pub fn on_rate_limited(&mut self) -> Duration {
        let wait = self.current();
        self.current *= self.factor;
        wait
    }

    /// Decays the backoff after a successful response.
    ///
    /// Returns the previous and new values in seconds.
    pub fn on_success(&mut self) -> (f64, f64) {
        let previous = self.current;
        self.current = (self.current * self.decay).max(self.initial);
        (previous, self.current)
    }
}
