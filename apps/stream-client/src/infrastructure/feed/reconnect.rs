//! Reconnection Policy
//!
//! Fixed-delay, bounded-attempt reconnection for the live feed. An
//! optional jitter fraction spreads retries when many dashboard
//! sessions drop at once; it is off by default.

use std::time::Duration;

use rand::Rng;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay between attempts.
    pub delay: Duration,
    /// Maximum number of attempts before giving up (0 = unlimited).
    pub max_attempts: u32,
    /// Jitter factor as a fraction (e.g., 0.1 = ±10% randomization).
    pub jitter_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: 5,
            jitter_factor: 0.0,
        }
    }
}

/// Reconnection policy tracking the attempt budget.
///
/// # Example
///
/// ```rust
/// use folio_stream_client::infrastructure::feed::reconnect::{ReconnectConfig, ReconnectPolicy};
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
/// assert!(policy.next_delay().is_some());
///
/// // Simulate a successful connection
/// policy.reset();
/// assert_eq!(policy.attempt_count(), 0);
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempt_count: 0,
        }
    }

    /// Consume one attempt and return the delay before it.
    ///
    /// Returns `None` once the attempt budget is exhausted: the caller
    /// must transition to the terminal failed state, not retry.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.config.max_attempts > 0 && self.attempt_count >= self.config.max_attempts {
            return None;
        }

        self.attempt_count += 1;
        Some(self.apply_jitter(self.config.delay))
    }

    /// Reset the attempt budget after a successful connection.
    ///
    /// This is the only thing that resets the counter; inbound traffic
    /// on a doomed connection does not.
    pub const fn reset(&mut self) {
        self.attempt_count = 0;
    }

    /// Attempts consumed since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempt_count < self.config.max_attempts
    }

    /// Apply jitter to a duration.
    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        let mut rng = rand::rng();
        let jitter: f64 = rng.random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted_u64 = adjusted_millis as u64;
        Duration::from_millis(adjusted_u64)
    }
}
