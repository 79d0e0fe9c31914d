//! Feed Liveness Watchdog
//!
//! Tracks inbound traffic on the live feed. The server emits periodic
//! `heartbeat` frames; a link that stays silent past the configured
//! idle timeout is treated as a transport fault and handed to the
//! reconnect path.

use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Configuration for liveness monitoring.
#[derive(Debug, Clone, Copy)]
pub struct LivenessConfig {
    /// Maximum tolerated silence before the link is declared dead.
    pub idle_timeout: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Tracks the time of the most recent inbound frame.
///
/// Every frame counts: price updates keep a busy link alive on their
/// own, heartbeats cover the quiet stretches.
#[derive(Debug)]
pub struct LivenessTracker {
    last_frame: RwLock<Instant>,
}

impl Default for LivenessTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessTracker {
    /// Create a tracker, counting from now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_frame: RwLock::new(Instant::now()),
        }
    }

    /// Record an inbound frame.
    pub fn record_frame(&self) {
        *self.last_frame.write() = Instant::now();
    }

    /// Time since the last inbound frame.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_frame.read().elapsed()
    }

    /// Remaining silence budget under `config`, zero when exhausted.
    #[must_use]
    pub fn remaining(&self, config: &LivenessConfig) -> Duration {
        config.idle_timeout.saturating_sub(self.idle_for())
    }

    /// Whether the link has been silent past the timeout.
    #[must_use]
    pub fn is_stale(&self, config: &LivenessConfig) -> bool {
        self.idle_for() >= config.idle_timeout
    }

    /// Reset for a fresh connection.
    pub fn reset(&self) {
        self.record_frame();
    }
}
