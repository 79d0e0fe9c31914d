//! Manual-Refresh Cooldown
//!
//! Bookkeeping for the user-triggered refresh path: non-forced refreshes
//! must be at least `cooldown` apart. The gate is pure wall-clock
//! arithmetic; callers pass `now` in, which keeps every decision
//! deterministic under test.
//!
//! The gate may be seeded from a previously recorded timestamp so that a
//! page reload does not reset an in-progress cooldown window.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Cooldown state for non-forced manual refreshes.
///
/// Forced refreshes bypass the gate entirely and must never call
/// [`RefreshGate::mark_refreshed`]; only a successful non-forced refresh
/// moves the window.
#[derive(Debug, Clone)]
pub struct RefreshGate {
    cooldown: Duration,
    last_refresh_at: Option<DateTime<Utc>>,
}

impl RefreshGate {
    /// Create a gate with no prior refresh on record.
    #[must_use]
    pub const fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_refresh_at: None,
        }
    }

    /// Create a gate seeded with a prior-session refresh timestamp.
    #[must_use]
    pub const fn seeded(cooldown: Duration, last_refresh_at: DateTime<Utc>) -> Self {
        Self {
            cooldown,
            last_refresh_at: Some(last_refresh_at),
        }
    }

    /// Time remaining in the current cooldown window, if any.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let last = self.last_refresh_at?;
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        let remaining = self.cooldown.checked_sub(elapsed)?;
        (remaining > Duration::ZERO).then_some(remaining)
    }

    /// Whether a non-forced refresh may proceed at `now`.
    #[must_use]
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.remaining(now).is_none()
    }

    /// Record a successful non-forced refresh.
    pub fn mark_refreshed(&mut self, now: DateTime<Utc>) {
        self.last_refresh_at = Some(now);
    }

    /// The recorded timestamp of the last non-forced refresh.
    ///
    /// Exposed so a persistence collaborator can carry the window across
    /// sessions.
    #[must_use]
    pub const fn last_refresh_at(&self) -> Option<DateTime<Utc>> {
        self.last_refresh_at
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(60);

    #[test]
    fn fresh_gate_is_open() {
        let gate = RefreshGate::new(COOLDOWN);
        assert!(gate.is_open(Utc::now()));
        assert!(gate.remaining(Utc::now()).is_none());
        assert!(gate.last_refresh_at().is_none());
    }

    #[test]
    fn closes_after_refresh() {
        let now = Utc::now();
        let mut gate = RefreshGate::new(COOLDOWN);
        gate.mark_refreshed(now);

        assert!(!gate.is_open(now + ChronoDuration::seconds(30)));
        let remaining = gate.remaining(now + ChronoDuration::seconds(30)).unwrap();
        assert_eq!(remaining, Duration::from_secs(30));
    }

    #[test]
    fn reopens_after_cooldown_elapses() {
        let now = Utc::now();
        let mut gate = RefreshGate::new(COOLDOWN);
        gate.mark_refreshed(now);

        assert!(gate.is_open(now + ChronoDuration::seconds(60)));
        assert!(gate.is_open(now + ChronoDuration::seconds(61)));
    }

    #[test]
    fn seeded_gate_honors_prior_window() {
        let last = Utc::now() - ChronoDuration::seconds(20);
        let gate = RefreshGate::seeded(COOLDOWN, last);

        // 40 seconds of the window remain after the reload.
        assert!(!gate.is_open(Utc::now()));
        let remaining = gate.remaining(Utc::now()).unwrap();
        assert!(remaining <= Duration::from_secs(40));
        assert!(remaining > Duration::from_secs(38));
    }

    #[test]
    fn seeded_gate_with_expired_window_is_open() {
        let last = Utc::now() - ChronoDuration::seconds(120);
        let gate = RefreshGate::seeded(COOLDOWN, last);
        assert!(gate.is_open(Utc::now()));
    }

    #[test]
    fn clock_skew_does_not_panic() {
        // A seed recorded "in the future" (client clock skew) just keeps
        // the gate closed for a full window.
        let last = Utc::now() + ChronoDuration::seconds(30);
        let gate = RefreshGate::seeded(COOLDOWN, last);
        assert!(!gate.is_open(Utc::now()));
    }
}
