//! Update Throttling
//!
//! The live feed can deliver updates far faster than consumers want to
//! recompute valuations. [`CommitStrategy`] selects how price batches
//! reach the cache: committed immediately, or coalesced and flushed on
//! a fixed cadence.
//!
//! The strategy is injectable configuration, not environment detection:
//! deterministic tests select [`CommitStrategy::Immediate`] explicitly
//! so nothing depends on wall-clock timers.

use std::collections::HashMap;
use std::time::Duration;

use crate::domain::quote::Quote;

/// How price updates are committed to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStrategy {
    /// Commit every update synchronously on receipt.
    Immediate,
    /// Coalesce updates and commit one batch per interval.
    Batched(Duration),
}

impl Default for CommitStrategy {
    fn default() -> Self {
        Self::Batched(Duration::from_millis(100))
    }
}

impl CommitStrategy {
    /// The flush interval, when batching.
    #[must_use]
    pub const fn flush_interval(&self) -> Option<Duration> {
        match self {
            Self::Immediate => None,
            Self::Batched(interval) => Some(*interval),
        }
    }
}

/// Coalescing buffer for pending price updates.
///
/// Within one flush window, only the newest quote per symbol survives;
/// the cache's timestamp guard makes the final ordering independent of
/// flush boundaries anyway, this just keeps the commits small.
#[derive(Debug, Default)]
pub struct ThrottleBuffer {
    pending: HashMap<String, Quote>,
}

impl ThrottleBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb a batch of quotes, keeping the newest per symbol.
    pub fn absorb(&mut self, quotes: impl IntoIterator<Item = Quote>) {
        for quote in quotes {
            match self.pending.get(&quote.symbol) {
                Some(existing) if existing.timestamp > quote.timestamp => {}
                _ => {
                    self.pending.insert(quote.symbol.clone(), quote);
                }
            }
        }
    }

    /// Take everything buffered, leaving the buffer empty.
    #[must_use]
    pub fn drain(&mut self) -> Vec<Quote> {
        self.pending.drain().map(|(_, quote)| quote).collect()
    }

    /// Number of symbols awaiting commit.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
