//! Price Cache
//!
//! Mapping from symbol to the latest known [`Quote`]. Both ingest paths
//! (live feed and pull snapshot) write through [`PriceCache::upsert`],
//! which only ever advances an entry to a quote with an equal-or-later
//! source timestamp. A delayed pull-snapshot update therefore cannot
//! regress a symbol already advanced by a more recent live update, and
//! vice versa: last-writer-by-timestamp wins, regardless of arrival
//! order.
//!
//! Consumers never see the live map; [`PriceCache::snapshot`] hands out
//! an immutable copy for valuation and display.

use std::collections::HashMap;

use super::quote::{Quote, QuoteError};

// =============================================================================
// Outcomes
// =============================================================================

/// Result of applying one quote to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Symbol was not present; the quote was inserted.
    Inserted,
    /// Symbol was present with an equal-or-older timestamp; replaced.
    Replaced,
    /// Symbol was present with a newer timestamp; the quote was ignored.
    Stale,
}

/// Aggregate result of a batch commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Quotes inserted or replaced.
    pub applied: usize,
    /// Quotes ignored because a newer entry already existed.
    pub stale: usize,
    /// Quotes dropped by validation.
    pub rejected: usize,
}

impl MergeStats {
    /// Total quotes examined.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.applied + self.stale + self.rejected
    }
}

// =============================================================================
// Price Cache
// =============================================================================

/// Latest-quote store, one entry per symbol.
///
/// # Example
///
/// ```rust
/// use chrono::Utc;
/// use rust_decimal::Decimal;
/// use folio_stream_client::domain::cache::PriceCache;
/// use folio_stream_client::domain::quote::Quote;
///
/// let mut cache = PriceCache::new();
/// let quote = Quote::new("AAPL", Decimal::from(150), Utc::now()).unwrap();
/// cache.upsert(quote).unwrap();
/// assert!(cache.get("AAPL").is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PriceCache {
    entries: HashMap<String, Quote>,
}

impl PriceCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one quote.
    ///
    /// Replaces the entry for `quote.symbol` only if no entry exists or
    /// the existing entry's timestamp is not newer. Equal timestamps
    /// admit the newcomer, so a server-side refresh that reissues a
    /// quote with an identical stamp still lands.
    ///
    /// # Errors
    ///
    /// Returns the validation failure for a malformed quote; the cache
    /// is left untouched.
    pub fn upsert(&mut self, quote: Quote) -> Result<UpsertOutcome, QuoteError> {
        quote.validate()?;

        match self.entries.get(&quote.symbol) {
            None => {
                self.entries.insert(quote.symbol.clone(), quote);
                Ok(UpsertOutcome::Inserted)
            }
            Some(existing) if existing.timestamp <= quote.timestamp => {
                self.entries.insert(quote.symbol.clone(), quote);
                Ok(UpsertOutcome::Replaced)
            }
            Some(_) => Ok(UpsertOutcome::Stale),
        }
    }

    /// Apply a batch of quotes, tallying the outcomes.
    ///
    /// Validation failures are counted rather than short-circuiting:
    /// one malformed quote in a snapshot must not block the rest.
    pub fn merge(&mut self, quotes: impl IntoIterator<Item = Quote>) -> MergeStats {
        let mut stats = MergeStats::default();
        for quote in quotes {
            match self.upsert(quote) {
                Ok(UpsertOutcome::Inserted | UpsertOutcome::Replaced) => stats.applied += 1,
                Ok(UpsertOutcome::Stale) => stats.stale += 1,
                Err(err) => {
                    tracing::warn!(error = %err, "Dropping malformed quote");
                    stats.rejected += 1;
                }
            }
        }
        stats
    }

    /// Look up the latest quote for a symbol.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<&Quote> {
        self.entries.get(symbol)
    }

    /// Immutable copy of the full mapping.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Quote> {
        self.entries.clone()
    }

    /// Number of symbols with a known price.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no quotes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    use super::*;

    fn quote_at(symbol: &str, price: i64, offset_secs: i64) -> Quote {
        Quote::new(
            symbol,
            Decimal::from(price),
            Utc::now() + Duration::seconds(offset_secs),
        )
        .unwrap()
    }

    #[test]
    fn insert_then_get() {
        let mut cache = PriceCache::new();
        assert_eq!(
            cache.upsert(quote_at("AAPL", 150, 0)).unwrap(),
            UpsertOutcome::Inserted
        );
        assert_eq!(cache.get("AAPL").unwrap().price, Decimal::from(150));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn newer_quote_replaces() {
        let mut cache = PriceCache::new();
        cache.upsert(quote_at("AAPL", 150, 0)).unwrap();
        assert_eq!(
            cache.upsert(quote_at("AAPL", 151, 10)).unwrap(),
            UpsertOutcome::Replaced
        );
        assert_eq!(cache.get("AAPL").unwrap().price, Decimal::from(151));
    }

    #[test]
    fn stale_quote_ignored() {
        let mut cache = PriceCache::new();
        cache.upsert(quote_at("AAPL", 151, 10)).unwrap();
        assert_eq!(
            cache.upsert(quote_at("AAPL", 150, 0)).unwrap(),
            UpsertOutcome::Stale
        );
        assert_eq!(cache.get("AAPL").unwrap().price, Decimal::from(151));
    }

    #[test]
    fn equal_timestamp_admits_newcomer() {
        let now = Utc::now();
        let mut cache = PriceCache::new();
        cache
            .upsert(Quote::new("AAPL", Decimal::from(150), now).unwrap())
            .unwrap();
        let outcome = cache
            .upsert(Quote::new("AAPL", Decimal::from(152), now).unwrap())
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Replaced);
        assert_eq!(cache.get("AAPL").unwrap().price, Decimal::from(152));
    }

    #[test]
    fn malformed_quote_leaves_cache_untouched() {
        let mut cache = PriceCache::new();
        cache.upsert(quote_at("AAPL", 150, 0)).unwrap();

        let mut bad = quote_at("AAPL", 1, 100);
        bad.price = Decimal::from(-5);
        assert!(cache.upsert(bad).is_err());
        assert_eq!(cache.get("AAPL").unwrap().price, Decimal::from(150));
    }

    #[test]
    fn merge_tallies_outcomes() {
        let mut cache = PriceCache::new();
        cache.upsert(quote_at("AAPL", 150, 10)).unwrap();

        let mut bad = quote_at("TSLA", 1, 0);
        bad.symbol = String::new();

        let stats = cache.merge(vec![
            quote_at("AAPL", 149, 0),  // stale
            quote_at("MSFT", 410, 0),  // applied
            quote_at("AAPL", 151, 20), // applied
            bad,                       // rejected
        ]);

        assert_eq!(
            stats,
            MergeStats {
                applied: 2,
                stale: 1,
                rejected: 1,
            }
        );
        assert_eq!(stats.total(), 4);
        assert_eq!(cache.get("AAPL").unwrap().price, Decimal::from(151));
    }

    #[test]
    fn snapshot_is_detached() {
        let mut cache = PriceCache::new();
        cache.upsert(quote_at("AAPL", 150, 0)).unwrap();

        let snapshot = cache.snapshot();
        cache.upsert(quote_at("AAPL", 160, 10)).unwrap();

        // The earlier snapshot is unaffected by later commits.
        assert_eq!(snapshot["AAPL"].price, Decimal::from(150));
        assert_eq!(cache.get("AAPL").unwrap().price, Decimal::from(160));
    }

    proptest! {
        /// For any arrival order of quotes for one symbol, the cache
        /// converges on the quote with the maximum timestamp.
        #[test]
        fn final_value_is_max_timestamp(offsets in proptest::collection::vec(0_i64..10_000, 1..32)) {
            let base = Utc::now();
            let mut cache = PriceCache::new();
            for (i, offset) in offsets.iter().enumerate() {
                // Price encodes the arrival index so ties are observable.
                let quote = Quote::new(
                    "AAPL",
                    Decimal::from(1 + i64::try_from(i).unwrap()),
                    base + Duration::seconds(*offset),
                ).unwrap();
                cache.upsert(quote).unwrap();
            }

            let winner = cache.get("AAPL").unwrap();
            let max_offset = *offsets.iter().max().unwrap();
            // The winner is the last-arriving quote carrying the
            // maximum timestamp (equal stamps admit the newcomer).
            let expected_idx = offsets
                .iter()
                .enumerate()
                .filter(|&(_, &off)| off == max_offset)
                .map(|(i, _)| i)
                .next_back()
                .unwrap();
            prop_assert_eq!(
                winner.price,
                Decimal::from(1 + i64::try_from(expected_idx).unwrap())
            );
        }
    }
}
