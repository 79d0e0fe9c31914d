//! Quote Type
//!
//! The canonical internal representation of one symbol's price at one
//! instant. Quotes are immutable snapshots: a newer quote for the same
//! symbol supersedes an older one, nothing is ever mutated in place.
//!
//! # Wire Format (JSON)
//!
//! ```json
//! {
//!   "symbol": "AAPL",
//!   "price": "189.43",
//!   "volume": 52344120,
//!   "timestamp": "2026-08-07T14:30:05.120Z",
//!   "cached": false
//! }
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors produced by quote validation.
///
/// A quote that fails validation is reported to the caller and dropped;
/// it never reaches the price cache.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuoteError {
    /// Quote arrived without a symbol.
    #[error("quote symbol cannot be empty")]
    EmptySymbol,

    /// Quote price is zero or negative.
    #[error("quote for {symbol} has non-positive price {price}")]
    NonPositivePrice {
        /// Symbol the bad quote was for.
        symbol: String,
        /// The rejected price.
        price: Decimal,
    },
}

/// A priced snapshot of one symbol at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Ticker symbol.
    pub symbol: String,

    /// Last known price.
    pub price: Decimal,

    /// Traded volume, when the source reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,

    /// Source timestamp of the observation (not arrival time).
    pub timestamp: DateTime<Utc>,

    /// Whether the backend served this quote from its own cache rather
    /// than a live provider read.
    #[serde(default)]
    pub cached: bool,
}

impl Quote {
    /// Create a validated quote.
    ///
    /// # Errors
    ///
    /// Returns a [`QuoteError`] if the symbol is empty or the price is
    /// not strictly positive.
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, QuoteError> {
        let quote = Self {
            symbol: symbol.into(),
            price,
            volume: None,
            timestamp,
            cached: false,
        };
        quote.validate()?;
        Ok(quote)
    }

    /// Attach a traded volume.
    #[must_use]
    pub const fn with_volume(mut self, volume: u64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Mark this quote as served from the backend cache.
    #[must_use]
    pub const fn mark_cached(mut self) -> Self {
        self.cached = true;
        self
    }

    /// Validate symbol and price.
    ///
    /// `Decimal` admits no non-finite values, so the only malformed
    /// numeric case is a non-positive price.
    ///
    /// # Errors
    ///
    /// Returns a [`QuoteError`] describing the first failed check.
    pub fn validate(&self) -> Result<(), QuoteError> {
        if self.symbol.trim().is_empty() {
            return Err(QuoteError::EmptySymbol);
        }
        if self.price <= Decimal::ZERO {
            return Err(QuoteError::NonPositivePrice {
                symbol: self.symbol.clone(),
                price: self.price,
            });
        }
        Ok(())
    }
}
