//! Feed Wire Messages
//!
//! Wire format types for the live price feed. Every server frame is a
//! JSON object tagged by `type`; every client directive is tagged by
//! `action`.
//!
//! # Server Frames
//!
//! - `connection-ack`: handshake accepted, frames will follow
//! - `price-update`: batch of symbol quotes
//! - `heartbeat`: keepalive, no payload semantics
//! - `error`: user-visible error; the transport decides any transition
//!
//! # Client Directives
//!
//! - `auth`: first directive on every connection
//! - `subscribe` / `unsubscribe`: incremental symbol-set changes
//!
//! # Error Codes
//!
//! - 4000: invalid directive
//! - 4001: not authenticated
//! - 4002: authentication failed (bad token)
//! - 4003: session expired
//! - 4004: authentication timeout
//! - 4100: symbol limit exceeded
//! - 5000: internal error

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::quote::Quote;

// =============================================================================
// Server Frames
// =============================================================================

/// One symbol's entry inside a `price-update` frame.
///
/// # Wire Format (JSON)
///
/// ```json
/// {"symbol": "AAPL", "price": "189.43", "volume": 52344120, "timestamp": "2026-08-07T14:30:05Z"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    /// Ticker symbol.
    pub symbol: String,
    /// Last trade price.
    pub price: Decimal,
    /// Traded volume, when the provider reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
    /// Source timestamp of the observation.
    pub timestamp: DateTime<Utc>,
}

impl PriceEntry {
    /// Convert into a domain [`Quote`]. Live-feed quotes are never
    /// backend-cache hits.
    #[must_use]
    pub fn into_quote(self) -> Quote {
        Quote {
            symbol: self.symbol,
            price: self.price,
            volume: self.volume,
            timestamp: self.timestamp,
            cached: false,
        }
    }
}

/// Error frame payload.
///
/// # Wire Format (JSON)
///
/// ```json
/// {"type": "error", "code": 4002, "msg": "authentication failed"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    /// Error code (see module docs).
    pub code: i32,
    /// Human-readable message.
    pub msg: String,
}

impl ErrorFrame {
    /// Whether this error means the handshake was rejected for
    /// authentication reasons. Auth rejections are terminal: the
    /// connection manager must not retry them.
    #[must_use]
    pub const fn is_auth_error(&self) -> bool {
        matches!(self.code, 4001..=4004)
    }
}

/// A frame received from the feed.
///
/// # Wire Format (JSON)
///
/// ```json
/// {"type": "connection-ack"}
/// {"type": "price-update", "prices": [{"symbol": "AAPL", "price": "189.43", "timestamp": "..."}]}
/// {"type": "heartbeat"}
/// {"type": "error", "code": 5000, "msg": "internal error"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FeedFrame {
    /// Handshake accepted.
    ConnectionAck,
    /// Batch of quotes.
    PriceUpdate {
        /// Quotes in the batch.
        prices: Vec<PriceEntry>,
    },
    /// Keepalive.
    Heartbeat,
    /// Server-reported error.
    Error(ErrorFrame),
}

// =============================================================================
// Client Directives
// =============================================================================

/// A directive sent to the feed.
///
/// # Wire Format (JSON)
///
/// ```json
/// {"action": "auth", "token": "..."}
/// {"action": "subscribe", "symbols": ["AAPL"], "portfolioIds": ["pf-1"]}
/// {"action": "unsubscribe", "symbols": ["TSLA"]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum FeedDirective {
    /// Authenticate the connection. Must be the first directive.
    Auth {
        /// Session token.
        token: String,
    },
    /// Subscribe to additional symbols.
    Subscribe {
        /// Symbols to add.
        symbols: Vec<String>,
        /// Portfolio scopes for server-side filtering.
        #[serde(
            rename = "portfolioIds",
            default,
            skip_serializing_if = "Vec::is_empty"
        )]
        portfolio_ids: Vec<String>,
    },
    /// Unsubscribe from symbols.
    Unsubscribe {
        /// Symbols to drop.
        symbols: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_connection_ack() {
        let frame: FeedFrame = serde_json::from_str(r#"{"type":"connection-ack"}"#).unwrap();
        assert_eq!(frame, FeedFrame::ConnectionAck);
    }

    #[test]
    fn decode_price_update() {
        let json = r#"{
            "type": "price-update",
            "prices": [
                {"symbol": "AAPL", "price": "189.43", "volume": 100, "timestamp": "2026-08-07T14:30:05Z"},
                {"symbol": "MSFT", "price": "410.10", "timestamp": "2026-08-07T14:30:05Z"}
            ]
        }"#;
        let frame: FeedFrame = serde_json::from_str(json).unwrap();
        let FeedFrame::PriceUpdate { prices } = frame else {
            panic!("expected price update");
        };
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].volume, Some(100));
        assert!(prices[1].volume.is_none());
    }

    #[test]
    fn decode_error_frame() {
        let frame: FeedFrame =
            serde_json::from_str(r#"{"type":"error","code":4002,"msg":"authentication failed"}"#)
                .unwrap();
        let FeedFrame::Error(err) = frame else {
            panic!("expected error frame");
        };
        assert!(err.is_auth_error());
        assert_eq!(err.msg, "authentication failed");
    }

    #[test]
    fn auth_code_range() {
        for code in 4001..=4004 {
            let err = ErrorFrame {
                code,
                msg: String::new(),
            };
            assert!(err.is_auth_error());
        }
        for code in [4000, 4100, 5000] {
            let err = ErrorFrame {
                code,
                msg: String::new(),
            };
            assert!(!err.is_auth_error());
        }
    }

    #[test]
    fn encode_subscribe_directive() {
        let directive = FeedDirective::Subscribe {
            symbols: vec!["AAPL".to_string()],
            portfolio_ids: vec!["pf-1".to_string()],
        };
        let json = serde_json::to_value(&directive).unwrap();
        assert_eq!(json["action"], "subscribe");
        assert_eq!(json["portfolioIds"][0], "pf-1");
    }

    #[test]
    fn encode_unsubscribe_skips_empty_scope() {
        let directive = FeedDirective::Subscribe {
            symbols: vec!["AAPL".to_string()],
            portfolio_ids: vec![],
        };
        let json = serde_json::to_string(&directive).unwrap();
        assert!(!json.contains("portfolioIds"));
    }

    #[test]
    fn price_entry_into_quote() {
        let entry = PriceEntry {
            symbol: "AAPL".to_string(),
            price: Decimal::from(150),
            volume: Some(10),
            timestamp: Utc::now(),
        };
        let quote = entry.into_quote();
        assert_eq!(quote.symbol, "AAPL");
        assert!(!quote.cached);
    }
}
