//! Port Interfaces
//!
//! Contracts for the backend collaborator, following the Hexagonal
//! Architecture pattern. The backend itself (portfolio CRUD, price
//! providers, session handling) is out of scope; the streaming core
//! only ever sees these narrow request/response shapes.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`MarketDataApi`]: pull-based snapshot, service status, and
//!   refresh-request endpoints.
//!
//! The live feed is an infrastructure adapter
//! (`infrastructure::feed`), not a port: its contract is the wire
//! protocol itself.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::quote::Quote;

// =============================================================================
// Error Type
// =============================================================================

/// Errors surfaced by the pull-path port.
///
/// All variants are recorded into the client's observable `error` field
/// rather than propagated across the activation boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// The request could not be sent or the transport failed mid-flight.
    #[error("request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Status {
        /// HTTP-style status code.
        status: u16,
        /// Backend-supplied message, when present.
        message: String,
    },

    /// The response body did not match the contract.
    #[error("invalid response payload: {0}")]
    Payload(String),
}

// =============================================================================
// Contract Types
// =============================================================================

/// A full price snapshot for a symbol set.
///
/// # Wire Format (JSON)
///
/// ```json
/// {
///   "prices": {
///     "AAPL": {"symbol": "AAPL", "price": "189.43", "timestamp": "...", "cached": true}
///   },
///   "fetchedAt": "2026-08-07T14:30:00Z"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSnapshot {
    /// Latest quote per symbol, as the backend knows them.
    pub prices: HashMap<String, Quote>,
    /// Server-side time of the snapshot.
    pub fetched_at: DateTime<Utc>,
}

/// Overall backend price-service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    /// All providers answering.
    Healthy,
    /// Some providers failing; data may be stale.
    Degraded,
    /// No provider available.
    Down,
}

/// Health of one upstream price provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    /// Provider name.
    pub name: String,
    /// Whether the provider is currently answering.
    pub healthy: bool,
    /// Optional diagnostic detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Server-side price-cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Number of cached symbols.
    pub entries: u64,
    /// Fraction of lookups served from cache.
    #[serde(default)]
    pub hit_rate: f64,
}

/// Service-health snapshot pulled alongside prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    /// Overall health.
    pub status: ServiceHealth,
    /// Per-provider breakdown.
    #[serde(default)]
    pub provider_statuses: Vec<ProviderStatus>,
    /// Backend cache statistics.
    #[serde(default)]
    pub cache_stats: CacheStats,
}

// =============================================================================
// Market Data Port
// =============================================================================

/// Pull-path contract against the backend price service.
///
/// Implemented over HTTP by `infrastructure::api::HttpMarketDataApi`;
/// tests substitute scripted fakes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataApi: Send + Sync {
    /// Fetch the latest quotes for `symbols`.
    async fn fetch_snapshot(&self, symbols: &[String]) -> Result<PriceSnapshot, ApiError>;

    /// Fetch the current service-health snapshot.
    async fn fetch_service_status(&self) -> Result<ServiceStatus, ApiError>;

    /// Ask the backend to refresh its provider caches for `symbols`.
    async fn request_refresh(&self, symbols: &[String], force: bool) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_wire_format() {
        let json = r#"{
            "prices": {
                "AAPL": {"symbol": "AAPL", "price": "189.43", "timestamp": "2026-08-07T14:30:00Z", "cached": true}
            },
            "fetchedAt": "2026-08-07T14:30:00Z"
        }"#;
        let snapshot: PriceSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.prices.len(), 1);
        assert!(snapshot.prices["AAPL"].cached);
    }

    #[test]
    fn service_status_defaults() {
        let json = r#"{"status": "degraded"}"#;
        let status: ServiceStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.status, ServiceHealth::Degraded);
        assert!(status.provider_statuses.is_empty());
        assert_eq!(status.cache_stats.entries, 0);
    }

    #[test]
    fn health_is_lowercase_on_the_wire() {
        assert_eq!(
            serde_json::to_string(&ServiceHealth::Down).unwrap(),
            "\"down\""
        );
    }
}
