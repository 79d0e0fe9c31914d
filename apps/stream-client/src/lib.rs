#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Folio Stream Client - Real-Time Market Data Core
//!
//! The streaming core of the Folio portfolio dashboard: maintains a
//! live price feed over a long-lived WebSocket connection, reconciles
//! it with a periodic pull-based snapshot path, throttles noisy
//! updates, enforces manual-refresh rate limits, and derives portfolio
//! valuation from the resulting price cache.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure pricing and valuation logic
//!   - `quote` / `cache`: quote validation and the latest-quote map
//!   - `valuation`: portfolio totals over a cache snapshot
//!   - `refresh`: manual-refresh cooldown bookkeeping
//!   - `connection`: observable feed lifecycle state
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: pull-path contract against the backend
//!   - `services`: the [`StreamClient`] handle and its event loop
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `feed`: WebSocket connection manager, wire codec, throttling
//!   - `api`: HTTP adapter for snapshots, status, and refresh requests
//!   - `config`: environment-backed settings
//!   - `telemetry`: logging initialization
//!
//! # Data Flow
//!
//! ```text
//! Price Feed WS ──► Throttle ──┐
//!                              ├──► Price Cache ──► Valuation
//! Snapshot HTTP ───────────────┘         │
//!   (polling + manual refresh)           └──► StreamSnapshot
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Pure pricing and valuation logic.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::cache::{MergeStats, PriceCache, UpsertOutcome};
pub use domain::connection::ConnectionState;
pub use domain::quote::{Quote, QuoteError};
pub use domain::refresh::RefreshGate;
pub use domain::valuation::{Holding, HoldingValuation, Valuation, compute_valuation};

// Application surface
pub use application::ports::{
    ApiError, CacheStats, MarketDataApi, PriceSnapshot, ProviderStatus, ServiceHealth,
    ServiceStatus,
};
pub use application::services::{RefreshOutcome, StreamClient, StreamSnapshot};

// Infrastructure config
pub use infrastructure::config::{
    ApiSettings, ClientSettings, ConfigError, Credentials, StreamOptions, StreamSettings,
};

// Feed adapter (for integration tests)
pub use infrastructure::feed::{
    CommitStrategy, FeedConfig, FeedDirective, FeedFrame, LivenessConfig, ReconnectConfig,
};

// HTTP adapter
pub use infrastructure::api::HttpMarketDataApi;

// Telemetry
pub use infrastructure::telemetry::init as init_telemetry;
