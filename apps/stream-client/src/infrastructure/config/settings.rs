//! Client Configuration Settings
//!
//! Configuration types for the streaming client, loaded from
//! environment variables by the watcher binary; embedding dashboards
//! construct [`StreamOptions`] directly.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::infrastructure::feed::reconnect::ReconnectConfig;
use crate::infrastructure::feed::throttle::CommitStrategy;
use crate::infrastructure::feed::watchdog::LivenessConfig;

// =============================================================================
// Credentials
// =============================================================================

/// Session credentials for the backend and the live feed.
#[derive(Clone)]
pub struct Credentials {
    token: String,
}

impl Credentials {
    /// Create credentials from a session token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty.
    pub fn new(token: impl Into<String>) -> Result<Self, ConfigError> {
        let token = token.into();
        if token.is_empty() {
            return Err(ConfigError::EmptyValue("FOLIO_API_TOKEN".to_string()));
        }
        Ok(Self { token })
    }

    /// Get the session token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Stream Options
// =============================================================================

/// Per-activation behavior knobs, with the product defaults.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Whether to open the live feed at all. When off, only the
    /// polling path ever populates the cache.
    pub enable_real_time: bool,
    /// Whether the polling path keeps ticking after the activation
    /// fetch.
    pub auto_refresh: bool,
    /// Polling cadence.
    pub refresh_interval: Duration,
    /// How live updates reach the cache.
    pub commit_strategy: CommitStrategy,
    /// Minimum spacing of non-forced manual refreshes.
    pub cooldown: Duration,
    /// Prior-session refresh timestamp, carried across reloads so the
    /// cooldown window survives.
    pub last_refresh_at: Option<DateTime<Utc>>,
    /// Reconnection policy for the live feed.
    pub reconnect: ReconnectConfig,
    /// Handshake acknowledgment window.
    pub handshake_timeout: Duration,
    /// Liveness watchdog settings.
    pub liveness: LivenessConfig,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            enable_real_time: true,
            auto_refresh: true,
            refresh_interval: Duration::from_secs(900),
            commit_strategy: CommitStrategy::default(),
            cooldown: Duration::from_secs(60),
            last_refresh_at: None,
            reconnect: ReconnectConfig::default(),
            handshake_timeout: Duration::from_secs(10),
            liveness: LivenessConfig::default(),
        }
    }
}

// =============================================================================
// Endpoint Settings
// =============================================================================

/// Backend REST endpoint settings.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Base URL of the portfolio backend, e.g. `https://api.folio.app`.
    pub base_url: String,
}

/// Live feed endpoint settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// WebSocket URL of the price feed, e.g. `wss://api.folio.app/v1/stream`.
    pub url: String,
}

// =============================================================================
// Client Settings
// =============================================================================

/// Complete configuration for the watcher binary.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// REST endpoint.
    pub api: ApiSettings,
    /// Feed endpoint.
    pub stream: StreamSettings,
    /// Session credentials.
    pub credentials: Credentials,
    /// Symbols to watch.
    pub symbols: Vec<String>,
    /// Portfolio scopes.
    pub portfolio_ids: Vec<String>,
    /// Behavior knobs.
    pub options: StreamOptions,
}

impl ClientSettings {
    /// Create configuration from environment variables.
    ///
    /// Required: `FOLIO_API_URL`, `FOLIO_STREAM_URL`, `FOLIO_API_TOKEN`.
    ///
    /// Optional (with defaults): `FOLIO_SYMBOLS`, `FOLIO_PORTFOLIO_IDS`,
    /// `FOLIO_ENABLE_REAL_TIME`, `FOLIO_AUTO_REFRESH`,
    /// `FOLIO_REFRESH_INTERVAL_SECS`, `FOLIO_THROTTLE_MS` (0 commits
    /// immediately), `FOLIO_COOLDOWN_SECS`,
    /// `FOLIO_MAX_RECONNECT_ATTEMPTS`, `FOLIO_RECONNECT_DELAY_MS`,
    /// `FOLIO_HANDSHAKE_TIMEOUT_SECS`, `FOLIO_IDLE_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = require_env("FOLIO_API_URL")?;
        let stream_url = require_env("FOLIO_STREAM_URL")?;
        let token = require_env("FOLIO_API_TOKEN")?;

        let defaults = StreamOptions::default();
        let throttle = parse_env_duration_millis(
            "FOLIO_THROTTLE_MS",
            Duration::from_millis(100),
        );
        let commit_strategy = if throttle.is_zero() {
            CommitStrategy::Immediate
        } else {
            CommitStrategy::Batched(throttle)
        };

        let options = StreamOptions {
            enable_real_time: parse_env_bool("FOLIO_ENABLE_REAL_TIME", defaults.enable_real_time),
            auto_refresh: parse_env_bool("FOLIO_AUTO_REFRESH", defaults.auto_refresh),
            refresh_interval: parse_env_duration_secs(
                "FOLIO_REFRESH_INTERVAL_SECS",
                defaults.refresh_interval,
            ),
            commit_strategy,
            cooldown: parse_env_duration_secs("FOLIO_COOLDOWN_SECS", defaults.cooldown),
            last_refresh_at: None,
            reconnect: ReconnectConfig {
                delay: parse_env_duration_millis(
                    "FOLIO_RECONNECT_DELAY_MS",
                    defaults.reconnect.delay,
                ),
                max_attempts: parse_env_u32(
                    "FOLIO_MAX_RECONNECT_ATTEMPTS",
                    defaults.reconnect.max_attempts,
                ),
                jitter_factor: defaults.reconnect.jitter_factor,
            },
            handshake_timeout: parse_env_duration_secs(
                "FOLIO_HANDSHAKE_TIMEOUT_SECS",
                defaults.handshake_timeout,
            ),
            liveness: LivenessConfig {
                idle_timeout: parse_env_duration_secs(
                    "FOLIO_IDLE_TIMEOUT_SECS",
                    defaults.liveness.idle_timeout,
                ),
            },
        };

        Ok(Self {
            api: ApiSettings { base_url },
            stream: StreamSettings { url: stream_url },
            credentials: Credentials::new(token)?,
            symbols: parse_list(&std::env::var("FOLIO_SYMBOLS").unwrap_or_default()),
            portfolio_ids: parse_list(&std::env::var("FOLIO_PORTFOLIO_IDS").unwrap_or_default()),
            options,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    let value =
        std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_match_product_defaults() {
        let options = StreamOptions::default();
        assert!(options.enable_real_time);
        assert!(options.auto_refresh);
        assert_eq!(options.refresh_interval, Duration::from_secs(900));
        assert_eq!(options.cooldown, Duration::from_secs(60));
        assert_eq!(options.reconnect.delay, Duration::from_secs(5));
        assert_eq!(options.reconnect.max_attempts, 5);
        assert_eq!(
            options.commit_strategy,
            CommitStrategy::Batched(Duration::from_millis(100))
        );
        assert!(options.last_refresh_at.is_none());
    }

    #[test]
    fn credentials_redacted_debug() {
        let creds = Credentials::new("secret-token-123").unwrap();
        let debug = format!("{creds:?}");
        assert!(!debug.contains("secret-token-123"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn empty_token_rejected() {
        assert!(Credentials::new("").is_err());
    }

    #[test]
    fn list_parsing() {
        assert_eq!(parse_list("AAPL,MSFT"), vec!["AAPL", "MSFT"]);
        assert_eq!(parse_list(" AAPL , MSFT "), vec!["AAPL", "MSFT"]);
        assert_eq!(parse_list("AAPL,,MSFT,"), vec!["AAPL", "MSFT"]);
        assert!(parse_list("").is_empty());
    }
}
