//! Folio Stream Watcher Binary
//!
//! Headless runner for the streaming client: connects to the
//! configured feed, keeps the price cache warm, and logs a state line
//! on a fixed cadence. Useful for soak-testing a deployment without a
//! dashboard in front of it.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p folio-stream-client
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `FOLIO_API_URL`: Backend base URL
//! - `FOLIO_STREAM_URL`: Feed WebSocket URL
//! - `FOLIO_API_TOKEN`: Session token
//!
//! ## Optional
//! - `FOLIO_SYMBOLS`: Comma-separated symbols to watch
//! - `FOLIO_PORTFOLIO_IDS`: Comma-separated portfolio scopes
//! - `FOLIO_ENABLE_REAL_TIME`: Open the live feed (default: true)
//! - `FOLIO_AUTO_REFRESH`: Keep the polling schedule (default: true)
//! - `FOLIO_REFRESH_INTERVAL_SECS`: Polling cadence (default: 900)
//! - `FOLIO_THROTTLE_MS`: Commit cadence, 0 = immediate (default: 100)
//! - `FOLIO_COOLDOWN_SECS`: Manual-refresh cooldown (default: 60)
//! - `FOLIO_MAX_RECONNECT_ATTEMPTS`: Reconnect bound (default: 5)
//! - `FOLIO_RECONNECT_DELAY_MS`: Reconnect delay (default: 5000)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use folio_stream_client::{ClientSettings, HttpMarketDataApi, StreamClient};
use tokio::signal;

/// Cadence of the logged state line.
const REPORT_INTERVAL: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();
    folio_stream_client::init_telemetry();

    tracing::info!("Starting Folio stream watcher");

    let settings = ClientSettings::from_env()?;
    log_config(&settings);

    let api = Arc::new(HttpMarketDataApi::new(
        &settings.api,
        settings.credentials.clone(),
    )?);

    let client = StreamClient::activate(
        api,
        settings.stream,
        settings.credentials,
        settings.symbols,
        settings.portfolio_ids,
        settings.options,
    );

    let mut report = tokio::time::interval(REPORT_INTERVAL);
    report.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = report.tick() => {
                let state = client.state();
                tracing::info!(
                    connection = %state.connection_state,
                    symbols = state.prices.len(),
                    reconnect_attempts = state.reconnect_attempts,
                    last_update = ?state.last_update,
                    error = ?state.error,
                    "Watcher state"
                );
            }
            () = await_shutdown() => break,
        }
    }

    client.deactivate();
    tracing::info!("Stream watcher stopped");
    Ok(())
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(settings: &ClientSettings) {
    tracing::info!(
        api_url = %settings.api.base_url,
        stream_url = %settings.stream.url,
        symbols = settings.symbols.len(),
        real_time = settings.options.enable_real_time,
        auto_refresh = settings.options.auto_refresh,
        refresh_interval_secs = settings.options.refresh_interval.as_secs(),
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
