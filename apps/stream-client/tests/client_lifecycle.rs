//! Client Lifecycle Integration Tests
//!
//! Exercises the reconciliation of the live and pull paths through the
//! full client: last-writer-by-timestamp across sources, and the
//! polling schedule's tolerance of fetch failures.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use folio_stream_client::{
    ApiError, CacheStats, CommitStrategy, ConnectionState, Credentials, MarketDataApi,
    PriceSnapshot, Quote, RefreshOutcome, ServiceHealth, ServiceStatus, StreamClient,
    StreamOptions, StreamSettings,
};

// =============================================================================
// Test Fixtures
// =============================================================================

/// Serves one fixed AAPL quote, failing the first `fail_first` snapshot
/// fetches.
struct ScriptedApi {
    price: Decimal,
    timestamp: DateTime<Utc>,
    fail_first: usize,
    snapshot_calls: AtomicUsize,
}

impl ScriptedApi {
    fn new(price: i64, timestamp: DateTime<Utc>) -> Self {
        Self {
            price: Decimal::from(price),
            timestamp,
            fail_first: 0,
            snapshot_calls: AtomicUsize::new(0),
        }
    }

    fn failing_first(mut self, count: usize) -> Self {
        self.fail_first = count;
        self
    }
}

#[async_trait]
impl MarketDataApi for ScriptedApi {
    async fn fetch_snapshot(&self, _symbols: &[String]) -> Result<PriceSnapshot, ApiError> {
        let call = self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(ApiError::Request("backend unreachable".to_string()));
        }

        let quote = Quote::new("AAPL", self.price, self.timestamp)
            .unwrap()
            .mark_cached();
        Ok(PriceSnapshot {
            prices: HashMap::from([("AAPL".to_string(), quote)]),
            fetched_at: Utc::now(),
        })
    }

    async fn fetch_service_status(&self) -> Result<ServiceStatus, ApiError> {
        Ok(ServiceStatus {
            status: ServiceHealth::Healthy,
            provider_statuses: vec![],
            cache_stats: CacheStats::default(),
        })
    }

    async fn request_refresh(&self, _symbols: &[String], _force: bool) -> Result<(), ApiError> {
        Ok(())
    }
}

fn options_with_feed() -> StreamOptions {
    StreamOptions {
        auto_refresh: false,
        commit_strategy: CommitStrategy::Immediate,
        ..Default::default()
    }
}

fn activate(api: Arc<dyn MarketDataApi>, url: &str, options: StreamOptions) -> StreamClient {
    StreamClient::activate(
        api,
        StreamSettings {
            url: url.to_string(),
        },
        Credentials::new("test-token").unwrap(),
        vec!["AAPL".to_string()],
        vec![],
        options,
    )
}

/// One-connection feed server: handshake, then a single price update.
async fn spawn_feed(price: i64, timestamp: DateTime<Utc>) -> (tokio::task::JoinHandle<()>, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws: WebSocketStream<TcpStream> =
            tokio_tungstenite::accept_async(stream).await.unwrap();

        // auth
        let _ = ws.next().await;
        ws.send(Message::Text(
            json!({"type": "connection-ack"}).to_string().into(),
        ))
        .await
        .unwrap();
        // subscribe
        let _ = ws.next().await;

        ws.send(Message::Text(
            json!({
                "type": "price-update",
                "prices": [{
                    "symbol": "AAPL",
                    "price": price.to_string(),
                    "timestamp": timestamp,
                }]
            })
            .to_string()
            .into(),
        ))
        .await
        .unwrap();

        while ws.next().await.is_some() {}
    });

    (handle, url)
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn stale_snapshot_cannot_regress_newer_live_quote() {
    let base = Utc::now();

    // Live quote is 60 seconds ahead of anything the pull path serves.
    let (server, url) = spawn_feed(151, base + ChronoDuration::seconds(60)).await;
    let api = Arc::new(ScriptedApi::new(150, base));

    let client = activate(api, &url, options_with_feed());

    wait_until("live quote", || {
        client
            .state()
            .prices
            .get("AAPL")
            .is_some_and(|q| q.price == Decimal::from(151))
    })
    .await;

    // A forced refresh pulls the older snapshot; it must not win.
    let outcome = client.refresh(true).await;
    assert_eq!(outcome, RefreshOutcome::Completed { applied: 0 });

    let quote = client.state().prices["AAPL"].clone();
    assert_eq!(quote.price, Decimal::from(151));
    assert!(!quote.cached, "live quote survived the stale pull");

    client.deactivate();
    server.abort();
}

#[tokio::test]
async fn newer_snapshot_advances_over_older_live_quote() {
    let base = Utc::now();

    // The live path lags: its quote is a minute old.
    let (server, url) = spawn_feed(149, base - ChronoDuration::seconds(60)).await;
    let api = Arc::new(ScriptedApi::new(150, base));

    let client = activate(api, &url, options_with_feed());

    wait_until("some quote", || client.state().prices.contains_key("AAPL")).await;
    wait_until("connected state", || {
        client.state().connection_state == ConnectionState::Connected
    })
    .await;

    let outcome = client.refresh(true).await;
    assert!(matches!(outcome, RefreshOutcome::Completed { .. }));

    // Timestamp order decides, not arrival order.
    let quote = client.state().prices["AAPL"].clone();
    assert_eq!(quote.price, Decimal::from(150));
    assert!(quote.cached);

    client.deactivate();
    server.abort();
}

#[tokio::test]
async fn polling_failures_never_cancel_the_schedule() {
    let api = Arc::new(ScriptedApi::new(150, Utc::now()).failing_first(2));

    let options = StreamOptions {
        enable_real_time: false,
        auto_refresh: true,
        refresh_interval: Duration::from_millis(50),
        ..Default::default()
    };
    let client = activate(Arc::clone(&api) as Arc<dyn MarketDataApi>, "ws://unused", options);

    // The first fetches fail and are recorded...
    wait_until("recorded error", || client.state().error.is_some()).await;
    assert!(client.state().prices.is_empty());

    // ...but the next tick still fires and eventually succeeds.
    wait_until("price after recovery", || {
        client.state().prices.contains_key("AAPL")
    })
    .await;
    assert!(client.state().error.is_none());
    assert!(api.snapshot_calls.load(Ordering::SeqCst) >= 3);

    client.deactivate();
}
