//! Streaming Client
//!
//! The owned handle a dashboard holds while its market-data view is
//! mounted. `activate` spawns the background tasks (feed connection and
//! event loop); `deactivate` cancels every timer, socket, and in-flight
//! fetch through one cancellation token. Callers never touch the live
//! cache: they read immutable snapshots and derived valuations.
//!
//! Between awaits, all cache mutation and state bookkeeping run to
//! completion on the event-loop task, so no two updates race on the
//! price cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ApiError, MarketDataApi, PriceSnapshot, ServiceStatus};
use crate::domain::cache::PriceCache;
use crate::domain::connection::ConnectionState;
use crate::domain::quote::Quote;
use crate::domain::refresh::RefreshGate;
use crate::domain::valuation::{Holding, Valuation, compute_valuation};
use crate::infrastructure::config::{Credentials, StreamOptions, StreamSettings};
use crate::infrastructure::feed::connection::{
    FeedCommand, FeedConfig, FeedConnection, FeedEvent,
};
use crate::infrastructure::feed::throttle::{CommitStrategy, ThrottleBuffer};

/// Capacity of the feed event channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Capacity of the feed command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 32;

// =============================================================================
// Observable State
// =============================================================================

/// Point-in-time view of the client, as exposed to consumers.
#[derive(Debug, Clone, Serialize)]
pub struct StreamSnapshot {
    /// Latest quote per symbol.
    pub prices: HashMap<String, Quote>,
    /// Live feed connection state.
    pub connection_state: ConnectionState,
    /// Current error, if any.
    pub error: Option<String>,
    /// When the cache last advanced.
    pub last_update: Option<DateTime<Utc>>,
    /// Reconnect attempts consumed since the last successful connect.
    pub reconnect_attempts: u32,
}

/// Outcome of a manual refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The fetch ran and the cache was updated.
    Completed {
        /// Quotes applied to the cache.
        applied: usize,
    },
    /// Rejected without I/O: the cooldown window is still open.
    CoolingDown {
        /// Time until a non-forced refresh will be accepted.
        retry_after: Duration,
    },
    /// The fetch failed; the error was recorded on the client.
    Failed {
        /// What went wrong.
        error: String,
    },
    /// The client was deactivated while the refresh was in flight.
    Cancelled,
}

/// Connection bookkeeping behind the snapshot.
#[derive(Debug, Default)]
struct FeedStatus {
    state: ConnectionState,
    error: Option<String>,
    reconnect_attempts: u32,
    last_update: Option<DateTime<Utc>>,
}

/// State shared between the handle and its background tasks.
struct SharedState {
    cache: RwLock<PriceCache>,
    status: RwLock<FeedStatus>,
    service: RwLock<Option<ServiceStatus>>,
    symbols: RwLock<Vec<String>>,
    gate: Mutex<RefreshGate>,
}

// =============================================================================
// Stream Client
// =============================================================================

/// Handle to an activated streaming client.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use folio_stream_client::application::services::StreamClient;
/// use folio_stream_client::infrastructure::api::HttpMarketDataApi;
/// use folio_stream_client::infrastructure::config::{
///     ApiSettings, Credentials, StreamOptions, StreamSettings,
/// };
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let credentials = Credentials::new("token")?;
/// let api = Arc::new(HttpMarketDataApi::new(
///     &ApiSettings { base_url: "https://api.folio.app".into() },
///     credentials.clone(),
/// )?);
///
/// let client = StreamClient::activate(
///     api,
///     StreamSettings { url: "wss://api.folio.app/v1/stream".into() },
///     credentials,
///     vec!["AAPL".into()],
///     vec![],
///     StreamOptions::default(),
/// );
///
/// // ... later
/// client.deactivate();
/// # Ok(())
/// # }
/// ```
pub struct StreamClient {
    api: Arc<dyn MarketDataApi>,
    shared: Arc<SharedState>,
    cancel: CancellationToken,
    feed_commands: Option<mpsc::Sender<FeedCommand>>,
}

impl StreamClient {
    /// Activate the client: spawn the event loop and, unless real-time
    /// is disabled, the live feed connection.
    ///
    /// The activation snapshot fetch runs immediately; the polling
    /// schedule starts one interval later.
    #[must_use]
    pub fn activate(
        api: Arc<dyn MarketDataApi>,
        stream: StreamSettings,
        credentials: Credentials,
        symbols: Vec<String>,
        portfolio_ids: Vec<String>,
        options: StreamOptions,
    ) -> Self {
        let gate = options.last_refresh_at.map_or_else(
            || RefreshGate::new(options.cooldown),
            |last| RefreshGate::seeded(options.cooldown, last),
        );

        let shared = Arc::new(SharedState {
            cache: RwLock::new(PriceCache::new()),
            status: RwLock::new(FeedStatus::default()),
            service: RwLock::new(None),
            symbols: RwLock::new(symbols.clone()),
            gate: Mutex::new(gate),
        });

        let cancel = CancellationToken::new();

        let (feed_rx, feed_commands) = if options.enable_real_time {
            let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
            let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

            let config = FeedConfig {
                url: stream.url,
                credentials,
                portfolio_ids,
                reconnect: options.reconnect.clone(),
                handshake_timeout: options.handshake_timeout,
                liveness: options.liveness,
            };
            let connection =
                Arc::new(FeedConnection::new(config, symbols, event_tx, cancel.clone()));
            tokio::spawn(connection.run(command_rx));

            (Some(event_rx), Some(command_tx))
        } else {
            tracing::info!("Real-time feed disabled; polling only");
            (None, None)
        };

        let event_loop = EventLoop {
            api: Arc::clone(&api),
            shared: Arc::clone(&shared),
            options,
            cancel: cancel.clone(),
        };
        tokio::spawn(event_loop.run(feed_rx));

        Self {
            api,
            shared,
            cancel,
            feed_commands,
        }
    }

    /// Deactivate the client.
    ///
    /// Aborts the feed connection, clears every pending timer, and
    /// discards any in-flight fetch's eventual result.
    pub fn deactivate(&self) {
        tracing::info!("Deactivating stream client");
        self.cancel.cancel();
        self.shared.status.write().state = ConnectionState::Disconnected;
    }

    /// Point-in-time view of prices and connection state.
    #[must_use]
    pub fn state(&self) -> StreamSnapshot {
        let prices = self.shared.cache.read().snapshot();
        let status = self.shared.status.read();
        StreamSnapshot {
            prices,
            connection_state: status.state,
            error: status.error.clone(),
            last_update: status.last_update,
            reconnect_attempts: status.reconnect_attempts,
        }
    }

    /// Latest pulled service-health snapshot, if any.
    #[must_use]
    pub fn service_status(&self) -> Option<ServiceStatus> {
        self.shared.service.read().clone()
    }

    /// Timestamp of the last non-forced refresh, for persistence
    /// collaborators carrying the cooldown across sessions.
    #[must_use]
    pub fn last_refresh_at(&self) -> Option<DateTime<Utc>> {
        self.shared.gate.lock().last_refresh_at()
    }

    /// Compute a valuation over the current cache snapshot.
    ///
    /// Pure and synchronous; concurrent cache commits cannot tear it.
    #[must_use]
    pub fn compute_valuation(&self, holdings: &[Holding]) -> Valuation {
        let snapshot = self.shared.cache.read().snapshot();
        compute_valuation(&snapshot, holdings)
    }

    /// Replace the symbol set of interest.
    ///
    /// While connected, the feed receives incremental subscribe and
    /// unsubscribe directives for the delta; the polling path uses the
    /// new set on its next fetch.
    pub fn update_symbols(&self, symbols: Vec<String>) {
        *self.shared.symbols.write() = symbols.clone();
        if let Some(commands) = &self.feed_commands {
            if let Err(err) = commands.try_send(FeedCommand::UpdateSymbols(symbols)) {
                tracing::warn!(error = %err, "Dropping symbol update command");
            }
        }
    }

    /// Manually restart the feed out of the terminal failed state.
    ///
    /// A no-op while connected or when real-time is disabled.
    pub fn reconnect(&self) {
        match &self.feed_commands {
            Some(commands) => {
                if let Err(err) = commands.try_send(FeedCommand::Reconnect) {
                    tracing::warn!(error = %err, "Dropping reconnect command");
                }
            }
            None => tracing::debug!("Reconnect requested but real-time is disabled"),
        }
    }

    /// Manually refresh prices and service status.
    ///
    /// Non-forced calls inside the cooldown window are rejected
    /// synchronously, without any network I/O. Forced calls always
    /// fetch but never move the cooldown window, so they cannot be
    /// used to bypass throttling for other callers. Failures never
    /// move the window either.
    pub async fn refresh(&self, force: bool) -> RefreshOutcome {
        if self.cancel.is_cancelled() {
            return RefreshOutcome::Cancelled;
        }

        if !force {
            let gate = self.shared.gate.lock();
            if let Some(retry_after) = gate.remaining(Utc::now()) {
                tracing::debug!(
                    retry_after_secs = retry_after.as_secs(),
                    "Refresh rejected: still cooling down"
                );
                return RefreshOutcome::CoolingDown { retry_after };
            }
        }

        let symbols = self.shared.symbols.read().clone();
        let work = async {
            self.api.request_refresh(&symbols, force).await?;
            let snapshot = self.api.fetch_snapshot(&symbols).await?;
            let status = self.api.fetch_service_status().await?;
            Ok::<_, ApiError>((snapshot, status))
        };

        tokio::select! {
            () = self.cancel.cancelled() => RefreshOutcome::Cancelled,
            result = work => match result {
                Ok((snapshot, status)) => {
                    if self.cancel.is_cancelled() {
                        return RefreshOutcome::Cancelled;
                    }
                    let applied = apply_snapshot(&self.shared, snapshot);
                    *self.shared.service.write() = Some(status);
                    if !force {
                        self.shared.gate.lock().mark_refreshed(Utc::now());
                    }
                    tracing::info!(applied, force, "Manual refresh completed");
                    RefreshOutcome::Completed { applied }
                }
                Err(err) => {
                    if self.cancel.is_cancelled() {
                        return RefreshOutcome::Cancelled;
                    }
                    record_error(&self.shared, &err.to_string());
                    RefreshOutcome::Failed {
                        error: err.to_string(),
                    }
                }
            },
        }
    }
}

// =============================================================================
// Event Loop
// =============================================================================

/// Background task pumping feed events, throttle flushes, and polling
/// ticks into the shared state.
struct EventLoop {
    api: Arc<dyn MarketDataApi>,
    shared: Arc<SharedState>,
    options: StreamOptions,
    cancel: CancellationToken,
}

impl EventLoop {
    async fn run(self, mut feed_rx: Option<mpsc::Receiver<FeedEvent>>) {
        // Activation fetch: the staleness bound holds from the first
        // moment, independent of the live feed.
        self.poll_once().await;

        let flush_period = self
            .options
            .commit_strategy
            .flush_interval()
            .unwrap_or(Duration::from_millis(100));
        let batched = self.options.commit_strategy.flush_interval().is_some();
        let mut flush = tokio::time::interval_at(
            tokio::time::Instant::now() + flush_period,
            flush_period,
        );
        flush.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut poll = tokio::time::interval_at(
            tokio::time::Instant::now() + self.options.refresh_interval,
            self.options.refresh_interval,
        );
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut pending = ThrottleBuffer::new();

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                event = recv_event(&mut feed_rx) => match event {
                    Some(event) => self.handle_feed_event(event, &mut pending),
                    None => feed_rx = None,
                },
                _ = flush.tick(), if batched => {
                    if !pending.is_empty() && !self.cancel.is_cancelled() {
                        commit_quotes(&self.shared, pending.drain());
                    }
                }
                _ = poll.tick(), if self.options.auto_refresh => {
                    self.poll_once().await;
                }
            }
        }

        tracing::debug!("Client event loop stopped");
    }

    fn handle_feed_event(&self, event: FeedEvent, pending: &mut ThrottleBuffer) {
        // An event that lost the race to deactivation must not touch
        // the torn-down state.
        if self.cancel.is_cancelled() {
            return;
        }

        match event {
            FeedEvent::Connecting => {
                self.shared.status.write().state = ConnectionState::Connecting;
            }
            FeedEvent::Connected => {
                let mut status = self.shared.status.write();
                status.state = ConnectionState::Connected;
                status.error = None;
                status.reconnect_attempts = 0;
            }
            FeedEvent::Reconnecting { attempt } => {
                let mut status = self.shared.status.write();
                status.state = ConnectionState::Reconnecting;
                status.reconnect_attempts = attempt;
            }
            FeedEvent::Fault { reason } => {
                let mut status = self.shared.status.write();
                status.state = ConnectionState::Error;
                status.error = Some(reason);
            }
            FeedEvent::Failed { reason } => {
                let mut status = self.shared.status.write();
                status.state = ConnectionState::Failed;
                status.error = Some(reason);
            }
            FeedEvent::ServerError(message) => {
                self.shared.status.write().error = Some(message);
            }
            FeedEvent::Batch(quotes) => match self.options.commit_strategy {
                CommitStrategy::Immediate => commit_quotes(&self.shared, quotes),
                CommitStrategy::Batched(_) => pending.absorb(quotes),
            },
        }
    }

    /// One polling-path fetch: snapshot plus service status. Failures
    /// are recorded and never cancel the schedule.
    async fn poll_once(&self) {
        let symbols = self.shared.symbols.read().clone();
        let work = async {
            let snapshot = self.api.fetch_snapshot(&symbols).await?;
            let status = self.api.fetch_service_status().await?;
            Ok::<_, ApiError>((snapshot, status))
        };

        tokio::select! {
            () = self.cancel.cancelled() => {}
            result = work => match result {
                Ok((snapshot, status)) => {
                    if !self.cancel.is_cancelled() {
                        apply_snapshot(&self.shared, snapshot);
                        *self.shared.service.write() = Some(status);
                    }
                }
                Err(err) => {
                    if !self.cancel.is_cancelled() {
                        record_error(&self.shared, &err.to_string());
                    }
                }
            },
        }
    }
}

/// Receive from the feed channel, or park forever when there is none.
async fn recv_event(rx: &mut Option<mpsc::Receiver<FeedEvent>>) -> Option<FeedEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Merge a pulled snapshot into the cache and bookkeeping.
fn apply_snapshot(shared: &SharedState, snapshot: PriceSnapshot) -> usize {
    let quotes: Vec<Quote> = snapshot.prices.into_values().collect();
    let stats = shared.cache.write().merge(quotes);
    tracing::debug!(
        applied = stats.applied,
        stale = stats.stale,
        rejected = stats.rejected,
        "Snapshot merged"
    );

    let mut status = shared.status.write();
    if stats.applied > 0 {
        status.last_update = Some(Utc::now());
    }
    // A successful fetch clears transient errors; terminal feed failure
    // stays visible until a manual reconnect.
    if !status.state.is_failed() {
        status.error = None;
    }
    stats.applied
}

/// Commit a batch of live quotes.
fn commit_quotes(shared: &SharedState, quotes: Vec<Quote>) {
    let stats = shared.cache.write().merge(quotes);
    if stats.applied > 0 {
        shared.status.write().last_update = Some(Utc::now());
    }
    tracing::trace!(
        applied = stats.applied,
        stale = stats.stale,
        rejected = stats.rejected,
        "Live batch committed"
    );
}

/// Record a fault into the observable error field.
fn record_error(shared: &SharedState, error: &str) {
    tracing::warn!(error, "Recording client error");
    shared.status.write().error = Some(error.to_string());
}
