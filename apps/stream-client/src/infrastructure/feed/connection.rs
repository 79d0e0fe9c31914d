//! Feed Connection Manager
//!
//! Owns the lifecycle of the live price feed: connect, authenticate,
//! receive, detect failure, back off, reconnect up to a bound, and
//! report every state change to the client core.
//!
//! # State machine
//!
//! - `disconnected` → (activate) → `connecting`
//! - `connecting` → (ack) → `connected`
//! - `connecting` → (auth rejection) → `failed` (terminal, no retry)
//! - `connected` → (transport fault) → `reconnecting` while attempts
//!   remain, else `failed`
//! - `reconnecting` → (backoff elapsed) → `connecting`
//! - any → (deactivate) → `disconnected`
//!
//! A successful `connected` transition is the only thing that resets
//! the attempt counter. Out of `failed`, only an explicit
//! [`FeedCommand::Reconnect`] starts over, with a fresh budget.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::domain::quote::Quote;
use crate::infrastructure::config::Credentials;

use super::codec::{CodecError, JsonCodec};
use super::messages::{FeedDirective, FeedFrame};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::watchdog::{LivenessConfig, LivenessTracker};

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can end a feed session.
#[derive(Debug, thiserror::Error)]
pub enum FeedConnectionError {
    /// The transport dial failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The server rejected the handshake for authentication reasons.
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// WebSocket error after the dial.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Directive could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// No acknowledgment within the handshake window.
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// No inbound frames within the idle timeout.
    #[error("no frames received for {0:?}")]
    Stale(Duration),

    /// Server closed the connection.
    #[error("connection closed")]
    Closed,
}

impl FeedConnectionError {
    /// Whether this fault is terminal rather than transient.
    #[must_use]
    pub const fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::AuthRejected(_))
    }
}

// =============================================================================
// Events and Commands
// =============================================================================

/// Events emitted by the feed connection.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Dial and handshake started.
    Connecting,
    /// Handshake acknowledged; subscriptions restored.
    Connected,
    /// Backoff wait before the next attempt.
    Reconnecting {
        /// Attempt number about to be made.
        attempt: u32,
    },
    /// A transport fault was observed.
    Fault {
        /// Human-readable fault description.
        reason: String,
    },
    /// Terminal failure; only a manual reconnect continues.
    Failed {
        /// Human-readable failure description.
        reason: String,
    },
    /// A batch of validated-shape quotes from a `price-update` frame.
    Batch(Vec<Quote>),
    /// Server-reported error string; no state transition.
    ServerError(String),
}

/// Commands accepted by the feed connection.
#[derive(Debug, Clone)]
pub enum FeedCommand {
    /// Replace the symbol set of interest. While connected this sends
    /// incremental subscribe/unsubscribe directives for the delta;
    /// otherwise the new set is used by the next attempt.
    UpdateSymbols(Vec<String>),
    /// Leave the terminal failed state and try again with a fresh
    /// attempt budget. A no-op while connected.
    Reconnect,
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the feed connection.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket URL of the feed endpoint.
    pub url: String,
    /// Session credentials for the `auth` directive.
    pub credentials: Credentials,
    /// Portfolio scopes sent with subscribe directives.
    pub portfolio_ids: Vec<String>,
    /// Reconnection policy configuration.
    pub reconnect: ReconnectConfig,
    /// Handshake acknowledgment window.
    pub handshake_timeout: Duration,
    /// Liveness watchdog configuration.
    pub liveness: LivenessConfig,
}

impl FeedConfig {
    /// Create a configuration with default policies.
    #[must_use]
    pub fn new(url: String, credentials: Credentials) -> Self {
        Self {
            url,
            credentials,
            portfolio_ids: Vec::new(),
            reconnect: ReconnectConfig::default(),
            handshake_timeout: Duration::from_secs(10),
            liveness: LivenessConfig::default(),
        }
    }
}

// =============================================================================
// Symbol Delta
// =============================================================================

/// Compute the sorted subscribe/unsubscribe delta between symbol sets.
fn symbol_delta(current: &HashSet<String>, next: &HashSet<String>) -> (Vec<String>, Vec<String>) {
    let mut added: Vec<String> = next.difference(current).cloned().collect();
    let mut removed: Vec<String> = current.difference(next).cloned().collect();
    added.sort_unstable();
    removed.sort_unstable();
    (added, removed)
}

// =============================================================================
// Feed Connection
// =============================================================================

/// Live feed connection manager.
///
/// Spawned once per activation; emits [`FeedEvent`]s to the client core
/// and consumes [`FeedCommand`]s until cancelled.
pub struct FeedConnection {
    config: FeedConfig,
    codec: JsonCodec,
    symbols: RwLock<HashSet<String>>,
    liveness: LivenessTracker,
    event_tx: mpsc::Sender<FeedEvent>,
    cancel: CancellationToken,
}

/// How a parked or waiting state ended.
enum WaitOutcome {
    /// Proceed with the next attempt.
    Proceed,
    /// The client was deactivated.
    Cancelled,
}

impl FeedConnection {
    /// Create a new feed connection manager.
    #[must_use]
    pub fn new(
        config: FeedConfig,
        symbols: impl IntoIterator<Item = String>,
        event_tx: mpsc::Sender<FeedEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            codec: JsonCodec::new(),
            symbols: RwLock::new(symbols.into_iter().collect()),
            liveness: LivenessTracker::new(),
            event_tx,
            cancel,
        }
    }

    /// Run the connection loop until cancelled.
    ///
    /// Terminal failures (auth rejection, exhausted attempts) park the
    /// loop; it resumes only on [`FeedCommand::Reconnect`].
    pub async fn run(self: Arc<Self>, mut command_rx: mpsc::Receiver<FeedCommand>) {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Feed connection cancelled");
                return;
            }

            self.emit(FeedEvent::Connecting).await;

            match self.establish_and_run(&mut policy, &mut command_rx).await {
                Ok(()) => {
                    tracing::info!("Feed connection closed");
                    return;
                }
                Err(err) if err.is_auth_rejection() => {
                    tracing::error!(error = %err, "Feed authentication rejected");
                    self.emit(FeedEvent::Failed {
                        reason: err.to_string(),
                    })
                    .await;

                    match self.park(&mut command_rx).await {
                        WaitOutcome::Proceed => policy.reset(),
                        WaitOutcome::Cancelled => return,
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Feed connection fault");
                    self.emit(FeedEvent::Fault {
                        reason: err.to_string(),
                    })
                    .await;

                    if let Some(delay) = policy.next_delay() {
                        let attempt = policy.attempt_count();
                        tracing::info!(
                            attempt,
                            delay_ms = delay.as_millis(),
                            "Reconnecting to feed"
                        );
                        self.emit(FeedEvent::Reconnecting { attempt }).await;

                        match self.backoff(delay, &mut command_rx).await {
                            WaitOutcome::Proceed => {}
                            WaitOutcome::Cancelled => return,
                        }
                    } else {
                        let reason = format!(
                            "live feed unavailable after {} reconnect attempts",
                            policy.attempt_count()
                        );
                        tracing::error!(
                            attempts = policy.attempt_count(),
                            "Feed reconnect budget exhausted"
                        );
                        self.emit(FeedEvent::Failed { reason }).await;

                        match self.park(&mut command_rx).await {
                            WaitOutcome::Proceed => policy.reset(),
                            WaitOutcome::Cancelled => return,
                        }
                    }
                }
            }
        }
    }

    /// Dial, handshake, and process frames until a fault or cancellation.
    async fn establish_and_run(
        &self,
        policy: &mut ReconnectPolicy,
        command_rx: &mut mpsc::Receiver<FeedCommand>,
    ) -> Result<(), FeedConnectionError> {
        tracing::info!(url = %self.config.url, "Connecting to price feed");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(&self.config.url)
            .await
            .map_err(classify_connect_error)?;
        let (mut write, mut read) = ws_stream.split();

        // Authenticate first; the server answers with connection-ack or
        // an error frame.
        let auth = FeedDirective::Auth {
            token: self.config.credentials.token().to_string(),
        };
        self.send_directive(&mut write, &auth).await?;

        let handshake = tokio::time::sleep(self.config.handshake_timeout);
        tokio::pin!(handshake);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return Ok(()),
                () = &mut handshake => return Err(FeedConnectionError::HandshakeTimeout),
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => match self.codec.decode(&text) {
                        Ok(FeedFrame::ConnectionAck) => break,
                        Ok(FeedFrame::Error(err)) if err.is_auth_error() => {
                            return Err(FeedConnectionError::AuthRejected(err.msg));
                        }
                        Ok(FeedFrame::Error(err)) => {
                            return Err(FeedConnectionError::Connect(err.msg));
                        }
                        Ok(_) => {
                            tracing::debug!("Ignoring pre-ack frame");
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "Malformed frame during handshake");
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => return Err(FeedConnectionError::Closed),
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err.into()),
                },
            }
        }

        // Handshake acknowledged: this is the only place the attempt
        // budget resets.
        policy.reset();
        self.liveness.reset();
        tracing::info!("Feed connected");
        self.emit(FeedEvent::Connected).await;

        let symbols = self.sorted_symbols();
        if !symbols.is_empty() {
            self.send_directive(
                &mut write,
                &FeedDirective::Subscribe {
                    symbols,
                    portfolio_ids: self.config.portfolio_ids.clone(),
                },
            )
            .await?;
        }

        loop {
            let budget = self.liveness.remaining(&self.config.liveness);
            tokio::select! {
                () = self.cancel.cancelled() => return Ok(()),
                () = tokio::time::sleep(budget) => {
                    return Err(FeedConnectionError::Stale(self.config.liveness.idle_timeout));
                }
                command = command_rx.recv() => match command {
                    Some(FeedCommand::UpdateSymbols(next)) => {
                        self.apply_symbol_delta(&mut write, next).await?;
                    }
                    Some(FeedCommand::Reconnect) => {
                        tracing::debug!("Reconnect command ignored while connected");
                    }
                    // Command channel dropped with the handle; nothing
                    // left to serve.
                    None => return Ok(()),
                },
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        self.liveness.record_frame();
                        self.dispatch_frame(&text).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        self.liveness.record_frame();
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("Server sent close frame");
                        return Err(FeedConnectionError::Closed);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err.into()),
                    None => {
                        tracing::info!("Feed stream ended");
                        return Err(FeedConnectionError::Closed);
                    }
                },
            }
        }
    }

    /// Decode and dispatch one frame. Malformed frames are logged and
    /// dropped; they never end the session.
    async fn dispatch_frame(&self, text: &str) {
        match self.codec.decode(text) {
            Ok(FeedFrame::PriceUpdate { prices }) => {
                let quotes: Vec<Quote> = prices
                    .into_iter()
                    .map(super::messages::PriceEntry::into_quote)
                    .collect();
                self.emit(FeedEvent::Batch(quotes)).await;
            }
            Ok(FeedFrame::Heartbeat) => {
                tracing::trace!("Heartbeat");
            }
            Ok(FeedFrame::ConnectionAck) => {
                tracing::debug!("Duplicate connection-ack ignored");
            }
            Ok(FeedFrame::Error(err)) => {
                tracing::error!(code = err.code, msg = %err.msg, "Feed error frame");
                self.emit(FeedEvent::ServerError(err.msg)).await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Dropping malformed frame");
            }
        }
    }

    /// Send incremental directives for a symbol-set change.
    async fn apply_symbol_delta<W>(
        &self,
        write: &mut W,
        next: Vec<String>,
    ) -> Result<(), FeedConnectionError>
    where
        W: SinkExt<Message> + Unpin,
        W::Error: Into<tokio_tungstenite::tungstenite::Error>,
    {
        let next_set: HashSet<String> = next.into_iter().collect();
        let (added, removed) = {
            let mut current = self.symbols.write();
            let delta = symbol_delta(&current, &next_set);
            *current = next_set;
            delta
        };

        if !added.is_empty() {
            self.send_directive(
                write,
                &FeedDirective::Subscribe {
                    symbols: added,
                    portfolio_ids: self.config.portfolio_ids.clone(),
                },
            )
            .await?;
        }
        if !removed.is_empty() {
            self.send_directive(write, &FeedDirective::Unsubscribe { symbols: removed })
                .await?;
        }
        Ok(())
    }

    /// Encode and send one directive.
    async fn send_directive<W>(
        &self,
        write: &mut W,
        directive: &FeedDirective,
    ) -> Result<(), FeedConnectionError>
    where
        W: SinkExt<Message> + Unpin,
        W::Error: Into<tokio_tungstenite::tungstenite::Error>,
    {
        let json = self.codec.encode(directive)?;
        tracing::debug!(directive = %json, "Sending feed directive");
        write
            .send(Message::Text(json.into()))
            .await
            .map_err(|err| FeedConnectionError::WebSocket(err.into()))
    }

    /// Wait out a backoff delay, still serving symbol updates.
    ///
    /// A reconnect command short-circuits the wait.
    async fn backoff(
        &self,
        delay: Duration,
        command_rx: &mut mpsc::Receiver<FeedCommand>,
    ) -> WaitOutcome {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return WaitOutcome::Cancelled,
                () = &mut sleep => return WaitOutcome::Proceed,
                command = command_rx.recv() => match command {
                    Some(FeedCommand::UpdateSymbols(next)) => self.replace_symbols(next),
                    Some(FeedCommand::Reconnect) => return WaitOutcome::Proceed,
                    None => return WaitOutcome::Cancelled,
                },
            }
        }
    }

    /// Park in the terminal failed state until a reconnect command.
    async fn park(&self, command_rx: &mut mpsc::Receiver<FeedCommand>) -> WaitOutcome {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return WaitOutcome::Cancelled,
                command = command_rx.recv() => match command {
                    Some(FeedCommand::UpdateSymbols(next)) => self.replace_symbols(next),
                    Some(FeedCommand::Reconnect) => {
                        tracing::info!("Manual reconnect requested");
                        return WaitOutcome::Proceed;
                    }
                    None => return WaitOutcome::Cancelled,
                },
            }
        }
    }

    /// Replace the symbol set while not connected.
    fn replace_symbols(&self, next: Vec<String>) {
        *self.symbols.write() = next.into_iter().collect();
    }

    /// Current symbol set, sorted for deterministic directives.
    fn sorted_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.symbols.read().iter().cloned().collect();
        symbols.sort_unstable();
        symbols
    }

    async fn emit(&self, event: FeedEvent) {
        let _ = self.event_tx.send(event).await;
    }
}

/// Map a dial failure, distinguishing auth rejections surfaced at the
/// HTTP upgrade (401/403) from transient faults.
fn classify_connect_error(err: tokio_tungstenite::tungstenite::Error) -> FeedConnectionError {
    use tokio_tungstenite::tungstenite::Error;

    match err {
        Error::Http(response) if matches!(response.status().as_u16(), 401 | 403) => {
            FeedConnectionError::AuthRejected(format!(
                "feed endpoint returned {}",
                response.status()
            ))
        }
        other => FeedConnectionError::Connect(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(symbols: &[&str]) -> HashSet<String> {
        symbols.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn symbol_delta_computes_both_sides() {
        let current = set(&["AAPL", "MSFT", "TSLA"]);
        let next = set(&["AAPL", "NVDA", "AMD"]);

        let (added, removed) = symbol_delta(&current, &next);
        assert_eq!(added, vec!["AMD".to_string(), "NVDA".to_string()]);
        assert_eq!(removed, vec!["MSFT".to_string(), "TSLA".to_string()]);
    }

    #[test]
    fn symbol_delta_empty_for_identical_sets() {
        let current = set(&["AAPL"]);
        let (added, removed) = symbol_delta(&current, &current.clone());
        assert!(added.is_empty());
        assert!(removed.is_empty());
    }

    #[test]
    fn connect_error_classification() {
        use tokio_tungstenite::tungstenite::Error;
        use tokio_tungstenite::tungstenite::http::Response;

        let unauthorized = Response::builder().status(401).body(None).unwrap();
        let classified = classify_connect_error(Error::Http(Box::new(unauthorized)));
        assert!(classified.is_auth_rejection());

        let server_error = Response::builder().status(503).body(None).unwrap();
        let classified = classify_connect_error(Error::Http(Box::new(server_error)));
        assert!(!classified.is_auth_rejection());
        assert!(matches!(classified, FeedConnectionError::Connect(_)));
    }

    #[test]
    fn auth_rejection_is_terminal() {
        let err = FeedConnectionError::AuthRejected("bad token".to_string());
        assert!(err.is_auth_rejection());

        let err = FeedConnectionError::Closed;
        assert!(!err.is_auth_rejection());
    }
}
