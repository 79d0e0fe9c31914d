//! Connection State
//!
//! The observable lifecycle of the live feed link. Exactly one state
//! holds at a time; transitions are driven by the connection manager in
//! `infrastructure::feed::connection`.

use serde::Serialize;

/// Lifecycle state of the live feed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No connection and none in progress. Also the terminal state after
    /// a manual deactivation.
    #[default]
    Disconnected,
    /// Transport dial and handshake in progress.
    Connecting,
    /// Handshake acknowledged; frames are flowing.
    Connected,
    /// Waiting out the backoff delay before the next attempt.
    Reconnecting,
    /// A transport fault was observed; the retry decision is pending.
    Error,
    /// Terminal failure: authentication rejection or the reconnect bound
    /// was exhausted. Only an explicit manual reconnect leaves this
    /// state.
    Failed,
}

impl ConnectionState {
    /// Whether the link is usable for sending directives.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether the manager has given up and requires caller action.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Lowercase name, as surfaced to consumers.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
