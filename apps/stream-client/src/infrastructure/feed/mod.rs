//! Live Feed Adapter
//!
//! WebSocket client for the real-time price feed:
//!
//! - **connection**: lifecycle state machine with bounded reconnect
//! - **messages** / **codec**: JSON wire protocol
//! - **reconnect**: fixed-delay retry policy
//! - **watchdog**: inbound-frame liveness monitoring
//! - **throttle**: batched commit strategy for noisy updates

pub mod codec;
pub mod connection;
pub mod messages;
pub mod reconnect;
pub mod throttle;
pub mod watchdog;

pub use codec::{CodecError, JsonCodec};
pub use connection::{
    FeedCommand, FeedConfig, FeedConnection, FeedConnectionError, FeedEvent,
};
pub use messages::{ErrorFrame, FeedDirective, FeedFrame, PriceEntry};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use throttle::{CommitStrategy, ThrottleBuffer};
pub use watchdog::{LivenessConfig, LivenessTracker};
