//! Configuration
//!
//! Settings types for the streaming client, loaded from environment
//! variables.

mod settings;

pub use settings::{
    ApiSettings, ClientSettings, ConfigError, Credentials, StreamOptions, StreamSettings,
};
