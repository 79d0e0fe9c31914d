//! Application Services
//!
//! The streaming client service that orchestrates the domain cache,
//! the live feed adapter, and the pull-path port.

mod client;

pub use client::{RefreshOutcome, StreamClient, StreamSnapshot};
