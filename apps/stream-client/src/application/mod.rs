//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the streaming client service and the port
//! interfaces that define how the domain interacts with external
//! systems.

/// Port interfaces for the backend collaborator.
pub mod ports;

/// The streaming client service.
pub mod services;
