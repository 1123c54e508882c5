//! Lifecycle management for the courier broker server.
//!
//! # Purpose
//! Owns construction, start, and stop of a single TCP server instance bound
//! to a configured port. The broker engine that interprets connections plugs
//! in through [`ConnectionHandler`]; everything protocol-shaped lives behind
//! that seam.
//!
//! # Notes
//! A handle moves `Unstarted -> Running -> Stopped` exactly once. There is no
//! restart path: changing the port or reviving a stopped server means
//! constructing a new handle.
pub mod config;
pub mod handler;
pub mod lifecycle;

pub use config::{ConfigurationError, ServerConfig};
pub use handler::{ConnectionHandler, DiscardHandler};
pub use lifecycle::{
    DEFAULT_SHUTDOWN_GRACE, LifecycleState, ServerHandle, ServerLifecycleManager, StartError,
    StopError,
};
