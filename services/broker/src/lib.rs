//! Broker service library crate.
//!
//! # Purpose
//! Exposes the service-level pieces (configuration resolution, observability
//! setup) for use by the broker binary and integration tests. The lifecycle
//! core itself lives in `courier-server`.
pub mod config;
pub mod observability;

#[cfg(test)]
// Test utilities live alongside the library for reuse across test modules.
mod test_support;
