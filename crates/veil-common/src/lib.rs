//! Shared utilities for Veil: wire protocol, logging, error types.
//!
//! This crate provides common infrastructure used by the relay and its clients.

#![forbid(unsafe_code)]

pub mod error;
pub mod helpers;
pub mod protocol;

pub use error::{Error, Result};
pub use protocol::*;

/// Initialize tracing with a default level.
///
/// `RUST_LOG` overrides `default_level` when set.
pub fn init_tracing_with_default(default_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
