//! Turnstile HTTP server library.
//!
//! Exposes config, state, error handling and routes so integration tests and
//! the binary entrypoint build the same application.

pub mod config;
pub mod error;
pub mod executor;
pub mod routes;
pub mod shutdown;
pub mod state;
