//! # relay_core
//!
//! Core domain logic for Relay: installation storage, installation-scoped
//! tokens, the review platform abstraction, and the Dangerfile run pipeline.

pub mod auth;
pub mod github;
pub mod migrate;
pub mod models;
pub mod platform;
pub mod recording;
pub mod run;
pub mod settings;
pub mod storage;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
