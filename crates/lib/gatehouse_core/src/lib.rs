//! # gatehouse_core
//!
//! Core session and token logic for Gatehouse.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod session;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
