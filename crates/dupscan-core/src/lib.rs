#![forbid(unsafe_code)]
//! dupscan-core library.
//!
//! # Conventions
//!
//! - **Errors**: `anyhow::Result` for I/O and storage; [`error::DupError`]
//!   for request validation failures that callers must be able to match on.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod chunk;
pub mod config;
pub mod db;
pub mod error;
pub mod model;

pub use error::{DupError, ErrorCode};
