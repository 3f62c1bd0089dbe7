//! Image Harvester Library
//!
//! A Rust library for retrieving batches of remote images concurrently and
//! streaming them into a ZIP archive while retrievals are still running.
//! Provides bounded concurrency, retry with exponential backoff, media type
//! detection and an HTTP API for browser front ends.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;
pub mod server;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
