//! Command-line interface components
//!
//! This module contains CLI-specific code for the Image Harvester
//! application, including argument parsing, progress display and command
//! handlers.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{BundleArgs, Cli, Commands, FetchArgs, GlobalArgs, ScanArgs, ServeArgs};
pub use commands::{handle_bundle, handle_fetch, handle_scan, handle_serve};
pub use progress::{ProgressConfig, ProgressRecorder};
