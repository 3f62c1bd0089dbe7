//! Prelude module for Image Harvester Library
//!
//! This module re-exports the most commonly used items from the library,
//! providing a convenient way to import everything needed for typical usage
//! with a single `use image_harvester::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use image_harvester::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::load(None).await?;
//!     let harvester = ImageHarvester::from_config(&config)?;
//!
//!     let download = harvester.download_one("https://example.com/cat.png").await?;
//!     tokio::fs::write(&download.file_name, &download.payload).await?;
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Essential app components that are used in most integrations
pub use crate::app::{
    // Entry point
    ImageHarvester,
    // Collaborators
    EventRecorder,
    Fetch,
    HttpFetcher,
    PipelineEvent,
    TracingRecorder,
    // Result types
    BatchOutcome,
    BatchReport,
    MediaCategory,
    SingleDownload,
    // Functions
    extract_candidates,
    suggested_archive_name,
};

// Configuration
pub use crate::config::{AppConfig, BatchConfig, ServerConfig};
pub use crate::app::{ClientConfig, RetryPolicy};

// Commonly used constants
pub use crate::constants::{DEFAULT_CONCURRENCY, MAX_ATTEMPTS, USER_AGENT};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

// Common external crate re-exports for convenience
pub use tokio;
pub use url::Url;
