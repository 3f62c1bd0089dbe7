//! Core application logic for Image Harvester
//!
//! This module contains the pipeline components: the retrying fetcher, the
//! media classifier, the batch scheduler, the streaming archive writer and
//! the single-item download path, tied together by [`ImageHarvester`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use image_harvester::app::ImageHarvester;
//! use image_harvester::config::AppConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let harvester = ImageHarvester::from_config(&AppConfig::default())?;
//!
//! let file = tokio::fs::File::create("images.zip").await?;
//! let report = harvester
//!     .archive(&["https://example.com/a.png", "https://example.com/b.jpg"], file)
//!     .await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod classify;
pub mod client;
pub mod events;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod scheduler;
pub mod single;

// Re-export main public API
pub use archive::{ArchiveStreamer, ArchiveSummary};
pub use classify::{classify, Classification, MediaCategory};
pub use client::{ClientConfig, Fetch, Fetched, HttpFetcher, RetryPolicy};
pub use events::{EventRecorder, MemoryRecorder, PipelineEvent, TracingRecorder};
pub use extract::extract_candidates;
pub use models::{
    BatchOutcome, BatchReport, EntryRecord, FailureRecord, RetrievalTask, TaskOutcome, TaskStatus,
};
pub use pipeline::{suggested_archive_name, ImageHarvester};
pub use scheduler::{BatchScheduler, CompletionStream};
pub use single::{download_one, SingleDownload};
