//! Image harvesting pipeline
//!
//! [`ImageHarvester`] ties the components together: it validates caller
//! input, runs the batch scheduler into the archive streamer and assembles
//! the [`BatchReport`]. It also exposes the single-item and scan paths so
//! every entry point shares one fetcher and one retry policy.

use std::sync::Arc;

use chrono::Utc;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

use crate::app::archive::ArchiveStreamer;
use crate::app::client::{Fetch, HttpFetcher};
use crate::app::events::{EventRecorder, TracingRecorder};
use crate::app::extract::extract_candidates;
use crate::app::models::BatchReport;
use crate::app::scheduler::BatchScheduler;
use crate::app::single::{download_one, SingleDownload};
use crate::config::{AppConfig, BatchConfig};
use crate::constants::{archive, batch};
use crate::errors::{
    BatchError, BatchResult, ConfigResult, DownloadResult, FetchResult, InputError,
};

/// Parse one locator, accepting only absolute http(s) URLs
pub fn parse_locator(index: usize, value: &str) -> Result<Url, InputError> {
    let invalid = |reason: String| InputError::InvalidLocator {
        index,
        value: value.to_string(),
        reason,
    };

    let url = Url::parse(value.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        "http" | "https" => Err(invalid("missing host".to_string())),
        scheme => Err(invalid(format!("unsupported scheme '{}'", scheme))),
    }
}

/// Suggested file name for a freshly produced archive
pub fn suggested_archive_name() -> String {
    format!(
        "{}{}.zip",
        archive::FILE_PREFIX,
        Utc::now().timestamp_millis()
    )
}

/// Entry point for batch archives, single downloads and page scans
#[derive(Clone)]
pub struct ImageHarvester {
    fetcher: Arc<dyn Fetch>,
    config: BatchConfig,
    recorder: Arc<dyn EventRecorder>,
}

impl std::fmt::Debug for ImageHarvester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageHarvester")
            .field("config", &self.config)
            .finish()
    }
}

impl ImageHarvester {
    /// Create a harvester around an existing fetcher
    pub fn new(fetcher: Arc<dyn Fetch>, config: BatchConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            fetcher,
            config,
            recorder: Arc::new(TracingRecorder),
        })
    }

    /// Build the production harvester from application configuration
    pub fn from_config(config: &AppConfig) -> ConfigResult<Self> {
        Self::from_config_with_recorder(config, Arc::new(TracingRecorder))
    }

    /// Build the production harvester, sending events to `recorder`
    pub fn from_config_with_recorder(
        config: &AppConfig,
        recorder: Arc<dyn EventRecorder>,
    ) -> ConfigResult<Self> {
        let fetcher = HttpFetcher::new(&config.client, config.retry.clone())?
            .with_recorder(Arc::clone(&recorder));
        Ok(Self::new(Arc::new(fetcher), config.batch.clone())?.with_recorder(recorder))
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn EventRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Validate raw locators before any network activity
    ///
    /// # Errors
    ///
    /// * `InputError::Empty` for an empty list
    /// * `InputError::TooMany` above the configured limit
    /// * `InputError::InvalidLocator` for the first entry that is not an
    ///   absolute http(s) URL
    pub fn validate_locators<S: AsRef<str>>(&self, locators: &[S]) -> Result<Vec<Url>, InputError> {
        if locators.is_empty() {
            return Err(InputError::Empty);
        }

        if locators.len() > self.config.max_locators {
            return Err(InputError::TooMany {
                count: locators.len(),
                limit: self.config.max_locators,
            });
        }

        locators
            .iter()
            .enumerate()
            .map(|(index, value)| parse_locator(index, value.as_ref()))
            .collect()
    }

    /// Retrieve every locator and stream the archive into `sink`
    ///
    /// Uses the configured concurrency limit.
    pub async fn archive<S, W>(&self, locators: &[S], sink: W) -> BatchResult<BatchReport>
    where
        S: AsRef<str>,
        W: AsyncWrite + Unpin,
    {
        self.archive_with_concurrency(locators, self.config.concurrency, sink)
            .await
    }

    /// Retrieve every locator with an explicit concurrency limit
    ///
    /// # Errors
    ///
    /// * `BatchError::Input` if validation fails; nothing is written
    /// * `BatchError::Archive` if the archive could not be completed
    /// * `BatchError::NothingRetrieved` if every retrieval failed; the sink
    ///   still holds a valid, empty archive
    pub async fn archive_with_concurrency<S, W>(
        &self,
        locators: &[S],
        concurrency: usize,
        sink: W,
    ) -> BatchResult<BatchReport>
    where
        S: AsRef<str>,
        W: AsyncWrite + Unpin,
    {
        self.archive_until(locators, concurrency, sink, &CancellationToken::new())
            .await
    }

    /// Retrieve every locator until done or until `cancel` fires
    ///
    /// Cancelling stops in-flight retrievals, starts no new ones and leaves
    /// the archive unfinalized (`ArchiveError::Aborted`). Used by callers
    /// that learn about a departed consumer before the sink does, such as an
    /// HTTP response body being dropped.
    pub async fn archive_until<S, W>(
        &self,
        locators: &[S],
        concurrency: usize,
        sink: W,
        cancel: &CancellationToken,
    ) -> BatchResult<BatchReport>
    where
        S: AsRef<str>,
        W: AsyncWrite + Unpin,
    {
        let locators = self.validate_locators(locators)?;
        let requested = locators.len();

        let scheduler = BatchScheduler::new(Arc::clone(&self.fetcher), concurrency)
            .map_err(|_| InputError::Concurrency {
                requested: concurrency,
                max: batch::MAX_CONCURRENCY,
            })?
            .with_recorder(Arc::clone(&self.recorder));
        let streamer = ArchiveStreamer::new(requested).with_recorder(Arc::clone(&self.recorder));

        let completions = scheduler.run_until(locators, cancel);
        let summary = streamer.stream(completions, sink).await?;

        let report = BatchReport::new(requested, summary.entries, summary.failures);
        if !report.is_complete() {
            return Err(BatchError::Incomplete {
                expected: requested,
                received: report.outcomes.len(),
            });
        }

        info!("Batch finished: {}", report.summary());
        if report.succeeded() == 0 {
            return Err(BatchError::NothingRetrieved {
                requested,
                report: Box::new(report),
            });
        }
        Ok(report)
    }

    /// Download a single image
    pub async fn download_one(&self, locator: &str) -> DownloadResult<SingleDownload> {
        let locator = parse_locator(0, locator)?;
        download_one(self.fetcher.as_ref(), &locator).await
    }

    /// Fetch a page and list the image URLs it references
    pub async fn scan(&self, page: &Url) -> FetchResult<Vec<Url>> {
        let fetched = self.fetcher.retrieve_document(page).await?;
        let document = String::from_utf8_lossy(&fetched.payload);
        Ok(extract_candidates(&document, page))
    }
}
