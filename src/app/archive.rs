//! Streaming ZIP archive output
//!
//! The [`ArchiveStreamer`] consumes a completion stream and appends one
//! Deflate entry per succeeded task to an async sink as soon as the task
//! arrives, so the first bytes of the archive leave the process while other
//! retrievals are still running. The central directory is written only once
//! the stream is exhausted; any error before that leaves the output
//! unfinalized.

use std::sync::Arc;

use async_zip::tokio::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use futures::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::app::classify::classify;
use crate::app::events::{EventRecorder, PipelineEvent, TracingRecorder};
use crate::app::models::{ArchiveEntry, EntryRecord, FailureRecord, RetrievalTask};
use crate::constants::{archive, media};
use crate::errors::{ArchiveError, ArchiveResult, SchedulerError};

/// Entries and failures of a finalized archive, in arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub entries: Vec<EntryRecord>,
    pub failures: Vec<FailureRecord>,
}

/// Writes completions into a ZIP container on an async sink
pub struct ArchiveStreamer {
    total: usize,
    recorder: Arc<dyn EventRecorder>,
}

impl std::fmt::Debug for ArchiveStreamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveStreamer")
            .field("total", &self.total)
            .finish()
    }
}

impl ArchiveStreamer {
    /// Create a streamer for a batch of `total` tasks
    pub fn new(total: usize) -> Self {
        Self {
            total,
            recorder: Arc::new(TracingRecorder),
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn EventRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Width of the zero-padded entry number
    fn ordinal_width(&self) -> usize {
        let digits = self.total.max(1).to_string().len();
        digits.max(archive::MIN_ORDINAL_WIDTH)
    }

    /// Entry name for the task at `ordinal`; numbering is 1-based
    pub fn entry_name(&self, ordinal: usize, extension: &str) -> String {
        format!(
            "{}{:0width$}.{}",
            archive::ENTRY_PREFIX,
            ordinal + 1,
            extension,
            width = self.ordinal_width()
        )
    }

    /// Classify a succeeded task and move its payload into an entry
    fn prepare_entry(&self, task: &mut RetrievalTask) -> Option<(ArchiveEntry, EntryRecord)> {
        let attempts = task.attempts();
        let payload = task.take_payload()?;
        let signature = &payload[..payload.len().min(media::SIGNATURE_LEN)];
        let classification = classify(task.locator(), Some(signature));

        let name = self.entry_name(task.ordinal(), classification.extension);
        let record = EntryRecord {
            ordinal: task.ordinal(),
            locator: task.locator().to_string(),
            name: name.clone(),
            category: classification.category,
            size: payload.len() as u64,
            attempts,
        };
        let entry = ArchiveEntry {
            ordinal: task.ordinal(),
            name,
            category: classification.category,
            payload,
        };
        Some((entry, record))
    }

    /// Drain `completions` into `sink`, finalizing once the stream ends
    ///
    /// The sink is shut down after the trailer is written. On error the
    /// archive is abandoned without a trailer and the sink is left as is.
    ///
    /// # Errors
    ///
    /// * `ArchiveError::WriteFailed` if the sink rejects a write
    /// * `ArchiveError::Aborted` if the stream reports cancellation
    pub async fn stream<S, W>(&self, completions: S, sink: W) -> ArchiveResult<ArchiveSummary>
    where
        S: Stream<Item = Result<RetrievalTask, SchedulerError>> + Unpin,
        W: AsyncWrite + Unpin,
    {
        match self.write_all(completions, sink).await {
            Ok(summary) => Ok(summary),
            Err(error) => {
                self.recorder.record(PipelineEvent::ArchiveAbandoned {
                    reason: error.to_string(),
                });
                Err(error)
            }
        }
    }

    async fn write_all<S, W>(&self, mut completions: S, sink: W) -> ArchiveResult<ArchiveSummary>
    where
        S: Stream<Item = Result<RetrievalTask, SchedulerError>> + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut writer = ZipFileWriter::with_tokio(sink);
        let mut summary = ArchiveSummary::default();

        while let Some(completion) = completions.next().await {
            let mut task = completion?;

            if let Some(reason) = task.failure() {
                summary.failures.push(FailureRecord::new(
                    task.ordinal(),
                    task.locator(),
                    task.attempts(),
                    reason,
                ));
                continue;
            }

            // `task` outlives the write so its buffer slot is held until the entry is out
            let Some((entry, record)) = self.prepare_entry(&mut task) else {
                continue;
            };

            let builder = ZipEntryBuilder::new(entry.name.clone().into(), Compression::Deflate);
            writer.write_entry_whole(builder, &entry.payload).await?;

            self.recorder.record(PipelineEvent::EntryWritten {
                ordinal: entry.ordinal,
                name: entry.name,
                category: entry.category,
                bytes: record.size,
            });
            summary.entries.push(record);
        }

        let mut sink = writer.close().await?.into_inner();
        sink.shutdown().await?;

        debug!(
            "Archive closed: {} entries, {} failures",
            summary.entries.len(),
            summary.failures.len()
        );
        self.recorder.record(PipelineEvent::ArchiveFinalized {
            entries: summary.entries.len(),
            failures: summary.failures.len(),
        });
        Ok(summary)
    }
}
