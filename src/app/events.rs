//! Pipeline events and the recorder collaborator
//!
//! Components report what they do through an injected [`EventRecorder`]
//! instead of logging to shared global state. The default
//! [`TracingRecorder`] forwards events to `tracing`; tests use
//! [`MemoryRecorder`] to observe them.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::app::classify::MediaCategory;
use crate::errors::FetchError;

/// Something noteworthy that happened in the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A batch was accepted
    BatchStarted { locators: usize, concurrency: usize },
    /// A worker picked up a task
    TaskStarted { ordinal: usize, locator: String },
    /// An attempt failed and another one is scheduled after `delay`
    RetryScheduled {
        locator: String,
        attempt: u32,
        delay: Duration,
        error: FetchError,
    },
    /// A task concluded successfully
    TaskSucceeded {
        ordinal: usize,
        bytes: u64,
        attempts: u32,
    },
    /// A task failed permanently
    TaskFailed {
        ordinal: usize,
        locator: String,
        error: FetchError,
    },
    /// An entry was appended to the archive
    EntryWritten {
        ordinal: usize,
        name: String,
        category: MediaCategory,
        bytes: u64,
    },
    /// The archive trailer was written
    ArchiveFinalized { entries: usize, failures: usize },
    /// Archive output was abandoned without a trailer
    ArchiveAbandoned { reason: String },
}

/// Injected logging collaborator
pub trait EventRecorder: Send + Sync {
    fn record(&self, event: PipelineEvent);
}

/// Recorder that forwards every event to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRecorder;

impl EventRecorder for TracingRecorder {
    fn record(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::BatchStarted {
                locators,
                concurrency,
            } => info!(
                "Starting batch of {} locator(s) with concurrency {}",
                locators, concurrency
            ),
            PipelineEvent::TaskStarted { ordinal, locator } => {
                debug!("Task {} started: {}", ordinal, locator)
            }
            PipelineEvent::RetryScheduled {
                locator,
                attempt,
                delay,
                error,
            } => warn!(
                "Attempt {} for {} failed: {}. Retrying in {}ms",
                attempt,
                locator,
                error,
                delay.as_millis()
            ),
            PipelineEvent::TaskSucceeded {
                ordinal,
                bytes,
                attempts,
            } => debug!(
                "Task {} retrieved {} bytes in {} attempt(s)",
                ordinal, bytes, attempts
            ),
            PipelineEvent::TaskFailed {
                ordinal,
                locator,
                error,
            } => warn!("Task {} failed permanently ({}): {}", ordinal, locator, error),
            PipelineEvent::EntryWritten {
                name,
                category,
                bytes,
                ..
            } => debug!("Archived {} ({}, {} bytes)", name, category, bytes),
            PipelineEvent::ArchiveFinalized { entries, failures } => info!(
                "Archive finalized with {} entries, {} failure(s) skipped",
                entries, failures
            ),
            PipelineEvent::ArchiveAbandoned { reason } => {
                warn!("Archive abandoned without trailer: {}", reason)
            }
        }
    }
}

/// Recorder that keeps every event in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryRecorder {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of backoff waits recorded
    pub fn retry_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, PipelineEvent::RetryScheduled { .. }))
            .count()
    }
}

impl EventRecorder for MemoryRecorder {
    fn record(&self, event: PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Recorder that fans each event out to several recorders
#[derive(Clone, Default)]
pub struct FanoutRecorder {
    recorders: Vec<Arc<dyn EventRecorder>>,
}

impl FanoutRecorder {
    pub fn new(recorders: Vec<Arc<dyn EventRecorder>>) -> Self {
        Self { recorders }
    }
}

impl EventRecorder for FanoutRecorder {
    fn record(&self, event: PipelineEvent) {
        for recorder in &self.recorders {
            recorder.record(event.clone());
        }
    }
}
