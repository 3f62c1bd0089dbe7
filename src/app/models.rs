//! Data models for Image Harvester
//!
//! This module defines the units of work that flow through the pipeline and
//! the report assembled once a batch has concluded.

use serde::{Deserialize, Serialize};
use tokio::sync::OwnedSemaphorePermit;
use url::Url;

use crate::app::classify::MediaCategory;
use crate::errors::{FetchError, FetchFailure};

/// Lifecycle state of a [`RetrievalTask`]
///
/// The payload only exists in the `Succeeded` variant and the failure reason
/// only in `Failed`, so neither can outlive or precede its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Waiting for a worker
    Pending,
    /// A worker is retrieving it
    InFlight,
    /// Retrieved successfully
    Succeeded {
        payload: Vec<u8>,
        content_type: Option<String>,
    },
    /// Permanently failed
    Failed { reason: FetchError },
}

/// One locator's unit of work within a batch
#[derive(Debug)]
pub struct RetrievalTask {
    ordinal: usize,
    locator: Url,
    attempts: u32,
    status: TaskStatus,
    /// Buffer slot held from retrieval until the task is dropped
    permit: Option<OwnedSemaphorePermit>,
}

impl RetrievalTask {
    /// Create a pending task for the locator at `ordinal`
    pub fn new(ordinal: usize, locator: Url) -> Self {
        Self {
            ordinal,
            locator,
            attempts: 0,
            status: TaskStatus::Pending,
            permit: None,
        }
    }

    /// Position of the locator in the original request
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn locator(&self) -> &Url {
        &self.locator
    }

    /// Attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn status(&self) -> &TaskStatus {
        &self.status
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::Succeeded { .. } | TaskStatus::Failed { .. }
        )
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self.status, TaskStatus::Succeeded { .. })
    }

    /// Move a pending task to in-flight
    pub fn start(&mut self) {
        debug_assert!(matches!(self.status, TaskStatus::Pending));
        self.status = TaskStatus::InFlight;
    }

    /// Attach the buffer slot this task occupies; released on drop
    pub(crate) fn hold_permit(&mut self, permit: OwnedSemaphorePermit) {
        self.permit = Some(permit);
    }

    /// Record a successful retrieval
    pub fn succeed(&mut self, payload: Vec<u8>, content_type: Option<String>, attempts: u32) {
        self.attempts = attempts;
        self.status = TaskStatus::Succeeded {
            payload,
            content_type,
        };
    }

    /// Record a permanent failure; a failed task holds no buffer slot
    pub fn fail(&mut self, failure: FetchFailure) {
        self.permit = None;
        self.attempts = failure.attempts;
        self.status = TaskStatus::Failed {
            reason: failure.error,
        };
    }

    /// Take the payload out of a succeeded task, releasing the task's copy
    ///
    /// The task keeps its `Succeeded` status with an emptied payload; callers
    /// consume the task right after.
    pub fn take_payload(&mut self) -> Option<Vec<u8>> {
        match &mut self.status {
            TaskStatus::Succeeded { payload, .. } => Some(std::mem::take(payload)),
            _ => None,
        }
    }

    /// Failure reason of a failed task
    pub fn failure(&self) -> Option<&FetchError> {
        match &self.status {
            TaskStatus::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// A named payload ready to be appended to an archive
#[derive(Debug)]
pub struct ArchiveEntry {
    pub ordinal: usize,
    pub name: String,
    pub category: MediaCategory,
    pub payload: Vec<u8>,
}

/// Record of an entry written to an archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub ordinal: usize,
    pub locator: String,
    pub name: String,
    pub category: MediaCategory,
    pub size: u64,
    pub attempts: u32,
}

/// Record of a task that could not be retrieved (one line of the failure manifest)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub ordinal: usize,
    pub locator: String,
    pub attempts: u32,
    pub kind: String,
    pub reason: String,
}

impl FailureRecord {
    pub fn new(ordinal: usize, locator: &Url, attempts: u32, error: &FetchError) -> Self {
        Self {
            ordinal,
            locator: locator.to_string(),
            attempts,
            kind: error.kind().to_string(),
            reason: error.to_string(),
        }
    }
}

/// Terminal outcome of one task in a batch report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Succeeded(EntryRecord),
    Failed(FailureRecord),
}

impl TaskOutcome {
    pub fn ordinal(&self) -> usize {
        match self {
            TaskOutcome::Succeeded(entry) => entry.ordinal,
            TaskOutcome::Failed(failure) => failure.ordinal,
        }
    }
}

/// Overall verdict of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every requested resource was archived
    Complete,
    /// Some resources failed; the archive holds the rest
    Partial,
    /// Nothing could be retrieved
    Failed,
}

/// Aggregate outcome of a batch, ordered by ordinal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub requested: usize,
    pub outcomes: Vec<TaskOutcome>,
}

impl BatchReport {
    /// Assemble a report from archived entries and failures
    pub fn new(requested: usize, entries: Vec<EntryRecord>, failures: Vec<FailureRecord>) -> Self {
        let mut outcomes: Vec<TaskOutcome> = entries
            .into_iter()
            .map(TaskOutcome::Succeeded)
            .chain(failures.into_iter().map(TaskOutcome::Failed))
            .collect();
        outcomes.sort_by_key(TaskOutcome::ordinal);
        Self {
            requested,
            outcomes,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TaskOutcome::Succeeded(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Entries that made it into the archive
    pub fn entries(&self) -> impl Iterator<Item = &EntryRecord> {
        self.outcomes.iter().filter_map(|o| match o {
            TaskOutcome::Succeeded(entry) => Some(entry),
            TaskOutcome::Failed(_) => None,
        })
    }

    /// The failure manifest
    pub fn failures(&self) -> impl Iterator<Item = &FailureRecord> {
        self.outcomes.iter().filter_map(|o| match o {
            TaskOutcome::Failed(failure) => Some(failure),
            TaskOutcome::Succeeded(_) => None,
        })
    }

    /// Whether every requested ordinal has exactly one outcome
    pub fn is_complete(&self) -> bool {
        self.outcomes.len() == self.requested
            && self
                .outcomes
                .iter()
                .enumerate()
                .all(|(i, outcome)| outcome.ordinal() == i)
    }

    pub fn outcome(&self) -> BatchOutcome {
        match (self.succeeded(), self.failed()) {
            (0, _) => BatchOutcome::Failed,
            (_, 0) => BatchOutcome::Complete,
            _ => BatchOutcome::Partial,
        }
    }

    /// Human-readable one-line summary
    pub fn summary(&self) -> String {
        format!(
            "{} of {} image(s) retrieved, {} failed",
            self.succeeded(),
            self.requested,
            self.failed()
        )
    }
}
