//! Bounded-concurrency batch scheduling
//!
//! [`BatchScheduler::run`] spawns `min(concurrency, len)` workers that pull
//! tasks from a shared pending queue, retrieve them through the injected
//! [`Fetch`] implementation and hand every concluded task to a single
//! consumer through a bounded channel. Completions arrive in whatever order
//! the network produces them; ordinals are carried on each task.
//!
//! A semaphore with `concurrency` permits bounds resident payloads: a worker
//! takes a permit before retrieving and the permit stays with the task until
//! the consumer drops it.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::app::client::Fetch;
use crate::app::events::{EventRecorder, PipelineEvent, TracingRecorder};
use crate::app::models::RetrievalTask;
use crate::constants::batch;
use crate::errors::{ConfigError, ConfigResult};

mod stream;
mod worker;

pub use stream::CompletionStream;

/// Shared queue of tasks waiting for a worker
pub(crate) type PendingQueue = Arc<Mutex<VecDeque<RetrievalTask>>>;

/// Validate a concurrency limit against the accepted range
pub fn validate_concurrency(concurrency: usize) -> ConfigResult<usize> {
    if concurrency == 0 || concurrency > batch::MAX_CONCURRENCY {
        return Err(ConfigError::InvalidValue {
            field: "batch.concurrency".to_string(),
            value: concurrency.to_string(),
            reason: format!(
                "Concurrency must be between 1 and {}",
                batch::MAX_CONCURRENCY
            ),
        });
    }
    Ok(concurrency)
}

/// Drives a pool of workers over one batch of locators
#[derive(Clone)]
pub struct BatchScheduler {
    fetcher: Arc<dyn Fetch>,
    concurrency: usize,
    recorder: Arc<dyn EventRecorder>,
}

impl std::fmt::Debug for BatchScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScheduler")
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl BatchScheduler {
    /// Create a scheduler with the given concurrency limit
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `concurrency` is zero or above
    /// the supported maximum
    pub fn new(fetcher: Arc<dyn Fetch>, concurrency: usize) -> ConfigResult<Self> {
        Ok(Self {
            fetcher,
            concurrency: validate_concurrency(concurrency)?,
            recorder: Arc::new(TracingRecorder),
        })
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn EventRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Start retrieving `locators` and return the stream of completions
    ///
    /// Ordinals are assigned from input position. The returned stream yields
    /// one completion per locator unless it is cancelled; dropping it cancels
    /// every worker. If a worker dies without reporting, its outstanding
    /// ordinals are yielded as synthesized failures (attempts 0) once the
    /// channel closes, so the count still matches. Each yielded success
    /// occupies a buffer slot until it is dropped, so a consumer holding
    /// `concurrency` successes stalls the batch. Must be called within a
    /// tokio runtime.
    pub fn run(&self, locators: Vec<Url>) -> CompletionStream {
        self.run_until(locators, &CancellationToken::new())
    }

    /// Like [`run`](Self::run), but also stops when `cancel` is triggered
    ///
    /// In-flight retrievals are dropped and no further task starts; the
    /// stream then yields `SchedulerError::Cancelled`.
    pub fn run_until(&self, locators: Vec<Url>, cancel: &CancellationToken) -> CompletionStream {
        let total = locators.len();
        let worker_count = self.concurrency.min(total);

        self.recorder.record(PipelineEvent::BatchStarted {
            locators: total,
            concurrency: self.concurrency,
        });

        let tasks: VecDeque<RetrievalTask> = locators
            .into_iter()
            .enumerate()
            .map(|(ordinal, locator)| RetrievalTask::new(ordinal, locator))
            .collect();
        let outstanding = tasks
            .iter()
            .map(|task| (task.ordinal(), task.locator().clone()))
            .collect();

        let queue: PendingQueue = Arc::new(Mutex::new(tasks));
        let token = cancel.child_token();
        let slots = Arc::new(Semaphore::new(self.concurrency));
        let (tx, rx) = mpsc::channel(self.concurrency);

        for worker_id in 0..worker_count {
            let worker = worker::Worker {
                id: worker_id,
                queue: Arc::clone(&queue),
                fetcher: Arc::clone(&self.fetcher),
                recorder: Arc::clone(&self.recorder),
                completions: tx.clone(),
                slots: Arc::clone(&slots),
                token: token.clone(),
            };
            tokio::spawn(worker.run());
        }

        debug!("Spawned {} worker(s) for {} task(s)", worker_count, total);
        CompletionStream::new(rx, token, outstanding)
    }
}
