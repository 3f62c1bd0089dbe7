//! Scheduler worker loop

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::PendingQueue;
use crate::app::client::Fetch;
use crate::app::events::{EventRecorder, PipelineEvent};
use crate::app::models::RetrievalTask;

/// One pool member; runs until the queue is drained or the batch is cancelled
pub(super) struct Worker {
    pub id: usize,
    pub queue: PendingQueue,
    pub fetcher: Arc<dyn Fetch>,
    pub recorder: Arc<dyn EventRecorder>,
    pub completions: mpsc::Sender<RetrievalTask>,
    /// One permit per payload that may be resident at once
    pub slots: Arc<Semaphore>,
    pub token: CancellationToken,
}

impl Worker {
    pub async fn run(self) {
        loop {
            let permit = tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    debug!("Worker {} cancelled while waiting for a slot", self.id);
                    return;
                }
                permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };

            let next = self.queue.lock().await.pop_front();
            let Some(mut task) = next else {
                debug!("Worker {} drained the queue", self.id);
                return;
            };

            task.hold_permit(permit);
            task.start();
            self.recorder.record(PipelineEvent::TaskStarted {
                ordinal: task.ordinal(),
                locator: task.locator().to_string(),
            });

            let outcome = tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    debug!("Worker {} cancelled during task {}", self.id, task.ordinal());
                    return;
                }
                outcome = self.fetcher.retrieve(task.locator()) => outcome,
            };

            match outcome {
                Ok(fetched) => {
                    self.recorder.record(PipelineEvent::TaskSucceeded {
                        ordinal: task.ordinal(),
                        bytes: fetched.payload.len() as u64,
                        attempts: fetched.attempts,
                    });
                    task.succeed(fetched.payload, fetched.content_type, fetched.attempts);
                }
                Err(failure) => {
                    self.recorder.record(PipelineEvent::TaskFailed {
                        ordinal: task.ordinal(),
                        locator: task.locator().to_string(),
                        error: failure.error.clone(),
                    });
                    task.fail(failure);
                }
            }

            // The permit travels with the task until the consumer drops it
            let delivered = tokio::select! {
                biased;
                _ = self.token.cancelled() => false,
                sent = self.completions.send(task) => sent.is_ok(),
            };
            if !delivered {
                debug!("Worker {} stopping: consumer gone", self.id);
                return;
            }
        }
    }
}
