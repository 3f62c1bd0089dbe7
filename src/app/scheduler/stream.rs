//! Completion stream handed to the batch consumer

use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::warn;
use url::Url;

use crate::app::models::RetrievalTask;
use crate::errors::{FetchError, FetchFailure, SchedulerError};

/// Stream of concluded tasks, in completion order
///
/// Yields `Ok(task)` once per ordinal. If the batch is cancelled before every
/// ordinal concluded, a single `Err(SchedulerError::Cancelled)` is yielded
/// and the stream ends. Dropping the stream cancels the batch.
pub struct CompletionStream {
    receiver: mpsc::Receiver<RetrievalTask>,
    token: CancellationToken,
    _guard: DropGuard,
    outstanding: BTreeMap<usize, Url>,
    total: usize,
    finished: bool,
}

impl std::fmt::Debug for CompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStream")
            .field("total", &self.total)
            .field("remaining", &self.outstanding.len())
            .field("finished", &self.finished)
            .finish()
    }
}

impl CompletionStream {
    pub(super) fn new(
        receiver: mpsc::Receiver<RetrievalTask>,
        token: CancellationToken,
        outstanding: BTreeMap<usize, Url>,
    ) -> Self {
        Self {
            receiver,
            _guard: token.clone().drop_guard(),
            token,
            total: outstanding.len(),
            outstanding,
            finished: false,
        }
    }

    /// Number of tasks in the batch
    pub fn total(&self) -> usize {
        self.total
    }

    /// Tasks not yet yielded
    pub fn remaining(&self) -> usize {
        self.outstanding.len()
    }

    /// Stop every worker; in-flight retrievals are dropped
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Token that cancels this batch when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Failed completion for an ordinal whose worker went away
    fn orphaned(ordinal: usize, locator: Url) -> RetrievalTask {
        warn!("No completion received for task {} ({})", ordinal, locator);
        let mut task = RetrievalTask::new(ordinal, locator);
        task.start();
        task.fail(FetchFailure {
            attempts: 0,
            error: FetchError::Other {
                message: "worker terminated before completing the task".to_string(),
            },
        });
        task
    }
}

impl Stream for CompletionStream {
    type Item = Result<RetrievalTask, SchedulerError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.finished {
            return Poll::Ready(None);
        }

        if this.token.is_cancelled() && !this.outstanding.is_empty() {
            this.finished = true;
            return Poll::Ready(Some(Err(SchedulerError::Cancelled {
                remaining: this.outstanding.len(),
            })));
        }

        match this.receiver.poll_recv(cx) {
            Poll::Ready(Some(task)) => {
                this.outstanding.remove(&task.ordinal());
                Poll::Ready(Some(Ok(task)))
            }
            Poll::Ready(None) => {
                if this.token.is_cancelled() && !this.outstanding.is_empty() {
                    this.finished = true;
                    return Poll::Ready(Some(Err(SchedulerError::Cancelled {
                        remaining: this.outstanding.len(),
                    })));
                }
                match this.outstanding.pop_first() {
                    Some((ordinal, locator)) => {
                        Poll::Ready(Some(Ok(Self::orphaned(ordinal, locator))))
                    }
                    None => {
                        this.finished = true;
                        Poll::Ready(None)
                    }
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
