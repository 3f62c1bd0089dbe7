//! Retry policy and the bounded retry loop
//!
//! Every retrieval runs at most `max_attempts` attempts, each bounded by its
//! own timeout. Between attempts the loop waits `min(base * 2^attempt, cap)`.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};
use url::Url;

use super::Fetched;
use crate::app::events::{EventRecorder, PipelineEvent};
use crate::constants::retry;
use crate::errors::{ConfigError, ConfigResult, FetchError, FetchFailure, FetchResult};

/// Attempt budget, per-attempt timeout and backoff shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per resource, including the first
    pub max_attempts: u32,
    /// Backoff base; the first wait is twice this
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Backoff cap
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// Timeout of one attempt (request and body)
    #[serde(with = "humantime_serde")]
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: retry::MAX_ATTEMPTS,
            base_delay: retry::BASE_DELAY,
            max_delay: retry::MAX_DELAY,
            attempt_timeout: retry::ATTEMPT_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts".to_string(),
                value: "0".to_string(),
                reason: "At least one attempt is required".to_string(),
            });
        }

        if self.base_delay > self.max_delay {
            return Err(ConfigError::InvalidValue {
                field: "retry.base_delay".to_string(),
                value: format!("{:?}", self.base_delay),
                reason: "Base delay must not exceed max delay".to_string(),
            });
        }

        if self.attempt_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "retry.attempt_timeout".to_string(),
                value: "0s".to_string(),
                reason: "Attempt timeout must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Wait after the given (1-based) failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Upper bound on the wall time of one retrieval
    pub fn worst_case(&self) -> Duration {
        (self.attempt_timeout + self.max_delay) * self.max_attempts
    }
}

/// Exponentially growing delay, capped
#[derive(Debug, Clone)]
struct ExponentialDelay {
    next: Duration,
    cap: Duration,
}

impl ExponentialDelay {
    fn new(policy: &RetryPolicy) -> Self {
        Self {
            next: policy.base_delay,
            cap: policy.max_delay,
        }
    }

    fn advance(&mut self) -> Duration {
        self.next = self.next.saturating_mul(2).min(self.cap);
        self.next
    }
}

/// Raw output of one successful attempt
pub type AttemptOutput = (Vec<u8>, Option<String>);

/// Run `attempt` until it yields a non-empty payload or the budget is spent
///
/// `attempt` receives the 1-based attempt number. Each backoff wait is
/// reported to `recorder` as [`PipelineEvent::RetryScheduled`].
pub async fn retry_with_backoff<F, Fut>(
    policy: &RetryPolicy,
    locator: &Url,
    recorder: &dyn EventRecorder,
    mut attempt: F,
) -> FetchResult<Fetched>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<AttemptOutput, FetchError>>,
{
    let mut delay = ExponentialDelay::new(policy);
    let mut attempt_number = 0;

    loop {
        attempt_number += 1;

        let outcome = match timeout(policy.attempt_timeout, attempt(attempt_number)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::Timeout {
                after: policy.attempt_timeout,
            }),
        };

        let error = match outcome {
            Ok((payload, content_type)) if !payload.is_empty() => {
                return Ok(Fetched {
                    payload,
                    content_type,
                    attempts: attempt_number,
                });
            }
            Ok(_) => FetchError::EmptyPayload,
            Err(error) => error,
        };

        if attempt_number >= policy.max_attempts {
            return Err(FetchFailure {
                attempts: attempt_number,
                error,
            });
        }

        let wait = delay.advance();
        recorder.record(PipelineEvent::RetryScheduled {
            locator: locator.to_string(),
            attempt: attempt_number,
            delay: wait,
            error,
        });
        sleep(wait).await;
    }
}
