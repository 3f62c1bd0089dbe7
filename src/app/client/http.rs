//! Core HTTP retrieval with per-attempt timeout, retry and rate limiting
//!
//! [`HttpFetcher`] is the production [`Fetch`] implementation. Each attempt
//! issues one GET, treats any non-2xx status as a failure and returns the body
//! together with its declared content type, without interpreting either.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Jitter, Quota};
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use url::Url;

use super::config::ClientConfig;
use super::retry::{retry_with_backoff, AttemptOutput, RetryPolicy};
use super::{Fetch, Fetched};
use crate::app::events::{EventRecorder, TracingRecorder};
use crate::constants::http;
use crate::errors::{ConfigError, ConfigResult, FetchError, FetchResult};

type DirectRateLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// HTTP fetcher with resilience patterns
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
    recorder: Arc<dyn EventRecorder>,
    rate_limiter: Option<DirectRateLimiter>,
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("policy", &self.policy)
            .field("rate_limited", &self.rate_limiter.is_some())
            .finish()
    }
}

impl HttpFetcher {
    /// Creates a fetcher from client and retry configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if either configuration is invalid or the HTTP
    /// client cannot be built
    pub fn new(config: &ClientConfig, policy: RetryPolicy) -> ConfigResult<Self> {
        policy.validate()?;
        let client = config.build_http_client()?;
        let rate_limiter = config
            .rate_limit_rps
            .map(Self::build_rate_limiter)
            .transpose()?;

        Ok(Self {
            client,
            policy,
            recorder: Arc::new(TracingRecorder),
            rate_limiter,
        })
    }

    /// Creates a fetcher with default configuration
    pub fn with_defaults() -> ConfigResult<Self> {
        Self::new(&ClientConfig::default(), RetryPolicy::default())
    }

    /// Replace the event recorder
    pub fn with_recorder(mut self, recorder: Arc<dyn EventRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    fn build_rate_limiter(rate_limit_rps: u32) -> ConfigResult<DirectRateLimiter> {
        let rate = NonZeroU32::new(rate_limit_rps).ok_or_else(|| ConfigError::InvalidValue {
            field: "client.rate_limit_rps".to_string(),
            value: rate_limit_rps.to_string(),
            reason: "Rate limit must be non-zero".to_string(),
        })?;
        Ok(governor::RateLimiter::direct(Quota::per_second(rate)))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Performs a single attempt
    async fn attempt(&self, locator: &Url, accept: &'static str) -> Result<AttemptOutput, FetchError> {
        if let Some(limiter) = &self.rate_limiter {
            // Jitter avoids a thundering herd when many workers wake together
            limiter
                .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
                .await;
        }

        let timeout = self.policy.attempt_timeout;
        let response = self
            .client
            .get(locator.as_str())
            .header(ACCEPT, HeaderValue::from_static(accept))
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(e, timeout))?;

        tracing::debug!("Fetched {} bytes from {}", bytes.len(), locator);
        Ok((bytes.to_vec(), content_type))
    }

    async fn retrieve_with_accept(&self, locator: &Url, accept: &'static str) -> FetchResult<Fetched> {
        retry_with_backoff(&self.policy, locator, self.recorder.as_ref(), |_| {
            self.attempt(locator, accept)
        })
        .await
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn retrieve(&self, locator: &Url) -> FetchResult<Fetched> {
        self.retrieve_with_accept(locator, http::ACCEPT_IMAGES).await
    }

    async fn retrieve_document(&self, locator: &Url) -> FetchResult<Fetched> {
        self.retrieve_with_accept(locator, http::ACCEPT_DOCUMENTS)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::events::MemoryRecorder;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            attempt_timeout: Duration::from_secs(2),
        }
    }

    fn fetcher(recorder: &MemoryRecorder) -> HttpFetcher {
        HttpFetcher::new(&ClientConfig::default(), fast_policy())
            .unwrap()
            .with_recorder(Arc::new(recorder.clone()))
    }

    #[test]
    fn test_rate_limiter_zero_fails() {
        assert!(HttpFetcher::build_rate_limiter(0).is_err());
        assert!(HttpFetcher::build_rate_limiter(5).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_returns_body_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cat.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0x89, b'P', b'N', b'G'])
                    .insert_header("content-type", "image/png"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let recorder = MemoryRecorder::new();
        let locator = Url::parse(&format!("{}/cat.png", server.uri())).unwrap();
        let fetched = fetcher(&recorder).retrieve(&locator).await.unwrap();

        assert_eq!(fetched.payload, vec![0x89, b'P', b'N', b'G']);
        assert_eq!(fetched.content_type.as_deref(), Some("image/png"));
        assert_eq!(fetched.attempts, 1);
        assert_eq!(recorder.retry_count(), 0);
    }

    #[tokio::test]
    async fn test_flaky_server_recovers_with_two_backoffs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky.jpg"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
            .with_priority(2)
            .mount(&server)
            .await;

        let recorder = MemoryRecorder::new();
        let locator = Url::parse(&format!("{}/flaky.jpg", server.uri())).unwrap();
        let fetched = fetcher(&recorder).retrieve(&locator).await.unwrap();

        assert_eq!(fetched.payload, vec![0xFF, 0xD8, 0xFF]);
        assert_eq!(fetched.attempts, 3);
        assert_eq!(recorder.retry_count(), 2);
    }

    #[tokio::test]
    async fn test_non_image_content_is_still_returned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html></html>", "text/html")
                    .insert_header("content-type", "text/html"),
            )
            .mount(&server)
            .await;

        let recorder = MemoryRecorder::new();
        let locator = Url::parse(&format!("{}/page", server.uri())).unwrap();
        let fetched = fetcher(&recorder).retrieve(&locator).await.unwrap();
        assert_eq!(fetched.content_type.as_deref(), Some("text/html"));
    }

    #[tokio::test]
    async fn test_not_found_is_classified_after_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(3)
            .mount(&server)
            .await;

        let recorder = MemoryRecorder::new();
        let locator = Url::parse(&format!("{}/missing.gif", server.uri())).unwrap();
        let failure = fetcher(&recorder).retrieve(&locator).await.unwrap_err();

        assert_eq!(failure.error, FetchError::Status { status: 404 });
        assert_eq!(failure.attempts, 3);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_refused() {
        let recorder = MemoryRecorder::new();
        let locator = Url::parse("http://127.0.0.1:1/doesnotexist").unwrap();
        let failure = fetcher(&recorder).retrieve(&locator).await.unwrap_err();

        assert!(matches!(failure.error, FetchError::Refused { .. }));
        assert_eq!(recorder.retry_count(), 2);
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![1, 2, 3])
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let policy = RetryPolicy {
            max_attempts: 1,
            attempt_timeout: Duration::from_millis(100),
            ..fast_policy()
        };
        let fetcher = HttpFetcher::new(&ClientConfig::default(), policy).unwrap();
        let locator = Url::parse(&format!("{}/slow.png", server.uri())).unwrap();
        let failure = fetcher.retrieve(&locator).await.unwrap_err();

        assert!(matches!(failure.error, FetchError::Timeout { .. }));
    }
}
