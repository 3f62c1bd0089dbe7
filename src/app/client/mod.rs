//! Resource retrieval
//!
//! This module provides the [`Fetch`] seam between the pipeline and the
//! network, plus the production HTTP implementation.
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and building
//! - `retry`: retry policy and the bounded backoff loop
//! - `http`: reqwest-backed fetcher with optional rate limiting

use async_trait::async_trait;
use url::Url;

use crate::errors::FetchResult;

pub mod config;
pub mod http;
pub mod retry;

pub use config::ClientConfig;
pub use http::HttpFetcher;
pub use retry::{retry_with_backoff, RetryPolicy};

/// Payload of a successful retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// Response body; never empty
    pub payload: Vec<u8>,
    /// Declared `Content-Type`, uninterpreted
    pub content_type: Option<String>,
    /// Attempts it took, including the successful one
    pub attempts: u32,
}

/// Retrieves one resource, retrying transient failures
///
/// Implementations own their retry policy and must be safe to call again for
/// the same locator.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Retrieve a resource expected to be an image
    async fn retrieve(&self, locator: &Url) -> FetchResult<Fetched>;

    /// Retrieve a document to scan for candidates
    async fn retrieve_document(&self, locator: &Url) -> FetchResult<Fetched> {
        self.retrieve(locator).await
    }
}

#[async_trait]
impl<F: Fetch + ?Sized> Fetch for std::sync::Arc<F> {
    async fn retrieve(&self, locator: &Url) -> FetchResult<Fetched> {
        (**self).retrieve(locator).await
    }

    async fn retrieve_document(&self, locator: &Url) -> FetchResult<Fetched> {
        (**self).retrieve_document(locator).await
    }
}
