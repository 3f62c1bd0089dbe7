//! Single-item download path
//!
//! Retrieves one resource with the same fetcher and retry policy as batches,
//! but, unlike batches, only accepts images.

use chrono::Utc;
use url::Url;

use crate::app::classify::{classify, path_extension, MediaCategory};
use crate::app::client::Fetch;
use crate::constants::{archive, media};
use crate::errors::{DownloadError, DownloadResult};

/// A downloaded image ready to be handed to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleDownload {
    pub payload: Vec<u8>,
    pub category: MediaCategory,
    pub file_name: String,
}

impl SingleDownload {
    /// MIME type to serve the payload with
    pub fn content_type(&self) -> &'static str {
        self.category.mime_type()
    }
}

/// Whether a declared content type permits the image policy
///
/// An absent header says nothing and is allowed.
fn declared_as_image(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(value) => value
            .split(';')
            .next()
            .map(|mime| mime.trim().to_ascii_lowercase().starts_with("image/"))
            .unwrap_or(false),
    }
}

/// Attachment file name for a downloaded image
fn file_name_for(locator: &Url, category: MediaCategory) -> String {
    let named = path_extension(locator)
        .filter(|ext| media::IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .and_then(|_| locator.path_segments()?.last())
        .filter(|segment| !segment.is_empty());

    match named {
        Some(segment) => segment.to_string(),
        None => format!(
            "{}{}.{}",
            archive::ENTRY_PREFIX,
            Utc::now().timestamp_millis(),
            category.extension()
        ),
    }
}

/// Download a single image
///
/// # Errors
///
/// * `DownloadError::Fetch` if retrieval fails after all attempts
/// * `DownloadError::NotAnImage` if the declared content type or the
///   classified category is not an image
pub async fn download_one(fetcher: &dyn Fetch, locator: &Url) -> DownloadResult<SingleDownload> {
    let fetched = fetcher.retrieve(locator).await?;

    if !declared_as_image(fetched.content_type.as_deref()) {
        return Err(DownloadError::NotAnImage {
            detected: fetched.content_type.unwrap_or_default(),
        });
    }

    let signature = &fetched.payload[..fetched.payload.len().min(media::SIGNATURE_LEN)];
    let classification = classify(locator, Some(signature));
    if !classification.category.is_image() {
        return Err(DownloadError::NotAnImage {
            detected: classification.category.mime_type().to_string(),
        });
    }

    tracing::info!(
        "Downloaded {} ({}, {} bytes)",
        locator,
        classification.category,
        fetched.payload.len()
    );

    Ok(SingleDownload {
        file_name: file_name_for(locator, classification.category),
        category: classification.category,
        payload: fetched.payload,
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::app::client::Fetched;
    use crate::errors::{FetchError, FetchFailure, FetchResult};

    struct FixedFetcher {
        payload: Vec<u8>,
        content_type: Option<&'static str>,
    }

    #[async_trait]
    impl Fetch for FixedFetcher {
        async fn retrieve(&self, _locator: &Url) -> FetchResult<Fetched> {
            Ok(Fetched {
                payload: self.payload.clone(),
                content_type: self.content_type.map(str::to_string),
                attempts: 1,
            })
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl Fetch for FailingFetcher {
        async fn retrieve(&self, _locator: &Url) -> FetchResult<Fetched> {
            Err(FetchFailure {
                attempts: 3,
                error: FetchError::Status { status: 500 },
            })
        }
    }

    const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00";

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_declared_content_type_policy() {
        assert!(declared_as_image(None));
        assert!(declared_as_image(Some("image/png")));
        assert!(declared_as_image(Some("IMAGE/JPEG; charset=binary")));
        assert!(!declared_as_image(Some("text/html; charset=utf-8")));
        assert!(!declared_as_image(Some("")));
    }

    #[tokio::test]
    async fn test_keeps_image_file_name() {
        let fetcher = FixedFetcher {
            payload: GIF.to_vec(),
            content_type: Some("image/gif"),
        };
        let download = download_one(&fetcher, &url("https://example.com/img/cat.gif?w=2"))
            .await
            .unwrap();

        assert_eq!(download.file_name, "cat.gif");
        assert_eq!(download.category, MediaCategory::Gif);
        assert_eq!(download.content_type(), "image/gif");
    }

    #[tokio::test]
    async fn test_generates_file_name_from_signature() {
        let fetcher = FixedFetcher {
            payload: GIF.to_vec(),
            content_type: None,
        };
        let download = download_one(&fetcher, &url("https://example.com/render?id=1"))
            .await
            .unwrap();

        assert!(download.file_name.starts_with("image-"));
        assert!(download.file_name.ends_with(".gif"));
    }

    #[tokio::test]
    async fn test_html_is_rejected() {
        let fetcher = FixedFetcher {
            payload: b"<html></html>".to_vec(),
            content_type: Some("text/html"),
        };
        let error = download_one(&fetcher, &url("https://example.com/photo.png"))
            .await
            .unwrap_err();

        assert_eq!(
            error,
            DownloadError::NotAnImage {
                detected: "text/html".into()
            }
        );
        assert!(error.is_policy_rejection());
    }

    #[tokio::test]
    async fn test_unrecognised_bytes_are_rejected() {
        let fetcher = FixedFetcher {
            payload: b"just text".to_vec(),
            content_type: None,
        };
        let error = download_one(&fetcher, &url("https://example.com/blob"))
            .await
            .unwrap_err();
        assert!(matches!(error, DownloadError::NotAnImage { .. }));
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_policy() {
        let error = download_one(&FailingFetcher, &url("https://example.com/a.png"))
            .await
            .unwrap_err();
        assert!(matches!(error, DownloadError::Fetch(_)));
        assert!(!error.is_policy_rejection());
    }
}
