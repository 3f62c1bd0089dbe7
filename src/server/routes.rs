//! HTTP API route handlers

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use futures::Stream;
use serde_json::{json, Value};
use tokio_util::io::ReaderStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{info, warn};

use super::error_response::ApiError;
use super::state::AppState;
use crate::app::pipeline::{parse_locator, suggested_archive_name};
use crate::constants::archive;
use crate::errors::BatchError;

/// Body of `POST /api/fetch-images`
#[derive(Debug, Default, Deserialize)]
pub struct FetchImagesRequest {
    pub url: Option<String>,
}

/// Response of `POST /api/fetch-images`
#[derive(Debug, Serialize, Deserialize)]
pub struct FetchImagesResponse {
    pub images: Vec<String>,
}

/// Body of `POST /api/download-all`
#[derive(Debug, Default, Deserialize)]
pub struct DownloadAllRequest {
    pub urls: Option<Vec<String>>,
}

/// Query of `GET /api/download-all`; `urls` is a JSON array
#[derive(Debug, Default, Deserialize)]
pub struct DownloadAllQuery {
    pub urls: Option<String>,
}

/// Query of `GET /api/download`
#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub url: Option<String>,
}

/// Attachment header value with a quote-safe file name
fn attachment(file_name: &str) -> String {
    format!(
        "attachment; filename=\"{}\"",
        file_name.replace(['"', '\\'], "_")
    )
}

/// `GET /` and `GET /health`
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "message": "Image harvester API is running",
    }))
}

/// `POST /api/fetch-images`: list image URLs found on a page
pub async fn fetch_images(
    State(state): State<AppState>,
    Json(request): Json<FetchImagesRequest>,
) -> Result<Json<FetchImagesResponse>, ApiError> {
    let url = request
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("URL is required"))?;
    let page = parse_locator(0, &url)?;

    let images = state.harvester.scan(&page).await?;
    info!("Found {} image(s) on {}", images.len(), page);

    Ok(Json(FetchImagesResponse {
        images: images.into_iter().map(String::from).collect(),
    }))
}

/// `POST /api/download-all`: stream a ZIP of the given URLs
pub async fn download_all(
    State(state): State<AppState>,
    Json(request): Json<DownloadAllRequest>,
) -> Result<Response, ApiError> {
    let urls = request
        .urls
        .ok_or_else(|| ApiError::bad_request("URLs array is required"))?;
    stream_archive(state, urls)
}

/// `GET /api/download-all?urls=[...]`: stream a ZIP of the given URLs
pub async fn download_all_query(
    State(state): State<AppState>,
    Query(query): Query<DownloadAllQuery>,
) -> Result<Response, ApiError> {
    let raw = query
        .urls
        .ok_or_else(|| ApiError::bad_request("URLs array is required"))?;
    let urls: Vec<String> = serde_json::from_str(&raw).map_err(|e| {
        ApiError::bad_request("URLs must be a JSON array of strings").with_details(e.to_string())
    })?;
    stream_archive(state, urls)
}

/// Body stream that cancels the batch feeding it when dropped
struct CancelOnDrop<S> {
    inner: S,
    _guard: DropGuard,
}

impl<S: Stream + Unpin> Stream for CancelOnDrop<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Validate up front, then stream the archive while retrievals continue
///
/// The response body owns the batch's cancellation guard: when the client
/// disconnects and the body is dropped, in-flight retrievals stop at once.
fn stream_archive(state: AppState, urls: Vec<String>) -> Result<Response, ApiError> {
    state.harvester.validate_locators(&urls)?;

    let (writer, reader) = tokio::io::duplex(archive::PIPE_BUFFER_SIZE);
    let cancel = CancellationToken::new();
    let body = CancelOnDrop {
        inner: ReaderStream::new(reader),
        _guard: cancel.clone().drop_guard(),
    };

    let harvester = state.harvester.clone();
    tokio::spawn(async move {
        let concurrency = harvester.config().concurrency;
        match harvester
            .archive_until(&urls, concurrency, writer, &cancel)
            .await
        {
            Ok(report) => info!("Archive streamed: {}", report.summary()),
            Err(BatchError::NothingRetrieved { report, .. }) => {
                warn!("Streamed an empty archive: {}", report.summary())
            }
            Err(e) => warn!("Archive stream aborted: {}", e),
        }
    });

    let headers = [
        (CONTENT_TYPE, archive::CONTENT_TYPE.to_string()),
        (CONTENT_DISPOSITION, attachment(&suggested_archive_name())),
    ];
    Ok((
        StatusCode::OK,
        headers,
        Body::from_stream(body),
    )
        .into_response())
}

/// `GET /api/download?url=`: a single image as an attachment
pub async fn download_single(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let url = query
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("URL is required"))?;

    let download = state.harvester.download_one(&url).await?;
    let headers = [
        (CONTENT_TYPE, download.content_type().to_string()),
        (CONTENT_DISPOSITION, attachment(&download.file_name)),
    ];
    Ok((StatusCode::OK, headers, download.payload).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_header_is_quote_safe() {
        assert_eq!(attachment("cat.png"), "attachment; filename=\"cat.png\"");
        assert_eq!(
            attachment("a\"b.png"),
            "attachment; filename=\"a_b.png\""
        );
    }
}
