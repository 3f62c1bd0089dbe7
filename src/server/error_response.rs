//! JSON error bodies for the HTTP API

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::{BatchError, DownloadError, FetchFailure, InputError};

/// Error body returned by every endpoint: `{ "error": ..., "details": ... }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: u16,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST.as_u16(),
            error: error.into(),
            details: None,
        }
    }

    pub fn internal(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            error: error.into(),
            details: Some(details.into()),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl From<InputError> for ApiError {
    fn from(error: InputError) -> Self {
        ApiError::bad_request("Invalid request").with_details(error.to_string())
    }
}

impl From<DownloadError> for ApiError {
    fn from(error: DownloadError) -> Self {
        match &error {
            DownloadError::Fetch(failure) => {
                ApiError::internal("Failed to download image", failure.to_string())
            }
            DownloadError::NotAnImage { .. } | DownloadError::Input(_) => {
                ApiError::bad_request(error.to_string())
            }
        }
    }
}

impl From<BatchError> for ApiError {
    fn from(error: BatchError) -> Self {
        match error {
            BatchError::Input(input) => input.into(),
            other => ApiError::internal("Failed to create archive", other.to_string()),
        }
    }
}

impl From<FetchFailure> for ApiError {
    fn from(failure: FetchFailure) -> Self {
        ApiError::internal("Failed to fetch images", failure.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
