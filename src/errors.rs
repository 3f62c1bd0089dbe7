//! Error types for Image Harvester
//!
//! This module defines the error taxonomy for every stage of the pipeline.
//! Per-resource failures (`FetchError`) are absorbed into batch reports, while
//! input, archive and configuration errors are surfaced to the caller.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Rejected caller input; raised before any network activity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// No locators were supplied
    #[error("No resource locators provided")]
    Empty,

    /// A locator could not be accepted
    #[error("Invalid locator at position {index} ({value}): {reason}")]
    InvalidLocator {
        index: usize,
        value: String,
        reason: String,
    },

    /// Too many locators in one request
    #[error("Too many locators: {count} exceeds the limit of {limit}")]
    TooMany { count: usize, limit: usize },

    /// Concurrency limit outside the accepted range
    #[error("Concurrency must be between 1 and {max}, got {requested}")]
    Concurrency { requested: usize, max: usize },
}

/// Failure of a single retrieval attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The attempt did not complete within the per-attempt timeout
    #[error("Request timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    /// The remote host could not be connected to
    #[error("Connection refused: {message}")]
    Refused { message: String },

    /// The server answered with a non-2xx status
    #[error("Server responded with HTTP {status}")]
    Status { status: u16 },

    /// The server answered 2xx with no body
    #[error("Server returned an empty payload")]
    EmptyPayload,

    /// Anything else (TLS, body decoding, redirect loops, ...)
    #[error("{message}")]
    Other { message: String },
}

impl FetchError {
    /// Short stable label used in reports and logs
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout { .. } => "timeout",
            FetchError::Refused { .. } => "connection-refused",
            FetchError::Status { .. } => "http-status",
            FetchError::EmptyPayload => "empty-payload",
            FetchError::Other { .. } => "other",
        }
    }

    pub(crate) fn from_reqwest(error: reqwest::Error, attempt_timeout: Duration) -> Self {
        if error.is_timeout() {
            FetchError::Timeout {
                after: attempt_timeout,
            }
        } else if error.is_connect() {
            FetchError::Refused {
                message: error.to_string(),
            }
        } else if let Some(status) = error.status() {
            FetchError::Status {
                status: status.as_u16(),
            }
        } else {
            FetchError::Other {
                message: error.to_string(),
            }
        }
    }
}

/// Terminal failure of a retrieval after the attempt budget is spent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct FetchFailure {
    /// Number of attempts made
    pub attempts: u32,
    /// Classification of the last error observed
    pub error: FetchError,
}

/// Failures of the single-item download path
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    /// The resource could not be retrieved
    #[error("Failed to download image")]
    Fetch(#[from] FetchFailure),

    /// The resource was retrieved but is not an image
    #[error("URL does not point to an image (detected {detected})")]
    NotAnImage { detected: String },

    /// The locator was rejected before retrieval
    #[error(transparent)]
    Input(#[from] InputError),
}

impl DownloadError {
    /// Whether this failure is a policy rejection rather than a transport problem
    pub fn is_policy_rejection(&self) -> bool {
        matches!(self, DownloadError::NotAnImage { .. } | DownloadError::Input(_))
    }
}

/// Batch scheduler errors surfaced through the completion stream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The batch was cancelled before every task concluded
    #[error("Batch cancelled with {remaining} task(s) outstanding")]
    Cancelled { remaining: usize },
}

/// Archive streaming errors; all of them leave the archive unfinalized
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The sink rejected a write or the container could not be encoded
    #[error("Failed to write archive: {reason}")]
    WriteFailed { reason: String },

    /// The completion stream ended abnormally
    #[error("Archive abandoned: {0}")]
    Aborted(#[from] SchedulerError),
}

impl From<async_zip::error::ZipError> for ArchiveError {
    fn from(error: async_zip::error::ZipError) -> Self {
        ArchiveError::WriteFailed {
            reason: error.to_string(),
        }
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(error: std::io::Error) -> Self {
        ArchiveError::WriteFailed {
            reason: error.to_string(),
        }
    }
}

/// Whole-batch failures
#[derive(Error, Debug)]
pub enum BatchError {
    /// Rejected input
    #[error(transparent)]
    Input(#[from] InputError),

    /// Archive output failed; everything attempted is discarded
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Every requested resource failed; the archive is valid but empty
    #[error("None of the {requested} requested resources could be retrieved")]
    NothingRetrieved {
        requested: usize,
        report: Box<crate::app::models::BatchReport>,
    },

    /// Some ordinals never produced an outcome
    #[error("Batch ended with {received} of {expected} outcome(s)")]
    Incomplete { expected: usize, received: usize },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file could not be read
    #[error("Failed to read configuration file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// HTTP client could not be constructed
    #[error("Failed to build HTTP client")]
    HttpClient(#[from] reqwest::Error),
}

/// HTTP API server errors
#[derive(Error, Debug)]
pub enum ServerError {
    /// Listener could not be bound
    #[error("Failed to bind {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Server loop terminated with an error
    #[error("Server error")]
    Serve(#[source] std::io::Error),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Input error
    #[error(transparent)]
    Input(#[from] InputError),

    /// Single download error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Batch error
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// Retrieval error
    #[error(transparent)]
    Fetch(#[from] FetchFailure),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Server error
    #[error(transparent)]
    Server(#[from] ServerError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (worth retrying later)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Fetch(failure) | AppError::Download(DownloadError::Fetch(failure)) => {
                matches!(
                    failure.error,
                    FetchError::Timeout { .. }
                        | FetchError::Refused { .. }
                        | FetchError::Status { status: 429 | 500..=599 }
                )
            }
            AppError::Batch(BatchError::NothingRetrieved { .. }) => true,
            _ => false,
        }
    }

    /// Get error category for logging and exit reporting
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Input(_) | AppError::Batch(BatchError::Input(_)) => "input",
            AppError::Download(DownloadError::NotAnImage { .. }) => "policy",
            AppError::Download(_) | AppError::Fetch(_) => "download",
            AppError::Batch(BatchError::Archive(_)) => "archive",
            AppError::Batch(BatchError::NothingRetrieved { .. } | BatchError::Incomplete { .. }) => {
                "batch"
            }
            AppError::Config(_) => "config",
            AppError::Server(_) => "server",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Retrieval result type alias
pub type FetchResult<T> = std::result::Result<T, FetchFailure>;

/// Single download result type alias
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Archive result type alias
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

/// Batch result type alias
pub type BatchResult<T> = std::result::Result<T, BatchError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_kinds() {
        // Each transport classification has a stable label
        assert_eq!(
            FetchError::Timeout {
                after: Duration::from_secs(1)
            }
            .kind(),
            "timeout"
        );
        assert_eq!(
            FetchError::Refused {
                message: "nope".into()
            }
            .kind(),
            "connection-refused"
        );
        assert_eq!(FetchError::Status { status: 404 }.kind(), "http-status");
        assert_eq!(FetchError::EmptyPayload.kind(), "empty-payload");
    }

    #[test]
    fn test_failure_display_includes_attempts() {
        let failure = FetchFailure {
            attempts: 3,
            error: FetchError::Status { status: 503 },
        };
        assert_eq!(
            failure.to_string(),
            "Server responded with HTTP 503 (after 3 attempt(s))"
        );
    }

    #[test]
    fn test_recoverable_classification() {
        let transient = AppError::Fetch(FetchFailure {
            attempts: 3,
            error: FetchError::Status { status: 503 },
        });
        assert!(transient.is_recoverable());
        assert_eq!(transient.category(), "download");

        let missing = AppError::Fetch(FetchFailure {
            attempts: 3,
            error: FetchError::Status { status: 404 },
        });
        assert!(!missing.is_recoverable());

        let policy = AppError::Download(DownloadError::NotAnImage {
            detected: "text/html".into(),
        });
        assert!(!policy.is_recoverable());
        assert_eq!(policy.category(), "policy");
    }

    #[test]
    fn test_policy_rejection_flag() {
        assert!(DownloadError::NotAnImage {
            detected: "binary".into()
        }
        .is_policy_rejection());
        assert!(!DownloadError::Fetch(FetchFailure {
            attempts: 1,
            error: FetchError::EmptyPayload
        })
        .is_policy_rejection());
    }
}
