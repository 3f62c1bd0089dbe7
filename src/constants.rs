//! Application constants for Image Harvester
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Environment variable names
pub mod env {
    /// Explicit listening port for the HTTP API
    pub const PORT: &str = "IMAGE_HARVESTER_PORT";

    /// Conventional port variable used by most hosting platforms
    pub const FALLBACK_PORT: &str = "PORT";

    /// Deployment environment ("production" tightens CORS)
    pub const ENVIRONMENT: &str = "IMAGE_HARVESTER_ENV";

    /// Value of [`ENVIRONMENT`] that enables production behaviour
    pub const PRODUCTION: &str = "production";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all outbound requests
    pub const USER_AGENT: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0.0.0 Safari/537.36";

    /// Accept header sent when retrieving resources
    pub const ACCEPT_IMAGES: &str = "image/webp,image/apng,image/*,*/*;q=0.8";

    /// Accept header sent when retrieving documents to scan
    pub const ACCEPT_DOCUMENTS: &str =
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections kept per host
    pub const POOL_MAX_PER_HOST: usize = 8;

    /// Maximum number of redirects to follow
    pub const MAX_REDIRECTS: usize = 5;
}

/// Retry and backoff configuration
pub mod retry {
    use super::Duration;

    /// Attempts made per resource before giving up
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Base delay for exponential backoff
    pub const BASE_DELAY: Duration = Duration::from_millis(1000);

    /// Upper bound on a single backoff delay
    pub const MAX_DELAY: Duration = Duration::from_millis(10_000);

    /// Timeout applied to each individual attempt
    pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);
}

/// Batch scheduling configuration
pub mod batch {
    /// Default number of concurrent retrievals
    pub const DEFAULT_CONCURRENCY: usize = 5;

    /// Largest accepted concurrency limit
    pub const MAX_CONCURRENCY: usize = 32;

    /// Largest accepted number of locators in one batch
    pub const MAX_LOCATORS: usize = 1_000;
}

/// Archive naming and compression
pub mod archive {
    /// Prefix of every entry written to an archive
    pub const ENTRY_PREFIX: &str = "image-";

    /// Minimum width of the zero-padded entry number
    pub const MIN_ORDINAL_WIDTH: usize = 3;

    /// Prefix of suggested archive file names
    pub const FILE_PREFIX: &str = "images-";

    /// MIME type of produced archives
    pub const CONTENT_TYPE: &str = "application/zip";

    /// Buffer size of the in-process pipe between archive writer and HTTP body
    pub const PIPE_BUFFER_SIZE: usize = 64 * 1024;
}

/// Media type detection
pub mod media {
    /// Number of leading payload bytes inspected for signatures
    pub const SIGNATURE_LEN: usize = 12;

    /// Extension used when nothing more specific is known
    pub const FALLBACK_EXTENSION: &str = "jpg";

    /// Path suffixes recognised as images
    pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
}

/// CSS selectors used when scanning documents
pub mod selectors {
    /// Image elements carrying a source attribute
    pub const IMAGE_SOURCE: &str = "img[src]";
}

/// HTTP API server defaults
pub mod server {
    /// Default bind address
    pub const DEFAULT_BIND: &str = "0.0.0.0";

    /// Default listening port
    pub const DEFAULT_PORT: u16 = 3000;

    /// Origins allowed by CORS in production when none are configured
    pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost", "http://127.0.0.1"];
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";

    /// Crate target used when building filter directives
    pub const CRATE_TARGET: &str = "image_harvester";
}

/// Configuration file locations
pub mod files {
    /// Project-local configuration file name
    pub const LOCAL_CONFIG: &str = "image-harvester.toml";

    /// Directory under the user config dir
    pub const CONFIG_DIR: &str = "image-harvester";

    /// File name inside [`CONFIG_DIR`]
    pub const CONFIG_FILE: &str = "config.toml";
}

// Re-export commonly used constants for convenience
pub use batch::DEFAULT_CONCURRENCY;
pub use http::{MAX_REDIRECTS, USER_AGENT};
pub use retry::MAX_ATTEMPTS;
