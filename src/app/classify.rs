//! Media type classification
//!
//! Determines an image subtype and a safe file extension from a locator's
//! path suffix, falling back to well-known signature bytes. Classification
//! never fails: unknown content becomes [`MediaCategory::Binary`].

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::media;

/// Content category of a retrieved payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Jpeg,
    Png,
    Gif,
    Webp,
    /// Unrecognised content
    Binary,
}

impl MediaCategory {
    /// MIME type for response headers
    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaCategory::Jpeg => "image/jpeg",
            MediaCategory::Png => "image/png",
            MediaCategory::Gif => "image/gif",
            MediaCategory::Webp => "image/webp",
            MediaCategory::Binary => "application/octet-stream",
        }
    }

    /// Canonical file extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            MediaCategory::Jpeg => "jpg",
            MediaCategory::Png => "png",
            MediaCategory::Gif => "gif",
            MediaCategory::Webp => "webp",
            MediaCategory::Binary => media::FALLBACK_EXTENSION,
        }
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, MediaCategory::Binary)
    }

    /// Map a path extension (any case) to a category
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(MediaCategory::Jpeg),
            "png" => Some(MediaCategory::Png),
            "gif" => Some(MediaCategory::Gif),
            "webp" => Some(MediaCategory::Webp),
            _ => None,
        }
    }

    /// Match a payload prefix against the signature table
    pub fn from_signature(bytes: &[u8]) -> Option<Self> {
        const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF];

        let prefix = &bytes[..bytes.len().min(media::SIGNATURE_LEN)];
        if prefix.starts_with(PNG) {
            Some(MediaCategory::Png)
        } else if prefix.starts_with(JPEG) {
            Some(MediaCategory::Jpeg)
        } else if prefix.starts_with(b"GIF87a") || prefix.starts_with(b"GIF89a") {
            Some(MediaCategory::Gif)
        } else if prefix.len() >= 12 && prefix.starts_with(b"RIFF") && &prefix[8..12] == b"WEBP" {
            Some(MediaCategory::Webp)
        } else {
            None
        }
    }
}

impl std::fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Result of classifying a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: MediaCategory,
    pub extension: &'static str,
    /// Neither the suffix nor the signature resolved; defaults were applied
    pub ambiguous: bool,
}

impl Classification {
    fn resolved(category: MediaCategory) -> Self {
        Self {
            category,
            extension: category.extension(),
            ambiguous: false,
        }
    }
}

/// Extension of the last path segment of a locator, if any
pub fn path_extension(locator: &Url) -> Option<&str> {
    let segment = locator.path_segments()?.last()?;
    let (stem, extension) = segment.rsplit_once('.')?;
    (!stem.is_empty() && !extension.is_empty()).then_some(extension)
}

/// Classify a resource by locator suffix, then by signature bytes
pub fn classify(locator: &Url, first_bytes: Option<&[u8]>) -> Classification {
    if let Some(category) = path_extension(locator).and_then(MediaCategory::from_extension) {
        return Classification::resolved(category);
    }

    if let Some(category) = first_bytes.and_then(MediaCategory::from_signature) {
        return Classification::resolved(category);
    }

    Classification {
        category: MediaCategory::Binary,
        extension: media::FALLBACK_EXTENSION,
        ambiguous: true,
    }
}
