//! Candidate image extraction from HTML documents

use std::collections::HashSet;

use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::app::classify::path_extension;
use crate::constants::{media, selectors};

/// Whether a resolved URL looks like a direct image link
fn has_image_suffix(url: &Url) -> bool {
    path_extension(url)
        .map(|ext| media::IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Collect image URLs referenced by `<img src>` elements of a document
///
/// Sources are resolved against `base`, filtered to known image suffixes and
/// deduplicated in first-seen order.
pub fn extract_candidates(document: &str, base: &Url) -> Vec<Url> {
    let selector = match Selector::parse(selectors::IMAGE_SOURCE) {
        Ok(selector) => selector,
        Err(e) => {
            warn!("Invalid image selector: {:?}", e);
            return Vec::new();
        }
    };

    let html = Html::parse_document(document);
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for element in html.select(&selector) {
        let Some(src) = element.value().attr("src") else {
            continue;
        };
        let src = src.trim();
        if src.is_empty() || src.starts_with("data:") {
            continue;
        }

        let resolved = match base.join(src) {
            Ok(url) => url,
            Err(e) => {
                debug!("Skipping unresolvable image source {:?}: {}", src, e);
                continue;
            }
        };

        if !matches!(resolved.scheme(), "http" | "https") || !has_image_suffix(&resolved) {
            continue;
        }

        if seen.insert(resolved.as_str().to_string()) {
            candidates.push(resolved);
        }
    }

    debug!("Found {} candidate image(s) on {}", candidates.len(), base);
    candidates
}
