//! Progress display for batch archiving
//!
//! [`ProgressRecorder`] is an [`EventRecorder`] that drives an indicatif
//! progress bar from pipeline events, so the bundle command shows live
//! progress without the pipeline knowing about terminals.

use std::sync::atomic::{AtomicU64, Ordering};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::debug;

use crate::app::events::{EventRecorder, PipelineEvent};

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Enable visual progress bars
    pub enable_progress_bars: bool,
    /// Show ETA in progress bar
    pub show_eta: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
            show_eta: true,
        }
    }
}

/// Progress bar fed by pipeline events
#[derive(Debug)]
pub struct ProgressRecorder {
    bar: ProgressBar,
    bytes: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
}

impl ProgressRecorder {
    /// Create a progress bar for `total` tasks
    pub fn new(total: usize, config: &ProgressConfig) -> Self {
        let bar = if config.enable_progress_bars {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::hidden())
        };

        let template = if config.show_eta {
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}"
        } else {
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}"
        };
        match ProgressStyle::default_bar().template(template) {
            Ok(style) => bar.set_style(style.progress_chars("##-")),
            Err(e) => debug!("Progress bar template error: {}", e),
        }
        bar.set_message("Downloading images");

        Self {
            bar,
            bytes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        }
    }

    /// Bytes retrieved so far
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Tasks concluded so far
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Finish the bar with a final message
    pub fn finish(&self, message: String) {
        self.bar.finish_with_message(message);
    }

    /// Remove the bar from the terminal
    pub fn abandon(&self) {
        self.bar.finish_and_clear();
    }
}

impl EventRecorder for ProgressRecorder {
    fn record(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::TaskSucceeded { bytes, .. } => {
                self.bytes.fetch_add(bytes, Ordering::Relaxed);
                self.bar.inc(1);
            }
            PipelineEvent::TaskFailed { locator, .. } => {
                let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
                self.bar.inc(1);
                self.bar
                    .set_message(format!("{} failed, last: {}", failures, locator));
            }
            PipelineEvent::RetryScheduled { .. } => {
                self.retries.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchError;

    fn hidden(total: usize) -> ProgressRecorder {
        ProgressRecorder::new(
            total,
            &ProgressConfig {
                enable_progress_bars: false,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_progress_config_defaults() {
        let config = ProgressConfig::default();
        assert!(config.enable_progress_bars);
        assert!(config.show_eta);
    }

    #[test]
    fn test_progress_events() {
        let progress = hidden(3);

        progress.record(PipelineEvent::TaskSucceeded {
            ordinal: 0,
            bytes: 2048,
            attempts: 1,
        });
        progress.record(PipelineEvent::RetryScheduled {
            locator: "https://example.com/b.png".into(),
            attempt: 1,
            delay: std::time::Duration::from_millis(2000),
            error: FetchError::Status { status: 503 },
        });
        progress.record(PipelineEvent::TaskFailed {
            ordinal: 1,
            locator: "https://example.com/b.png".into(),
            error: FetchError::Status { status: 503 },
        });

        assert_eq!(progress.position(), 2);
        assert_eq!(progress.bytes(), 2048);
        assert_eq!(progress.failures(), 1);
        assert_eq!(progress.retries(), 1);

        progress.finish("done".to_string());
    }
}
