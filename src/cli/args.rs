//! Command-line argument parsing for Image Harvester
//!
//! This module defines the CLI structure using clap derive macros, covering
//! page scanning, single downloads, batch archiving and the HTTP API.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::constants::batch;

/// Image Harvester - Retrieve images in bulk and archive them
#[derive(Parser, Debug)]
#[command(
    name = "image_harvester",
    version,
    about = "Retrieve remote images concurrently and stream them into a ZIP archive",
    long_about = "A tool for collecting images from the web.
Scans pages for image links, downloads single images, and bundles many images into a ZIP
archive with bounded concurrency, automatic retry and media type detection."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List image URLs referenced by a web page
    Scan(ScanArgs),

    /// Download a single image
    Fetch(FetchArgs),

    /// Download many images into a ZIP archive
    Bundle(BundleArgs),

    /// Run the HTTP API
    Serve(ServeArgs),
}

/// Arguments for the scan command
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Page to scan
    #[arg(value_name = "PAGE_URL")]
    pub url: String,

    /// Print results as a JSON array
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the fetch command
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Image to download
    #[arg(value_name = "URL")]
    pub url: String,

    /// Output path (defaults to the detected file name)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Arguments for the bundle command
#[derive(Args, Debug, Clone)]
pub struct BundleArgs {
    /// Image URLs, in archive order
    #[arg(value_name = "URLS")]
    pub urls: Vec<String>,

    /// Read additional URLs from a file, one per line ('#' starts a comment)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Archive path (defaults to images-<millis>.zip)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Number of concurrent downloads (overrides config)
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Write the batch report as JSON
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

/// Arguments for the serve command
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to bind (overrides config)
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Port to listen on (overrides config and environment)
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}

impl BundleArgs {
    /// Check argument combinations that clap cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.urls.is_empty() && self.input.is_none() {
            return Err("Provide at least one URL or --input FILE".to_string());
        }

        if let Some(concurrency) = self.concurrency {
            if concurrency == 0 || concurrency > batch::MAX_CONCURRENCY {
                return Err(format!(
                    "Concurrency must be between 1 and {}",
                    batch::MAX_CONCURRENCY
                ));
            }
        }

        Ok(())
    }
}

/// Parse a URL list file: one URL per line, blank lines and `#` comments skipped
pub fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
