//! Command handlers for Image Harvester CLI
//!
//! This module implements the command handlers that connect CLI arguments
//! to the pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::io::BufWriter;
use tracing::{info, warn};

use crate::app::events::{EventRecorder, FanoutRecorder, TracingRecorder};
use crate::app::pipeline::{parse_locator, suggested_archive_name};
use crate::app::{BatchReport, ImageHarvester};
use crate::cli::args::parse_url_list;
use crate::cli::{BundleArgs, FetchArgs, ProgressConfig, ProgressRecorder, ScanArgs, ServeArgs};
use crate::config::AppConfig;
use crate::errors::{AppError, BatchError, Result};
use crate::server;

/// Handle the scan command
pub async fn handle_scan(args: ScanArgs, config: &AppConfig) -> Result<()> {
    let page = parse_locator(0, &args.url)?;
    let harvester = ImageHarvester::from_config(config)?;

    let images = harvester.scan(&page).await?;
    info!("Found {} image(s) on {}", images.len(), page);

    if args.json {
        let urls: Vec<&str> = images.iter().map(|url| url.as_str()).collect();
        let json = serde_json::to_string_pretty(&urls)
            .map_err(|e| AppError::generic(format!("Failed to encode results: {}", e)))?;
        println!("{}", json);
    } else {
        for image in &images {
            println!("{}", image);
        }
    }

    Ok(())
}

/// Handle the fetch command
pub async fn handle_fetch(args: FetchArgs, config: &AppConfig, quiet: bool) -> Result<()> {
    let harvester = ImageHarvester::from_config(config)?;
    let download = harvester.download_one(&args.url).await?;

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(&download.file_name));
    tokio::fs::write(&output, &download.payload).await?;

    if !quiet {
        println!(
            "Saved {} ({}, {} bytes)",
            output.display(),
            download.content_type(),
            download.payload.len()
        );
    }
    Ok(())
}

/// Collect URLs from the command line and the optional input file
async fn collect_urls(args: &BundleArgs) -> Result<Vec<String>> {
    let mut urls = args.urls.clone();
    if let Some(input) = &args.input {
        let content = tokio::fs::read_to_string(input).await.map_err(|e| {
            AppError::generic(format!("Failed to read {}: {}", input.display(), e))
        })?;
        urls.extend(parse_url_list(&content));
    }
    Ok(urls)
}

/// Write the batch report as pretty JSON
async fn write_report(path: &Path, report: &BatchReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| AppError::generic(format!("Failed to encode report: {}", e)))?;
    tokio::fs::write(path, json).await?;
    info!("Report written to {}", path.display());
    Ok(())
}

fn print_summary(report: &BatchReport, output: &Path, elapsed: std::time::Duration) {
    println!();
    println!("Archive: {}", output.display());
    println!(
        "{} in {:.1}s",
        report.summary(),
        elapsed.as_secs_f64()
    );
    for failure in report.failures() {
        println!(
            "  #{} {} ({} attempt(s)): {}",
            failure.ordinal + 1,
            failure.locator,
            failure.attempts,
            failure.reason
        );
    }
}

/// Handle the bundle command
///
/// Streams the archive to disk while downloads run. Exits with an error when
/// nothing could be retrieved, leaving the (empty) archive in place.
pub async fn handle_bundle(args: BundleArgs, config: &AppConfig, quiet: bool) -> Result<()> {
    let start_time = Instant::now();
    args.validate().map_err(AppError::generic)?;

    let urls = collect_urls(&args).await?;
    let progress = Arc::new(ProgressRecorder::new(
        urls.len(),
        &ProgressConfig {
            enable_progress_bars: !quiet,
            ..Default::default()
        },
    ));
    let recorders: Vec<Arc<dyn EventRecorder>> = vec![Arc::new(TracingRecorder), progress.clone()];
    let recorder: Arc<dyn EventRecorder> = Arc::new(FanoutRecorder::new(recorders));
    let harvester = ImageHarvester::from_config_with_recorder(config, recorder)?;

    // Reject bad input before creating the output file
    harvester.validate_locators(&urls)?;
    let concurrency = args.concurrency.unwrap_or(harvester.config().concurrency);

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(suggested_archive_name()));
    let file = tokio::fs::File::create(&output).await?;
    info!(
        "Bundling {} URL(s) into {} with concurrency {}",
        urls.len(),
        output.display(),
        concurrency
    );

    let result = harvester
        .archive_with_concurrency(&urls, concurrency, BufWriter::new(file))
        .await;

    let report = match result {
        Ok(report) => {
            progress.finish("Done".to_string());
            report
        }
        Err(BatchError::NothingRetrieved { requested, report }) => {
            progress.abandon();
            if let Some(path) = &args.report {
                write_report(path, &report).await?;
            }
            if !quiet {
                print_summary(&report, &output, start_time.elapsed());
            }
            return Err(BatchError::NothingRetrieved { requested, report }.into());
        }
        Err(e) => {
            progress.abandon();
            if let Err(remove_error) = tokio::fs::remove_file(&output).await {
                warn!(
                    "Failed to remove incomplete archive {}: {}",
                    output.display(),
                    remove_error
                );
            }
            return Err(e.into());
        }
    };

    if let Some(path) = &args.report {
        write_report(path, &report).await?;
    }
    if !quiet {
        print_summary(&report, &output, start_time.elapsed());
    }
    Ok(())
}

/// Handle the serve command
pub async fn handle_serve(args: ServeArgs, mut config: AppConfig) -> Result<()> {
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.server.validate()?;

    let harvester = Arc::new(ImageHarvester::from_config(&config)?);
    server::start_server(harvester, &config.server).await?;
    Ok(())
}
