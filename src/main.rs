//! Image Harvester CLI application
//!
//! Command-line interface for scanning pages, downloading images and
//! bundling many images into a streamed ZIP archive.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

// Import CLI modules through the library (module is public but not re-exported)
use image_harvester::cli::{handle_bundle, handle_fetch, handle_scan, handle_serve, Cli, Commands};
use image_harvester::config::AppConfig;
use image_harvester::constants::logging;
use image_harvester::errors::Result;

#[tokio::main]
async fn main() {
    // Initialize program
    let result = run().await;

    // Handle any errors that occurred
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    // Parse command line arguments
    let cli = Cli::parse_args();

    let config = AppConfig::load(cli.global.config.clone()).await?;

    // Initialize logging based on verbosity
    init_logging(&cli, &config);

    info!("Image Harvester v{} starting", env!("CARGO_PKG_VERSION"));

    let quiet = cli.global.quiet;
    match cli.command {
        Commands::Scan(args) => {
            info!("Executing scan command");
            handle_scan(args, &config).await
        }
        Commands::Fetch(args) => {
            info!("Executing fetch command");
            handle_fetch(args, &config, quiet).await
        }
        Commands::Bundle(args) => {
            info!("Executing bundle command");
            handle_bundle(args, &config, quiet).await
        }
        Commands::Serve(args) => {
            info!("Executing serve command");
            handle_serve(args, config).await
        }
    }
}

/// Initialize logging based on CLI verbosity settings
///
/// Without any verbosity flag the configured level applies.
fn init_logging(cli: &Cli, config: &AppConfig) {
    let global = &cli.global;
    let level = if global.quiet || global.verbose || global.very_verbose {
        cli.log_level().to_string().to_lowercase()
    } else {
        config.logging.level.to_lowercase()
    };

    // Create environment filter
    let mut filter = EnvFilter::from_default_env();
    match format!("{}={}", logging::CRATE_TARGET, level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring invalid log level '{}': {}", level, e),
    }

    // Initialize subscriber
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(config.logging.colored_output)
        .with_level(global.very_verbose) // Show levels only in very verbose mode
        .init();

    if global.very_verbose {
        info!("Very verbose logging enabled");
    } else if global.verbose {
        info!("Verbose logging enabled");
    }
}
