//! HTTP API server
//!
//! Exposes page scanning, single downloads and streamed ZIP archives over
//! HTTP for browser front ends.
//!
//! # Routes
//!
//! - `GET /`, `GET /health` - Health check
//! - `POST /api/fetch-images` - List image URLs found on a page
//! - `POST /api/download-all` - Stream a ZIP of the given URLs
//! - `GET /api/download-all?urls=[...]` - Same, for plain links
//! - `GET /api/download?url=` - Download one image

use std::sync::Arc;

use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::ImageHarvester;
use crate::config::ServerConfig;
use crate::errors::ServerError;

pub mod error_response;
pub mod routes;
pub mod state;

pub use error_response::ApiError;
pub use state::AppState;

/// Create the API router with all route definitions
pub fn create_router(harvester: Arc<ImageHarvester>, config: &ServerConfig) -> Router {
    let state = AppState::new(harvester);

    Router::new()
        .route("/", get(routes::health_check))
        .route("/health", get(routes::health_check))
        .route("/api/fetch-images", post(routes::fetch_images))
        .route(
            "/api/download-all",
            post(routes::download_all).get(routes::download_all_query),
        )
        .route("/api/download", get(routes::download_single))
        .with_state(state)
        .layer(build_cors_layer(config))
        .layer(TraceLayer::new_for_http())
}

/// Build the CORS layer: any origin in development, an allow-list in production
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new().expose_headers([CONTENT_DISPOSITION]);

    if !config.production {
        return layer
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    layer
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
}

/// Resolves when the process receives Ctrl+C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, stopping server");
}

/// Bind the configured address and serve until Ctrl+C
pub async fn start_server(
    harvester: Arc<ImageHarvester>,
    config: &ServerConfig,
) -> Result<(), ServerError> {
    let addr = config.socket_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

    info!(
        "API server listening on {} ({} CORS)",
        addr,
        if config.production { "restricted" } else { "permissive" }
    );

    axum::serve(listener, create_router(harvester, config))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    info!("API server stopped");
    Ok(())
}

#[cfg(test)]
mod tests;
