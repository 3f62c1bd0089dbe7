//! Shared state for the HTTP API

use std::sync::Arc;

use crate::app::ImageHarvester;

/// State cloned into every handler
#[derive(Clone, Debug)]
pub struct AppState {
    pub harvester: Arc<ImageHarvester>,
}

impl AppState {
    pub fn new(harvester: Arc<ImageHarvester>) -> Self {
        Self { harvester }
    }
}
