//! Shared application state for the dashboard server.

use std::path::PathBuf;

use trashbot_core::{Dashboard, DashboardConfig};

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor.
#[derive(Debug)]
pub struct AppState {
    /// The state store and observer hub.
    pub dashboard: Dashboard,
    /// Directory served at `/`, if any.
    pub web_root: Option<PathBuf>,
    /// Request bodies above this size are refused before being buffered.
    pub max_body_bytes: usize,
}

impl AppState {
    /// Build application state from configuration.
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            dashboard: Dashboard::new(config),
            web_root: config.server.web_root.clone(),
            max_body_bytes: config.ingest.max_body_bytes(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(&DashboardConfig::default())
    }
}
