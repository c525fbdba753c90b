//! TrashBot dashboard hub binary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `trashbot-config.yaml` (or defaults)
//! 2. Initialize structured logging (tracing)
//! 3. Initialize the shared state document and observer registry
//! 4. Serve ingest, snapshot, and `WebSocket` endpoints until `Ctrl-C`

mod error;

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;
use trashbot_core::DashboardConfig;
use trashbot_core::config::{DEFAULT_CONFIG_FILE, LoggingConfig};
use trashbot_server::AppState;

use crate::error::AppError;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the server cannot
/// bind or fails while serving.
#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = DashboardConfig::load_or_default(Path::new(DEFAULT_CONFIG_FILE))?;

    init_logging(&config.logging);
    info!("trashbot-dashboard starting");
    info!(
        host = config.server.host,
        port = config.server.port,
        web_root = ?config.server.web_root,
        observer_capacity = config.observers.capacity,
        observer_max_pending_bytes = config.observers.max_pending_bytes,
        max_vision_body_bytes = config.ingest.max_vision_body_bytes,
        max_arm_body_bytes = config.ingest.max_arm_body_bytes,
        "Configuration loaded"
    );

    let state = Arc::new(AppState::new(&config));
    trashbot_server::start_server(&config.server, state).await?;

    info!("trashbot-dashboard exiting");
    Ok(())
}

/// Install the global tracing subscriber. `RUST_LOG` takes precedence over
/// the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
