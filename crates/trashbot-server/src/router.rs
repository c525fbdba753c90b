//! Axum router construction for the dashboard server.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS enabled for producers and dashboards on other origins.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the dashboard server.
///
/// The router includes:
/// - `GET /state` -- current state document
/// - `POST /vision/detection` -- detection report ingest
/// - `POST /arm/status` -- arm status ingest
/// - `GET /ws` -- `WebSocket` observer stream
/// - `GET /` -- files under the web root if configured, otherwise a
///   minimal HTML status page
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        // REST API
        .route("/state", get(handlers::get_state))
        .route("/vision/detection", post(handlers::submit_vision_report))
        .route("/arm/status", post(handlers::submit_arm_report))
        // WebSocket
        .route("/ws", get(ws::ws_observe));

    let router = match &state.web_root {
        Some(root) => router.fallback_service(ServeDir::new(root)),
        None => router.route("/", get(handlers::index)),
    };

    router
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
