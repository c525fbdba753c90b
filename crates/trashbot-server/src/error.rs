//! Error types for the dashboard HTTP layer.
//!
//! [`DashboardError`] converts into the same acknowledgment shape the
//! producers get on success, with `ok` set to `false`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use trashbot_core::IngestError;
use trashbot_core::ingest::IngestAck;

/// Errors that can occur in the dashboard HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    /// A producer's report was refused.
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        match self {
            Self::Ingest(e) => (StatusCode::BAD_REQUEST, Json(IngestAck::rejected(e))).into_response(),
        }
    }
}
