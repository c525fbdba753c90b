//! HTTP + `WebSocket` surface of the TrashBot dashboard hub.
//!
//! This crate provides an Axum server that exposes:
//!
//! - **Ingest endpoints** (`POST /vision/detection`, `POST /arm/status`)
//!   for the vision subsystem and the robotic arm
//! - **Snapshot endpoint** (`GET /state`) returning the current state
//!   document
//! - **`WebSocket` endpoint** (`/ws`) pushing an `init` frame and then one
//!   frame per applied report
//! - **Dashboard** (`GET /`) served from the configured web root, or a
//!   minimal HTML status page when none is configured
//!
//! # Architecture
//!
//! All state lives in a [`Dashboard`](trashbot_core::Dashboard) from
//! `trashbot-core`. Handlers here only translate between HTTP and that
//! core: request bodies in, acknowledgments and frames out.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
