//! REST endpoint handlers for the dashboard server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page (when no web root is configured) |
//! | `GET` | `/state` | Current state document |
//! | `POST` | `/vision/detection` | Detection report from the vision subsystem |
//! | `POST` | `/arm/status` | Status report from the robotic arm |

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::response::{Html, IntoResponse};
use tracing::debug;
use trashbot_core::IngestError;
use trashbot_core::ingest::IngestAck;

use crate::error::DashboardError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing the current counters and links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.dashboard.snapshot();
    let counts = snapshot.counts;
    let vision = if snapshot.vision.online {
        "online"
    } else {
        "offline"
    };
    let arm = snapshot.arm.status;
    let observers = state.dashboard.hub().len();
    let capacity = state.dashboard.hub().capacity();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>TrashBot Dashboard</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
    </style>
</head>
<body>
    <h1>TrashBot Dashboard</h1>

    <div>
        <div class="metric"><div class="label">Total</div><div class="value">{total}</div></div>
        <div class="metric"><div class="label">Recyclable</div><div class="value">{recyclable}</div></div>
        <div class="metric"><div class="label">Trash</div><div class="value">{trash}</div></div>
        <div class="metric"><div class="label">Errors</div><div class="value">{errors}</div></div>
        <div class="metric"><div class="label">Vision</div><div class="value">{vision}</div></div>
        <div class="metric"><div class="label">Arm</div><div class="value">{arm}</div></div>
        <div class="metric"><div class="label">Observers</div><div class="value">{observers}/{capacity}</div></div>
    </div>

    <h2>API</h2>
    <ul>
        <li>GET <a href="/state">/state</a> -- Current state document</li>
        <li>POST /vision/detection -- Detection report</li>
        <li>POST /arm/status -- Arm status report</li>
        <li><code>ws://host:port/ws</code> -- Live update stream</li>
    </ul>
</body>
</html>"#,
        total = counts.total,
        recyclable = counts.recyclable,
        trash = counts.trash,
        errors = counts.errors,
        arm = escape_html(&arm),
    ))
}

// ---------------------------------------------------------------------------
// GET /state -- current snapshot
// ---------------------------------------------------------------------------

/// Return the full current state document.
pub async fn get_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.dashboard.snapshot())
}

// ---------------------------------------------------------------------------
// POST /vision/detection, POST /arm/status -- ingest
// ---------------------------------------------------------------------------

/// Apply a detection report and broadcast `vision_update`.
///
/// Responds `{"ok":true}` once the report is applied, whatever happened to
/// individual observers.
pub async fn submit_vision_report(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<IngestAck>, DashboardError> {
    let body = read_body(body)?;
    let report = state.dashboard.submit_vision_report(&body)?;
    debug!(
        delivered = report.delivered,
        dropped = report.dropped,
        evicted = report.evicted,
        "Detection report applied"
    );
    Ok(Json(IngestAck::accepted()))
}

/// Apply an arm status report and broadcast `arm_update`.
pub async fn submit_arm_report(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<IngestAck>, DashboardError> {
    let body = read_body(body)?;
    let report = state.dashboard.submit_arm_report(&body)?;
    debug!(
        delivered = report.delivered,
        dropped = report.dropped,
        evicted = report.evicted,
        "Arm status report applied"
    );
    Ok(Json(IngestAck::accepted()))
}

/// A body that could not be read (too large, connection error) is a bad
/// body, same as an empty one.
fn read_body(body: Result<Bytes, BytesRejection>) -> Result<Bytes, DashboardError> {
    body.map_err(|rejection| {
        debug!(%rejection, "Unreadable request body");
        DashboardError::Ingest(IngestError::BadRequestBody)
    })
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
