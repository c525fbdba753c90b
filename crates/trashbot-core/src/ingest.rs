//! Ingest request validation and acknowledgments.
//!
//! Producers post raw JSON bodies. A body is refused before anything else
//! happens if it is empty or larger than the endpoint's limit
//! ([`IngestError::BadRequestBody`]), or if it does not decode as JSON
//! ([`IngestError::InvalidPayloadEncoding`]). Refused bodies never reach
//! the [`StateStore`](crate::StateStore) and trigger no broadcast.

use serde::Serialize;
use serde_json::Value;

use crate::error::IngestError;

/// Acknowledgment returned to a producer.
///
/// Serializes as `{"ok":true}` or `{"ok":false,"error":"..."}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestAck {
    /// Whether the report was applied.
    pub ok: bool,
    /// Reason for refusal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl IngestAck {
    /// The report was applied.
    pub const fn accepted() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    /// The report was refused for `err`.
    pub const fn rejected(err: IngestError) -> Self {
        Self {
            ok: false,
            error: Some(err.message()),
        }
    }
}

/// Validate and decode a report body.
///
/// Any well-formed JSON value is accepted; fields the store looks for are
/// simply absent from non-object payloads.
///
/// # Errors
///
/// [`IngestError::BadRequestBody`] for an empty body or one longer than
/// `max_bytes`; [`IngestError::InvalidPayloadEncoding`] if it is not JSON.
pub fn decode_report(body: &[u8], max_bytes: usize) -> Result<Value, IngestError> {
    if body.is_empty() || body.len() > max_bytes {
        return Err(IngestError::BadRequestBody);
    }
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Rejecting undecodable report");
        IngestError::InvalidPayloadEncoding
    })
}
