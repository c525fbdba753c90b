//! Error taxonomy for the dashboard core.
//!
//! None of these are fatal. Ingest errors are answered at the request
//! boundary before any state is touched; hub errors are confined to the
//! single observer they concern.

/// Reasons an ingest request body is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    /// The body was missing, empty, or larger than the endpoint allows.
    #[error("bad body")]
    BadRequestBody,

    /// The body is not valid JSON.
    #[error("invalid json")]
    InvalidPayloadEncoding,
}

impl IngestError {
    /// Short message returned to the producer in the `error` field.
    pub const fn message(self) -> &'static str {
        match self {
            Self::BadRequestBody => "bad body",
            Self::InvalidPayloadEncoding => "invalid json",
        }
    }
}

/// Failures concerning the observer registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// The registry already holds its maximum number of observers.
    #[error("observer capacity exceeded ({capacity} connected)")]
    CapacityExceeded {
        /// The configured maximum.
        capacity: usize,
    },

    /// A frame could not be handed to an observer.
    #[error("delivery to observer failed: {reason}")]
    DeliveryFailure {
        /// Why the frame was not accepted.
        reason: &'static str,
    },

    /// A message could not be encoded as JSON.
    #[error("failed to encode observer message: {message}")]
    Encode {
        /// The serializer's description of the failure.
        message: String,
    },
}
