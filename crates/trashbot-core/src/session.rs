//! Per-observer lifecycle.
//!
//! ```text
//! Connecting --register ok--> Active --disconnect / delivery failure--> Closed
//!      \--------------capacity exceeded----------------------------------^
//! ```
//!
//! A session is transport-agnostic: it yields encoded frames through
//! [`ObserverSession::next_frame`] and the transport writes them out. The
//! channel is push-only; whatever the observer sends is the transport's to
//! ignore.

use std::sync::Arc;

use tracing::debug;
use trashbot_types::ObserverId;

use crate::broadcast::{BroadcastHub, Frame, ObserverHandle, ObserverQueue};
use crate::error::HubError;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted by the transport, not yet registered.
    Connecting,
    /// Registered with the hub and receiving frames.
    Active,
    /// Unregistered; no further frames will be yielded.
    Closed,
}

/// One connected observer.
///
/// Dropping an active session unregisters it.
#[derive(Debug)]
pub struct ObserverSession {
    id: ObserverId,
    state: SessionState,
    rx: ObserverQueue,
    hub: Arc<BroadcastHub>,
}

impl ObserverSession {
    /// Open a session: create its queue, holding at most
    /// `max_pending_bytes` of unread frames, then let `register` add it to
    /// `hub` (which queues the `init` frame).
    ///
    /// # Errors
    ///
    /// Whatever `register` returns, typically
    /// [`HubError::CapacityExceeded`]. The session then goes straight to
    /// [`SessionState::Closed`] and is discarded without having sent
    /// anything.
    pub fn open(
        hub: Arc<BroadcastHub>,
        max_pending_bytes: usize,
        register: impl FnOnce(&BroadcastHub, ObserverHandle) -> Result<(), HubError>,
    ) -> Result<Self, HubError> {
        let (handle, rx) = ObserverHandle::channel(max_pending_bytes);
        let mut session = Self {
            id: handle.id(),
            state: SessionState::Connecting,
            rx,
            hub,
        };

        match register(session.hub.as_ref(), handle) {
            Ok(()) => {
                session.state = SessionState::Active;
                debug!(observer = %session.id, "Observer session active");
                Ok(session)
            }
            Err(e) => {
                session.state = SessionState::Closed;
                debug!(observer = %session.id, error = %e, "Observer session refused");
                Err(e)
            }
        }
    }

    /// The observer's identifier.
    pub const fn id(&self) -> ObserverId {
        self.id
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Wait for the next frame to write to the observer.
    ///
    /// Returns `None` once the session is closed, including when the hub
    /// dropped or evicted this observer (frames queued before that are
    /// still yielded first). Cancel-safe.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        if self.state != SessionState::Active {
            return None;
        }
        let frame = self.rx.recv().await;
        if frame.is_none() {
            self.close();
        }
        frame
    }

    /// Close the session and unregister it. Idempotent.
    pub fn close(&mut self) {
        if self.state == SessionState::Active {
            self.hub.unregister(self.id);
            self.rx.close();
            debug!(
                observer = %self.id,
                pending_bytes = self.rx.pending_bytes(),
                "Observer session closed"
            );
        }
        self.state = SessionState::Closed;
    }
}

impl Drop for ObserverSession {
    fn drop(&mut self) {
        self.close();
    }
}
