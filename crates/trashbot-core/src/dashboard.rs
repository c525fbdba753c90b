//! The state store and broadcast hub wired together.
//!
//! [`Dashboard`] is what the transport layer talks to. It is the only
//! place that touches both locks, and always in the same order: the store
//! lock first, then (briefly) the hub's registry lock. Publishing and
//! registration both happen inside the store's critical section, which
//! gives two guarantees:
//!
//! - update frames reach every observer in the order the mutations were
//!   applied;
//! - an observer's `init` snapshot is taken atomically with its
//!   registration, so it sees every later update and none it already has.
//!
//! Neither step performs I/O; delivery into observer queues never blocks.

use std::sync::Arc;

use serde_json::Value;
use trashbot_types::{ObserverMessage, StateDocument, UpdateKind};

use crate::broadcast::{BroadcastHub, PublishReport};
use crate::clock;
use crate::config::{DashboardConfig, IngestConfig};
use crate::error::{HubError, IngestError};
use crate::ingest;
use crate::session::ObserverSession;
use crate::store::StateStore;

/// Shared-state and broadcast core.
#[derive(Debug)]
pub struct Dashboard {
    store: StateStore,
    hub: Arc<BroadcastHub>,
    max_pending_bytes: usize,
    limits: IngestConfig,
}

impl Dashboard {
    /// Build a dashboard with a freshly initialized document and an empty
    /// observer registry sized from `config`.
    pub fn new(config: &DashboardConfig) -> Self {
        let store = StateStore::new();
        store.initialize();
        Self {
            store,
            hub: Arc::new(BroadcastHub::new(config.observers.capacity)),
            max_pending_bytes: config.observers.max_pending_bytes,
            limits: config.ingest,
        }
    }

    /// The underlying observer registry.
    pub const fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Current state, bypassing the hub.
    pub fn snapshot(&self) -> StateDocument {
        self.store.snapshot()
    }

    /// Validate, decode, and apply a detection report body.
    ///
    /// # Errors
    ///
    /// See [`ingest::decode_report`]. On error nothing is mutated or
    /// published.
    pub fn submit_vision_report(&self, body: &[u8]) -> Result<PublishReport, IngestError> {
        let payload = ingest::decode_report(body, self.limits.max_vision_body_bytes)?;
        Ok(self.apply_vision_report(payload))
    }

    /// Validate, decode, and apply an arm status report body.
    ///
    /// # Errors
    ///
    /// See [`ingest::decode_report`]. On error nothing is mutated or
    /// published.
    pub fn submit_arm_report(&self, body: &[u8]) -> Result<PublishReport, IngestError> {
        let payload = ingest::decode_report(body, self.limits.max_arm_body_bytes)?;
        Ok(self.apply_arm_report(payload))
    }

    /// Apply a decoded detection report and publish `vision_update`.
    pub fn apply_vision_report(&self, payload: Value) -> PublishReport {
        self.store.apply_vision_report_and(payload, |doc| {
            self.publish_update(UpdateKind::Vision, doc)
        })
    }

    /// Apply a decoded arm status report and publish `arm_update`.
    pub fn apply_arm_report(&self, payload: Value) -> PublishReport {
        self.store
            .apply_arm_report_and(payload, |doc| self.publish_update(UpdateKind::Arm, doc))
    }

    /// Register a new observer and queue its `init` frame.
    ///
    /// # Errors
    ///
    /// [`HubError::CapacityExceeded`] when the registry is full.
    pub fn connect_observer(&self) -> Result<ObserverSession, HubError> {
        ObserverSession::open(Arc::clone(&self.hub), self.max_pending_bytes, |hub, handle| {
            self.store.snapshot_and(|doc| {
                hub.register(
                    handle,
                    &ObserverMessage::init(clock::now_millis(), doc.clone()),
                )
            })
        })
    }

    /// Runs inside the store's critical section.
    fn publish_update(&self, kind: UpdateKind, doc: &StateDocument) -> PublishReport {
        // Registration also holds the store lock, so the hub cannot gain an
        // observer between this check and the publish.
        if self.hub.is_empty() {
            return PublishReport::default();
        }
        let message = ObserverMessage::update(kind, clock::now_millis(), doc.clone());
        let report = self.hub.publish(&message);
        tracing::debug!(
            event = message.event_type(),
            delivered = report.delivered,
            dropped = report.dropped,
            evicted = report.evicted,
            "Published update"
        );
        report
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(&DashboardConfig::default())
    }
}
