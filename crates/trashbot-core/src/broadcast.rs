//! Capacity-bounded observer registry and change-event fan-out.
//!
//! Each registered observer owns an outbound queue of encoded frames.
//! Publishing encodes a message once and hands the same [`Frame`] to every
//! queue without blocking; the actual socket write happens on the
//! observer's own task.
//!
//! Queues are bounded by bytes in flight rather than by frame count, so a
//! burst of reports is absorbed by any observer that keeps reading. Two
//! things end an observer's registration during a publish:
//!
//! - its queue is closed (the observer went away): a delivery failure;
//! - more than its high-water mark of bytes is still unread (the socket is
//!   stalled): the observer is evicted.
//!
//! Either way the others are unaffected. The registry lock is only held to
//! insert, remove, or copy the list of targets, never across a delivery.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use trashbot_types::{ObserverId, ObserverMessage};

use crate::error::HubError;

/// One encoded observer message (UTF-8 JSON), shared by every recipient.
///
/// Cloning only bumps a reference count.
pub type Frame = Bytes;

/// Why a frame could not be queued for an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Undelivered {
    /// The receiving side is gone.
    Closed,
    /// Too many bytes are still waiting to be written.
    Stalled,
}

impl Undelivered {
    const fn reason(self) -> &'static str {
        match self {
            Self::Closed => "observer gone",
            Self::Stalled => "observer stalled",
        }
    }
}

/// The hub's side of one observer queue.
#[derive(Debug, Clone)]
struct Outbox {
    tx: mpsc::UnboundedSender<Frame>,
    pending: Arc<AtomicUsize>,
    max_pending_bytes: usize,
}

impl Outbox {
    /// Queue `frame`. A frame is always accepted into an empty queue, so a
    /// single frame larger than the high-water mark still goes through.
    fn push(&self, frame: Frame) -> Result<(), Undelivered> {
        if self.tx.is_closed() {
            return Err(Undelivered::Closed);
        }
        let len = frame.len();
        let queued = self.pending.load(Ordering::Acquire);
        if queued > 0 && queued.saturating_add(len) > self.max_pending_bytes {
            return Err(Undelivered::Stalled);
        }
        // Count before sending so the reader never subtracts more than
        // was added.
        self.pending.fetch_add(len, Ordering::AcqRel);
        if self.tx.send(frame).is_err() {
            self.pending.fetch_sub(len, Ordering::AcqRel);
            return Err(Undelivered::Closed);
        }
        Ok(())
    }
}

/// The sending half of an observer's outbound queue, as held by the hub.
#[derive(Debug)]
pub struct ObserverHandle {
    id: ObserverId,
    outbox: Outbox,
}

impl ObserverHandle {
    /// Create a handle with a fresh id and a queue that may hold up to
    /// `max_pending_bytes` of unread frames. Returns the receiving half for
    /// the observer's session.
    pub fn channel(max_pending_bytes: usize) -> (Self, ObserverQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        (
            Self {
                id: ObserverId::new(),
                outbox: Outbox {
                    tx,
                    pending: Arc::clone(&pending),
                    max_pending_bytes,
                },
            },
            ObserverQueue { rx, pending },
        )
    }

    /// The observer's identifier.
    pub const fn id(&self) -> ObserverId {
        self.id
    }
}

/// The receiving half of an observer's outbound queue.
#[derive(Debug)]
pub struct ObserverQueue {
    rx: mpsc::UnboundedReceiver<Frame>,
    pending: Arc<AtomicUsize>,
}

impl ObserverQueue {
    /// Wait for the next frame. `None` once the hub has let go of this
    /// observer and every queued frame was taken. Cancel-safe.
    pub async fn recv(&mut self) -> Option<Frame> {
        let frame = self.rx.recv().await?;
        self.pending.fetch_sub(frame.len(), Ordering::AcqRel);
        Some(frame)
    }

    /// Refuse further frames; already queued ones can still be taken.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Bytes queued but not yet taken.
    pub fn pending_bytes(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

/// Outcome of a single [`BroadcastHub::publish`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Observers the frame was queued for.
    pub delivered: usize,
    /// Observers dropped because their queue was closed.
    pub dropped: usize,
    /// Observers evicted because their queue passed the high-water mark.
    pub evicted: usize,
}

/// The set of connected observers.
#[derive(Debug)]
pub struct BroadcastHub {
    observers: Mutex<HashMap<ObserverId, Outbox>>,
    capacity: usize,
}

impl BroadcastHub {
    /// Create an empty hub admitting at most `capacity` observers.
    pub fn new(capacity: usize) -> Self {
        Self {
            observers: Mutex::new(HashMap::with_capacity(capacity)),
            capacity,
        }
    }

    /// Add an observer and queue `init` as its first frame.
    ///
    /// # Errors
    ///
    /// [`HubError::CapacityExceeded`] if the registry is full; the registry
    /// is left unchanged and nothing is sent. [`HubError::DeliveryFailure`]
    /// if the observer's queue is already closed.
    pub fn register(&self, handle: ObserverHandle, init: &ObserverMessage) -> Result<(), HubError> {
        let frame = encode(init)?;
        let mut observers = self.lock();

        if observers.len() >= self.capacity {
            warn!(
                observer = %handle.id,
                capacity = self.capacity,
                "Observer rejected, registry full"
            );
            return Err(HubError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        handle
            .outbox
            .push(frame)
            .map_err(|e| HubError::DeliveryFailure { reason: e.reason() })?;
        observers.insert(handle.id, handle.outbox);

        debug!(observer = %handle.id, connected = observers.len(), "Observer registered");
        Ok(())
    }

    /// Remove an observer. Returns whether it was registered; removing an
    /// unknown observer is a no-op.
    ///
    /// Dropping the hub's sender ends the observer's session once its
    /// queued frames are drained.
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut observers = self.lock();
        let removed = observers.remove(&id).is_some();
        if removed {
            debug!(observer = %id, connected = observers.len(), "Observer unregistered");
        }
        removed
    }

    /// Queue `message` for every registered observer.
    ///
    /// The message is encoded once. With no observers registered this
    /// returns immediately without encoding anything.
    pub fn publish(&self, message: &ObserverMessage) -> PublishReport {
        let targets: Vec<(ObserverId, Outbox)> = {
            let observers = self.lock();
            if observers.is_empty() {
                return PublishReport::default();
            }
            observers
                .iter()
                .map(|(id, outbox)| (*id, outbox.clone()))
                .collect()
        };

        let frame = match encode(message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(event = message.event_type(), error = %e, "Dropping unencodable event");
                return PublishReport::default();
            }
        };

        let mut report = PublishReport::default();
        let mut failed = Vec::new();
        for (id, outbox) in targets {
            match outbox.push(frame.clone()) {
                Ok(()) => report.delivered = report.delivered.saturating_add(1),
                Err(Undelivered::Closed) => {
                    debug!(observer = %id, reason = Undelivered::Closed.reason(), "Delivery failed");
                    report.dropped = report.dropped.saturating_add(1);
                    failed.push(id);
                }
                Err(Undelivered::Stalled) => {
                    warn!(
                        observer = %id,
                        pending_bytes = outbox.pending.load(Ordering::Acquire),
                        max_pending_bytes = outbox.max_pending_bytes,
                        "Evicting stalled observer"
                    );
                    report.evicted = report.evicted.saturating_add(1);
                    failed.push(id);
                }
            }
        }

        for id in failed {
            self.unregister(id);
        }
        report
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no observers are registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether `id` is currently registered.
    pub fn contains(&self, id: ObserverId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Maximum number of observers.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ObserverId, Outbox>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn encode(message: &ObserverMessage) -> Result<Frame, HubError> {
    serde_json::to_vec(message)
        .map(Frame::from)
        .map_err(|e| HubError::Encode {
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use trashbot_types::{StateDocument, UpdateKind};

    use super::*;

    const ROOMY: usize = 1_048_576;

    fn init() -> ObserverMessage {
        ObserverMessage::init(1, StateDocument::new(1))
    }

    fn update(total: u64) -> ObserverMessage {
        let mut state = StateDocument::new(2);
        state.counts.total = total;
        state.counts.trash = total;
        state.vision.latest = Some(json!({ "n": total }));
        ObserverMessage::update(UpdateKind::Vision, 2, state)
    }

    fn parse(frame: &Frame) -> serde_json::Value {
        serde_json::from_slice(frame).unwrap()
    }

    #[tokio::test]
    async fn register_queues_init_first() {
        let hub = BroadcastHub::new(4);
        let (handle, mut rx) = ObserverHandle::channel(ROOMY);
        let id = handle.id();

        hub.register(handle, &init()).unwrap();
        hub.publish(&update(1));

        assert!(hub.contains(id));
        assert_eq!(parse(&rx.recv().await.unwrap())["type"], "init");
        assert_eq!(parse(&rx.recv().await.unwrap())["type"], "vision_update");
        assert_eq!(rx.pending_bytes(), 0);
    }

    #[tokio::test]
    async fn register_beyond_capacity_is_rejected() {
        let hub = BroadcastHub::new(2);
        let mut receivers = Vec::new();
        for _ in 0..2 {
            let (handle, rx) = ObserverHandle::channel(ROOMY);
            hub.register(handle, &init()).unwrap();
            receivers.push(rx);
        }

        let (handle, mut rejected_rx) = ObserverHandle::channel(ROOMY);
        let result = hub.register(handle, &init());

        assert_eq!(result, Err(HubError::CapacityExceeded { capacity: 2 }));
        assert_eq!(hub.len(), 2);
        // The rejected handle was dropped without anything being queued.
        assert_eq!(rejected_rx.pending_bytes(), 0);
        assert!(rejected_rx.recv().await.is_none());
    }

    #[test]
    fn register_with_closed_queue_is_a_delivery_failure() {
        let hub = BroadcastHub::new(2);
        let (handle, mut rx) = ObserverHandle::channel(ROOMY);
        rx.close();

        let result = hub.register(handle, &init());

        assert_eq!(
            result,
            Err(HubError::DeliveryFailure {
                reason: "observer gone"
            })
        );
        assert!(hub.is_empty());
    }

    #[test]
    fn unregister_is_idempotent() {
        let hub = BroadcastHub::new(2);
        let (handle, _rx) = ObserverHandle::channel(ROOMY);
        let id = handle.id();
        hub.register(handle, &init()).unwrap();

        assert!(hub.unregister(id));
        assert!(!hub.unregister(id));
        assert!(!hub.unregister(ObserverId::new()));
        assert!(hub.is_empty());
    }

    #[test]
    fn publish_with_no_observers_is_a_no_op() {
        let hub = BroadcastHub::new(2);
        assert_eq!(hub.publish(&update(1)), PublishReport::default());
    }

    #[tokio::test]
    async fn every_observer_gets_identical_bytes() {
        let hub = BroadcastHub::new(4);
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (handle, mut rx) = ObserverHandle::channel(ROOMY);
            hub.register(handle, &init()).unwrap();
            rx.recv().await.unwrap();
            receivers.push(rx);
        }

        let report = hub.publish(&update(7));
        assert_eq!(report.delivered, 3);
        assert_eq!(report.dropped, 0);

        let mut frames = Vec::new();
        for rx in &mut receivers {
            frames.push(rx.recv().await.unwrap());
        }
        let first = frames.first().unwrap();
        // Same buffer, not just equal contents.
        assert!(frames.iter().all(|frame| frame.as_ptr() == first.as_ptr()));
        assert_eq!(parse(first)["payload"]["n"], 7);
    }

    #[tokio::test]
    async fn closed_observer_is_dropped_without_affecting_others() {
        let hub = BroadcastHub::new(4);
        let (gone, gone_rx) = ObserverHandle::channel(ROOMY);
        let gone_id = gone.id();
        let (alive, mut alive_rx) = ObserverHandle::channel(ROOMY);
        hub.register(gone, &init()).unwrap();
        hub.register(alive, &init()).unwrap();
        drop(gone_rx);

        let report = hub.publish(&update(1));

        assert_eq!(
            report,
            PublishReport {
                delivered: 1,
                dropped: 1,
                evicted: 0
            }
        );
        assert!(!hub.contains(gone_id));
        assert_eq!(hub.len(), 1);
        assert_eq!(parse(&alive_rx.recv().await.unwrap())["type"], "init");
        assert_eq!(parse(&alive_rx.recv().await.unwrap())["type"], "vision_update");
    }

    #[test]
    fn burst_of_unread_frames_is_kept() {
        let hub = BroadcastHub::new(1);
        let (handle, rx) = ObserverHandle::channel(ROOMY);
        let id = handle.id();
        hub.register(handle, &init()).unwrap();

        for n in 1..=500 {
            let report = hub.publish(&update(n));
            assert_eq!(report.delivered, 1);
        }

        assert!(hub.contains(id));
        assert!(rx.pending_bytes() > 0);
    }

    #[tokio::test]
    async fn stalled_observer_is_evicted() {
        let hub = BroadcastHub::new(4);
        let init_len = encode(&init()).unwrap().len();
        // Room for init and one update, not two.
        let budget = init_len.saturating_mul(2).saturating_add(64);
        let (slow, mut slow_rx) = ObserverHandle::channel(budget);
        let slow_id = slow.id();
        let (fast, mut fast_rx) = ObserverHandle::channel(ROOMY);
        hub.register(slow, &init()).unwrap();
        hub.register(fast, &init()).unwrap();

        assert_eq!(hub.publish(&update(1)).delivered, 2);
        let report = hub.publish(&update(2));
        assert_eq!(report.evicted, 1);
        assert_eq!(report.delivered, 1);
        assert!(!hub.contains(slow_id));
        assert_eq!(hub.len(), 1);

        // Frames queued before the eviction are still drained, then the queue ends.
        assert_eq!(parse(&slow_rx.recv().await.unwrap())["type"], "init");
        assert_eq!(parse(&slow_rx.recv().await.unwrap())["payload"]["n"], 1);
        assert!(slow_rx.recv().await.is_none());

        fast_rx.recv().await.unwrap();
        assert_eq!(parse(&fast_rx.recv().await.unwrap())["payload"]["n"], 1);
        assert_eq!(parse(&fast_rx.recv().await.unwrap())["payload"]["n"], 2);
    }

    #[tokio::test]
    async fn oversized_frame_into_empty_queue_is_accepted() {
        let hub = BroadcastHub::new(1);
        let (handle, mut rx) = ObserverHandle::channel(1);
        hub.register(handle, &init()).unwrap();
        rx.recv().await.unwrap();

        assert_eq!(hub.publish(&update(1)).delivered, 1);
        assert_eq!(parse(&rx.recv().await.unwrap())["payload"]["n"], 1);
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let hub = BroadcastHub::new(1);
        let (handle, mut rx) = ObserverHandle::channel(ROOMY);
        hub.register(handle, &init()).unwrap();
        rx.recv().await.unwrap();

        for n in 1..=20 {
            hub.publish(&update(n));
        }
        for n in 1..=20_u64 {
            assert_eq!(parse(&rx.recv().await.unwrap())["state"]["counts"]["total"], n);
        }
    }
}
