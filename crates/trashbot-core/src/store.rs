//! The single authoritative state document.
//!
//! [`StateStore`] owns one [`StateDocument`] behind a mutex. Every read and
//! write goes through it, and callers only ever receive owned clones, so a
//! snapshot can never observe a half-applied report.
//!
//! Reports are taken as already-decoded JSON values. Decoding failures are
//! the caller's problem; once a payload reaches the store, applying it
//! cannot fail.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use trashbot_types::{ERROR_ARM_STATUS, StateDocument};

use crate::clock;

/// Shared, mutex-guarded state document.
#[derive(Debug)]
pub struct StateStore {
    doc: Mutex<StateDocument>,
}

impl StateStore {
    /// Create a store holding a freshly initialized document.
    pub fn new() -> Self {
        Self {
            doc: Mutex::new(StateDocument::new(clock::now_millis())),
        }
    }

    /// Reset the document to its defaults: both subsystems offline, arm
    /// status `"unknown"`, all counters zero.
    pub fn initialize(&self) {
        *self.lock() = StateDocument::new(clock::now_millis());
    }

    /// Apply a detection report and return the post-mutation snapshot.
    pub fn apply_vision_report(&self, payload: Value) -> StateDocument {
        self.apply_vision_report_and(payload, Clone::clone)
    }

    /// Apply a detection report, then run `after` on the updated document
    /// before the lock is released.
    ///
    /// `after` must not block: it runs inside the critical section.
    pub fn apply_vision_report_and<R>(
        &self,
        payload: Value,
        after: impl FnOnce(&StateDocument) -> R,
    ) -> R {
        let mut doc = self.lock();
        let now = touch(&mut doc);

        let recyclable = is_recyclable(&payload);
        doc.vision.online = true;
        doc.vision.last_seen_ms = Some(now);
        doc.vision.latest = Some(payload);

        let counts = &mut doc.counts;
        counts.total = counts.total.saturating_add(1);
        if recyclable {
            counts.recyclable = counts.recyclable.saturating_add(1);
        } else {
            counts.trash = counts.trash.saturating_add(1);
        }

        after(&doc)
    }

    /// Apply an arm status report and return the post-mutation snapshot.
    pub fn apply_arm_report(&self, payload: Value) -> StateDocument {
        self.apply_arm_report_and(payload, Clone::clone)
    }

    /// Apply an arm status report, then run `after` on the updated document
    /// before the lock is released.
    ///
    /// `after` must not block: it runs inside the critical section.
    pub fn apply_arm_report_and<R>(
        &self,
        payload: Value,
        after: impl FnOnce(&StateDocument) -> R,
    ) -> R {
        let mut doc = self.lock();
        let now = touch(&mut doc);

        doc.arm.online = true;
        doc.arm.last_seen_ms = Some(now);

        // Only a status carried by this report counts as an error report.
        let reported = reported_status(&payload);
        let is_error = reported.as_deref() == Some(ERROR_ARM_STATUS);
        if let Some(status) = reported {
            doc.arm.status = status;
        }
        doc.arm.latest = Some(payload);

        if is_error {
            doc.counts.errors = doc.counts.errors.saturating_add(1);
        }

        after(&doc)
    }

    /// An independent copy of the current document.
    pub fn snapshot(&self) -> StateDocument {
        self.lock().clone()
    }

    /// Run `f` on the current document while holding the lock.
    ///
    /// `f` must not block.
    pub fn snapshot_and<R>(&self, f: impl FnOnce(&StateDocument) -> R) -> R {
        f(&self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, StateDocument> {
        // Mutations never panic mid-update, so a poisoned guard still holds
        // a consistent document.
        self.doc.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Stamp the document with the current time and return it.
///
/// `last_update_ms` never moves backwards, even if the wall clock does.
fn touch(doc: &mut StateDocument) -> i64 {
    let now = clock::now_millis().max(doc.last_update_ms);
    doc.last_update_ms = now;
    now
}

/// Only a literal `true` under `recyclable` counts; anything else is trash.
fn is_recyclable(payload: &Value) -> bool {
    payload.get("recyclable").and_then(Value::as_bool) == Some(true)
}

fn reported_status(payload: &Value) -> Option<String> {
    payload
        .get("status")
        .and_then(Value::as_str)
        .map(str::to_owned)
}
