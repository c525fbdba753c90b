//! The shared state document folded together from producer reports.
//!
//! A [`StateDocument`] is what `GET /state` returns and what every observer
//! frame embeds under `state`. Field names on the wire match what the
//! browser dashboard reads (`last_update_ms`, `last_seen_ms`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Arm status reported before the arm has said anything.
pub const UNKNOWN_ARM_STATUS: &str = "unknown";

/// Arm status value that counts as an error report.
pub const ERROR_ARM_STATUS: &str = "error";

/// The complete dashboard state at one instant.
///
/// Owned values only: cloning a document yields an independent deep copy,
/// so a snapshot handed to an observer is never affected by later
/// mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StateDocument {
    /// Milliseconds since the Unix epoch of the most recent mutation.
    #[ts(type = "number")]
    pub last_update_ms: i64,
    /// Vision subsystem section.
    pub vision: VisionState,
    /// Robotic arm subsystem section.
    pub arm: ArmState,
    /// Running totals since process start.
    pub counts: Counts,
}

impl StateDocument {
    /// A fresh document stamped with `now_ms`: both subsystems offline,
    /// arm status `"unknown"`, all counters zero.
    pub fn new(now_ms: i64) -> Self {
        Self {
            last_update_ms: now_ms,
            vision: VisionState::default(),
            arm: ArmState::default(),
            counts: Counts::default(),
        }
    }
}

/// Vision subsystem section of the state document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VisionState {
    /// Set on the first detection report; never cleared.
    pub online: bool,
    /// Time of the most recent detection report.
    #[ts(type = "number | null")]
    pub last_seen_ms: Option<i64>,
    /// Most recent detection payload, verbatim.
    pub latest: Option<Value>,
}

/// Robotic arm section of the state document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ArmState {
    /// Set on the first status report; never cleared.
    pub online: bool,
    /// Time of the most recent status report.
    #[ts(type = "number | null")]
    pub last_seen_ms: Option<i64>,
    /// Free-form status string from the last report that carried one.
    pub status: String,
    /// Most recent status payload, verbatim.
    pub latest: Option<Value>,
}

impl Default for ArmState {
    fn default() -> Self {
        Self {
            online: false,
            last_seen_ms: None,
            status: String::from(UNKNOWN_ARM_STATUS),
            latest: None,
        }
    }
}

/// Monotonic counters.
///
/// `total == recyclable + trash` always holds; `errors` tracks arm reports
/// and is independent of the other three.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Counts {
    /// Number of accepted detection reports.
    #[ts(type = "number")]
    pub total: u64,
    /// Detections flagged recyclable.
    #[ts(type = "number")]
    pub recyclable: u64,
    /// Detections not flagged recyclable.
    #[ts(type = "number")]
    pub trash: u64,
    /// Arm reports whose status was `"error"`.
    #[ts(type = "number")]
    pub errors: u64,
}

impl Counts {
    /// Whether the detection totals add up.
    pub const fn is_consistent(&self) -> bool {
        match self.recyclable.checked_add(self.trash) {
            Some(sum) => sum == self.total,
            None => false,
        }
    }
}
