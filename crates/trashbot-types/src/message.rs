//! Frames pushed to observers over the `WebSocket` channel.
//!
//! Every frame is one complete JSON text message, internally tagged on
//! `type`:
//!
//! | `type` | When | Fields |
//! |--------|------|--------|
//! | `init` | once, right after connecting | `ts_ms`, `state` |
//! | `vision_update` | after every detection report | `ts_ms`, `state`, `payload` |
//! | `arm_update` | after every arm status report | `ts_ms`, `state`, `payload` |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::state::StateDocument;

/// Which producer triggered an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// The vision subsystem reported a detection.
    Vision,
    /// The robotic arm reported its status.
    Arm,
}

impl UpdateKind {
    /// Wire name of the update frame for this kind.
    pub const fn event_type(self) -> &'static str {
        match self {
            Self::Vision => "vision_update",
            Self::Arm => "arm_update",
        }
    }
}

/// A single frame on the observer channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObserverMessage {
    /// Initial snapshot sent to a newly registered observer.
    Init {
        /// Time the frame was built, in ms since the Unix epoch.
        #[ts(type = "number")]
        ts_ms: i64,
        /// Snapshot taken at registration.
        state: StateDocument,
    },
    /// A detection report was applied.
    VisionUpdate {
        /// Time the frame was built, in ms since the Unix epoch.
        #[ts(type = "number")]
        ts_ms: i64,
        /// Snapshot taken right after the mutation.
        state: StateDocument,
        /// The detection payload that was applied.
        payload: Value,
    },
    /// An arm status report was applied.
    ArmUpdate {
        /// Time the frame was built, in ms since the Unix epoch.
        #[ts(type = "number")]
        ts_ms: i64,
        /// Snapshot taken right after the mutation.
        state: StateDocument,
        /// The status payload that was applied.
        payload: Value,
    },
}

impl ObserverMessage {
    /// Build the `init` frame for a new observer.
    pub const fn init(ts_ms: i64, state: StateDocument) -> Self {
        Self::Init { ts_ms, state }
    }

    /// Build the update frame for `kind`, embedding that subsystem's
    /// latest payload (JSON `null` if it has none).
    pub fn update(kind: UpdateKind, ts_ms: i64, state: StateDocument) -> Self {
        match kind {
            UpdateKind::Vision => {
                let payload = state.vision.latest.clone().unwrap_or(Value::Null);
                Self::VisionUpdate {
                    ts_ms,
                    state,
                    payload,
                }
            }
            UpdateKind::Arm => {
                let payload = state.arm.latest.clone().unwrap_or(Value::Null);
                Self::ArmUpdate {
                    ts_ms,
                    state,
                    payload,
                }
            }
        }
    }

    /// Wire name of this frame's `type` field.
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::VisionUpdate { .. } => UpdateKind::Vision.event_type(),
            Self::ArmUpdate { .. } => UpdateKind::Arm.event_type(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn init_frame_has_no_payload() {
        let msg = ObserverMessage::init(7, StateDocument::new(5));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "init");
        assert_eq!(json["ts_ms"], 7);
        assert_eq!(json["state"]["last_update_ms"], 5);
        assert!(json.get("payload").is_none());
    }

    #[test]
    fn vision_update_embeds_latest_detection() {
        let mut state = StateDocument::new(10);
        state.vision.latest = Some(json!({ "label": "can", "recyclable": true }));
        let msg = ObserverMessage::update(UpdateKind::Vision, 11, state);
        assert_eq!(msg.event_type(), "vision_update");

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "vision_update");
        assert_eq!(json["payload"]["label"], "can");
        assert_eq!(json["state"]["vision"]["latest"]["recyclable"], true);
    }

    #[test]
    fn arm_update_without_payload_sends_null() {
        let msg = ObserverMessage::update(UpdateKind::Arm, 1, StateDocument::new(1));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "arm_update");
        assert!(json["payload"].is_null());
    }

    #[test]
    fn frames_parse_back() {
        let text = r#"{"type":"init","ts_ms":3,"state":{"last_update_ms":3,
            "vision":{"online":false,"last_seen_ms":null,"latest":null},
            "arm":{"online":false,"last_seen_ms":null,"status":"unknown","latest":null},
            "counts":{"total":0,"recyclable":0,"trash":0,"errors":0}}}"#;
        let msg: ObserverMessage = serde_json::from_str(text).unwrap();
        assert_eq!(msg.event_type(), "init");
        assert!(matches!(
            msg,
            ObserverMessage::Init { ref state, .. } if state.arm.status == "unknown"
        ));
    }
}
