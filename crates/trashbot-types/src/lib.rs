//! Shared type definitions for the TrashBot dashboard hub.
//!
//! This crate is the single source of truth for the state document and the
//! messages pushed to observers. Types defined here flow downstream to
//! `TypeScript` via `ts-rs` for the browser dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for connected observers
//! - [`state`] -- The shared state document and its sections
//! - [`message`] -- Frames pushed over the observer channel

pub mod ids;
pub mod message;
pub mod state;

// Re-export all public types at crate root for convenience.
pub use ids::ObserverId;
pub use message::{ObserverMessage, UpdateKind};
pub use state::{
    ArmState, Counts, ERROR_ARM_STATUS, StateDocument, UNKNOWN_ARM_STATUS, VisionState,
};
