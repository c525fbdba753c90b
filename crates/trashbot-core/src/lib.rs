//! Shared-state and broadcast core of the TrashBot dashboard hub.
//!
//! Producers (the vision subsystem and the robotic arm) submit reports that
//! are folded into one [`StateDocument`]; every change is fanned out to the
//! connected observers.
//!
//! # Modules
//!
//! - [`store`] -- [`StateStore`], the single authoritative document
//! - [`broadcast`] -- [`BroadcastHub`], the capacity-bounded observer registry
//! - [`ingest`] -- request body validation and decoding
//! - [`session`] -- per-observer lifecycle (`Connecting -> Active -> Closed`)
//! - [`dashboard`] -- [`Dashboard`], wiring store and hub with ordered publish
//! - [`config`] -- YAML configuration with environment overrides
//! - [`clock`] -- wall-clock milliseconds
//! - [`error`] -- error taxonomy
//!
//! [`StateDocument`]: trashbot_types::StateDocument

pub mod broadcast;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod ingest;
pub mod session;
pub mod store;

pub use broadcast::{BroadcastHub, Frame, ObserverHandle, ObserverQueue, PublishReport};
pub use config::DashboardConfig;
pub use dashboard::Dashboard;
pub use error::{HubError, IngestError};
pub use session::{ObserverSession, SessionState};
pub use store::StateStore;
