//! Polling coordinator between `bigblue-api` and its consumers (CLI, entities).
//!
//! - **[`Coordinator`]**: one per account. [`start()`](Coordinator::start)
//!   runs the first refresh, then spawns the periodic refresh task and the
//!   command processor. [`Coordinator::oneshot()`] covers single CLI
//!   invocations.
//!
//! - **[`DataStore`]**: holds the published [`FleetSnapshot`] behind an
//!   `ArcSwap`, so readers never block and never see a half-built cycle.
//!
//! - **[`Command`]**: settings writes, serialized through a channel so
//!   read-modify-write sequences never interleave.
//!
//! - **[`catalog`]**: the data-driven entity table and its generic reader.

pub mod catalog;
pub mod command;
pub mod config;
pub mod convert;
pub mod coordinator;
pub mod error;
pub mod model;
mod refresh;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use catalog::{ENTITY_CATALOG, Entity, EntityDescriptor, EntityKind};
pub use command::{Command, CommandResult};
pub use config::{CoordinatorConfig, LocalCapability, TransportMode};
pub use coordinator::{Coordinator, CoordinatorState};
pub use error::CoreError;
pub use model::{
    DataSource, DeviceSnapshot, FieldValue, FleetSnapshot, MacAddress, Mode, Telemetry,
    Unavailability,
};
pub use store::{DataStore, UpdateStatus};

pub use bigblue_api::{DeviceDescriptor, SettingsBlob};
