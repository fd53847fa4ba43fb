// ── Domain model ──
//
// Typed records the coordinator publishes. Everything here is immutable
// once built; a new cycle produces new values.

pub mod mac;
pub mod mode;
pub mod snapshot;
pub mod telemetry;

pub use mac::MacAddress;
pub use mode::Mode;
pub use snapshot::{
    DataSource, Derived, DeviceSnapshot, FIELD_NAMES, FieldValue, FleetSnapshot, Unavailability,
};
pub use telemetry::Telemetry;
