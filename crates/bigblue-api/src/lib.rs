// bigblue-api: Async Rust client for the Powafree cloud API (Big Blue batteries)
//
// Two transports are exposed: `CloudClient` talks to the vendor cloud and
// owns the login session; `LocalClient` is a best-effort direct path to a
// device that advertises a LAN address.

pub mod cloud;
pub mod error;
pub mod local;
pub mod models;
pub mod session;
pub mod transport;

pub use cloud::CloudClient;
pub use error::Error;
pub use local::LocalClient;
pub use models::{DeviceDescriptor, DeviceInfo, FirmwareInfo, FirmwareStatus, RawRecord, SettingsBlob};
pub use session::{Session, UserId};
pub use transport::TransportConfig;
