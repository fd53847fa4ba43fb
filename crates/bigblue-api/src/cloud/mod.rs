// Powafree cloud client
//
// `client` holds transport mechanics and the session; the remaining
// modules add endpoint methods to `CloudClient` as inherent impls.

mod auth;
mod client;
mod devices;
mod firmware;
mod settings;

pub use client::CloudClient;

/// Endpoint paths, relative to the base URL.
pub mod paths {
    pub const LOGIN: &str = "api/user/login/email";
    pub const DEVICE_LIST: &str = "api/devices/list";
    pub const LAST_DATA: &str = "api/devices/last_data";
    pub const DEVICE_INFO: &str = "api/devices/info";
    pub const SETTINGS_DOWNLOAD: &str = "api/devices/setting/download";
    pub const SETTINGS_UPLOAD: &str = "api/devices/setting/upload";
    pub const OTA_INFO: &str = "api/devices/ota/info";
    pub const OTA_STATUS: &str = "api/devices/ota/status";
}
