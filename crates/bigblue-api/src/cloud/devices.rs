// Device endpoints
//
// Discovery, latest telemetry, and device metadata.

use serde_json::json;
use tracing::warn;

use super::client::CloudClient;
use super::paths;
use crate::error::Error;
use crate::models::{DeviceDescriptor, DeviceInfo, RawRecord};

impl CloudClient {
    /// List every device registered to the account.
    ///
    /// Entries without a device identifier are dropped.
    pub async fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, Error> {
        let devices: Option<Vec<DeviceDescriptor>> = self
            .call(paths::DEVICE_LIST, |s| json!({ "userId": s.user_id() }))
            .await?;

        Ok(devices
            .unwrap_or_default()
            .into_iter()
            .filter(|d| {
                let keep = !d.ble_mac.trim().is_empty();
                if !keep {
                    warn!(?d, "skipping device entry without bleMac");
                }
                keep
            })
            .collect())
    }

    /// Latest raw telemetry record for one device. An empty map means the
    /// cloud has nothing for it.
    pub async fn fetch_telemetry(&self, mac: &str) -> Result<RawRecord, Error> {
        let record: Option<RawRecord> = self.device_call(paths::LAST_DATA, mac).await?;
        Ok(record.unwrap_or_default())
    }

    /// Device metadata (model, serial, versions).
    pub async fn fetch_device_info(&self, mac: &str) -> Result<DeviceInfo, Error> {
        let info: Option<DeviceInfo> = self.device_call(paths::DEVICE_INFO, mac).await?;
        Ok(info.unwrap_or_default())
    }
}
