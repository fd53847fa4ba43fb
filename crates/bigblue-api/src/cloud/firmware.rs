use super::client::CloudClient;
use super::paths;
use crate::error::Error;
use crate::models::{FirmwareInfo, FirmwareStatus};

impl CloudClient {
    /// Installed and available firmware versions.
    pub async fn fetch_firmware_info(&self, mac: &str) -> Result<FirmwareInfo, Error> {
        let info: Option<FirmwareInfo> = self.device_call(paths::OTA_INFO, mac).await?;
        Ok(info.unwrap_or_default())
    }

    /// Progress of a running firmware upgrade.
    pub async fn fetch_firmware_status(&self, mac: &str) -> Result<FirmwareStatus, Error> {
        let status: Option<FirmwareStatus> = self.device_call(paths::OTA_STATUS, mac).await?;
        Ok(status.unwrap_or_default())
    }
}
