// Device settings endpoints
//
// The cloud stores one settings blob per device and an upload replaces it
// entirely. Every write here is read-modify-write of the full blob.

use serde_json::{Value, json};
use tracing::{debug, info};

use super::client::{CloudClient, require_mac};
use super::paths;
use crate::error::Error;
use crate::models::SettingsBlob;
use crate::session::Session;

impl CloudClient {
    /// Download the device's current settings blob.
    pub async fn fetch_settings(&self, mac: &str) -> Result<SettingsBlob, Error> {
        let blob: Option<SettingsBlob> = self.device_call(paths::SETTINGS_DOWNLOAD, mac).await?;
        Ok(blob.unwrap_or_default())
    }

    /// Upload a full settings blob.
    ///
    /// Required fields missing from `blob` are filled with factory values;
    /// `bleMac` and `userId` are always set from the call.
    pub async fn upload_settings(&self, mac: &str, blob: &SettingsBlob) -> Result<(), Error> {
        require_mac(mac)?;

        let mut full = blob.clone();
        full.fill_required();

        let _: Value = self
            .call(paths::SETTINGS_UPLOAD, |s| upload_body(s, mac, &full))
            .await?;

        info!(mac, "settings uploaded");
        Ok(())
    }

    /// Change one settings field, preserving every other field.
    ///
    /// Returns `false` without uploading when the field already holds
    /// `value`. Refuses to write when the current blob comes back empty.
    pub async fn update_config_parameter(
        &self,
        mac: &str,
        field: &str,
        value: Value,
    ) -> Result<bool, Error> {
        let mut blob = self.fetch_settings(mac).await?;
        if blob.is_empty() {
            return Err(Error::SettingsUnavailable { mac: mac.to_owned() });
        }
        if !blob.set(field, value) {
            debug!(mac, field, "parameter unchanged, skipping upload");
            return Ok(false);
        }
        self.upload_settings(mac, &blob).await?;
        Ok(true)
    }
}

fn upload_body(session: &Session, mac: &str, blob: &SettingsBlob) -> Value {
    let mut fields = blob.fields().clone();
    fields.insert("bleMac".into(), json!(mac));
    fields.insert("userId".into(), json!(session.user_id()));
    Value::Object(fields)
}
