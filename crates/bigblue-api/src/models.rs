// Cloud API response types
//
// Every cloud endpoint wraps its payload in the `ApiResponse` envelope.
// Fields use `#[serde(default)]` liberally because the vendor API is
// inconsistent about field presence across firmware versions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// A raw JSON object as returned by telemetry endpoints.
pub type RawRecord = Map<String, Value>;

// ── Response Envelope ────────────────────────────────────────────────

/// Standard Powafree response envelope.
///
/// ```json
/// { "code": 0, "message": "success", "data": { ... } }
/// ```
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    pub code: i64,
    #[serde(default, alias = "msg")]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

// ── Login ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user_id: Option<crate::session::UserId>,
    #[serde(default, alias = "nickName")]
    pub name: Option<String>,
}

// ── Device ───────────────────────────────────────────────────────────

/// One entry of `/api/devices/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub ble_mac: String,
    #[serde(default, alias = "deviceName")]
    pub name: Option<String>,
    #[serde(default, alias = "ip", alias = "lanIp")]
    pub local_ip: Option<String>,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceDescriptor {
    /// Display name, falling back to `"Big Blue {mac}"`.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => format!("Big Blue {}", self.ble_mac),
        }
    }

    /// Non-empty LAN address, if the cloud advertised one.
    pub fn local_address(&self) -> Option<&str> {
        self.local_ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
    }
}

/// Metadata from `/api/devices/info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(default, alias = "deviceModel")]
    pub model: Option<String>,
    #[serde(default, alias = "sn")]
    pub serial_number: Option<String>,
    #[serde(default, alias = "hardVersion")]
    pub hardware_version: Option<String>,
    #[serde(default, alias = "softVersion")]
    pub firmware_version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Firmware ─────────────────────────────────────────────────────────

/// Firmware versions from `/api/devices/ota/info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareInfo {
    #[serde(default, alias = "version")]
    pub current_version: Option<String>,
    #[serde(default, alias = "newVersion")]
    pub latest_version: Option<String>,
    #[serde(default, alias = "needUpdate", alias = "hasUpdate")]
    pub update_available: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FirmwareInfo {
    /// An explicit flag wins; otherwise compare the advertised versions.
    pub fn is_update_available(&self) -> bool {
        if let Some(flag) = self.update_available {
            return flag;
        }
        match (&self.current_version, &self.latest_version) {
            (Some(current), Some(latest)) => !latest.is_empty() && current != latest,
            _ => false,
        }
    }
}

/// Upgrade progress from `/api/devices/ota/status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareStatus {
    /// 0=idle, 1=upgrading, 2=succeeded, 3=failed
    #[serde(default, alias = "otaStatus")]
    pub status: Option<i64>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FirmwareStatus {
    pub const UPGRADING: i64 = 1;

    pub fn is_updating(&self) -> bool {
        self.status == Some(Self::UPGRADING)
    }
}

// ── Settings ─────────────────────────────────────────────────────────

/// The full remote device configuration.
///
/// Opaque on purpose: the server resets any field missing from an upload,
/// so the blob is carried verbatim and only the known fields get typed
/// accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsBlob(Map<String, Value>);

impl SettingsBlob {
    pub const MODE: &'static str = "mode";
    pub const BMS_POWER: &'static str = "bmsPower";
    pub const DISCHARGE_SOC: &'static str = "soc";
    pub const CHARGE_SOC: &'static str = "maxSoc";
    pub const PRICE_PER_KWH: &'static str = "pricePerKwh";
    pub const BMS_ENABLE: &'static str = "bmsEnable";
    pub const GRID_ENABLE: &'static str = "gridEnable";

    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Set one field, returning whether the blob changed.
    pub fn set(&mut self, field: &str, value: Value) -> bool {
        if self.0.get(field) == Some(&value) {
            return false;
        }
        self.0.insert(field.to_owned(), value);
        true
    }

    /// Numeric field as `f64`. Numeric strings are accepted.
    pub fn number(&self, field: &str) -> Option<f64> {
        match self.0.get(field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Integer field. Floats are truncated toward zero.
    pub fn integer(&self, field: &str) -> Option<i64> {
        match self.0.get(field)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(truncate)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean field. The cloud mixes `true`/`false` and `1`/`0`.
    pub fn flag(&self, field: &str) -> Option<bool> {
        match self.0.get(field)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n
                .as_i64()
                .map(|v| v != 0)
                .or_else(|| n.as_f64().map(|v| v.abs() > f64::EPSILON)),
            _ => None,
        }
    }

    pub fn mode(&self) -> Option<i64> {
        self.integer(Self::MODE)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    /// Fill in every required field the blob lacks with its factory value.
    /// Present fields are never touched.
    pub fn fill_required(&mut self) {
        if let Value::Object(defaults) = required_defaults() {
            for (key, value) in defaults {
                self.0.entry(key).or_insert(value);
            }
        }
    }
}

impl From<Map<String, Value>> for SettingsBlob {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn truncate(v: f64) -> i64 {
    v.trunc() as i64
}

/// Factory values for the fields an upload must always carry.
fn required_defaults() -> Value {
    json!({
        "bmsEnable": true,
        "bmsPower": 12,
        "ctAPower": 0,
        "ctBPower": 0,
        "ctCPower": 0,
        "ctEnable": 0,
        "ctTotalPower": 0,
        "currencyCode": "EUR",
        "deviceControl": 0,
        "gridCode": 0,
        "gridControl": 0,
        "gridEnable": 0,
        "gridTime": 0,
        "mode": 1,
        "otaStatus": 1,
        "peakShavingDetails": ["|00:00-23:59|4000|"],
        "periodDetail": [
            ["|00:00-08:00|1500|", "|08:00-18:00|0|", "|18:00-22:00|3000|", "|22:00-23:59|1000|"],
            ["|00:00-08:00|1000|", "|08:00-18:00|0|", "|18:00-22:00|2000|", "|22:00-23:59|1500|"],
            ["|00:00-08:00|1500|", "|08:00-18:00|0|", "|18:00-22:00|2000|", "|22:00-23:59|1500|"],
            ["|00:00-08:00|1500|", "|08:00-18:00|0|", "|18:00-22:00|2000|", "|22:00-23:59|1500|"],
            ["|00:00-08:00|1500|", "|08:00-18:00|0|", "|18:00-22:00|2000|", "|22:00-23:59|3000|"],
            ["|00:00-08:00|1500|", "|08:00-18:00|0|", "|18:00-22:00|2000|", "|22:00-23:59|1500|"],
            ["|00:00-08:00|1500|", "|08:00-18:00|0|", "|18:00-22:00|2000|", "|22:00-23:59|1500|"]
        ],
        "periods": 0,
        "pfSwitch": 0,
        "pfValue": 0,
        "pricePerKwh": 0.3,
        "soc": 10,
        "timezone": 2.0
    })
}
