// ── Published snapshots ──
//
// `DeviceSnapshot` is the merged view of one device after a cycle;
// `FleetSnapshot` is what the store publishes. Both are replaced wholesale
// every cycle and never mutated after publication.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use bigblue_api::{DeviceInfo, FirmwareInfo, FirmwareStatus, RawRecord, SettingsBlob};

use super::mac::MacAddress;
use super::telemetry::Telemetry;

// ── DataSource ───────────────────────────────────────────────────────

/// Which transport produced a device's telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DataSource {
    Local,
    Cloud,
}

// ── FieldValue ───────────────────────────────────────────────────────

/// One value read through [`DeviceSnapshot::field`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Integer(i64),
    Bool(bool),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert a settings blob value.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Number)),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => {
                // Trim float noise such as 12.345000000000001.
                let rounded = format!("{n:.3}");
                f.write_str(rounded.trim_end_matches('0').trim_end_matches('.'))
            }
            Self::Integer(i) => write!(f, "{i}"),
            Self::Bool(b) => f.write_str(if *b { "on" } else { "off" }),
            Self::Text(s) => f.write_str(s),
            Self::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S UTC")),
        }
    }
}

// ── Derived ──────────────────────────────────────────────────────────

/// Values computed from settings, firmware, and telemetry together.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Derived {
    pub current_mode: i64,
    /// %
    pub discharge_threshold: f64,
    /// %
    pub charge_threshold: f64,
    /// %
    pub output_power: Option<f64>,
    pub bms_enabled: Option<bool>,
    pub grid_enabled: Option<bool>,
    pub price_per_kwh: f64,
    pub daily_cost_saved: f64,
    pub total_cost_saved: f64,
    pub firmware_update_available: bool,
    pub firmware_updating: bool,
    pub firmware_version: Option<String>,
}

// ── DeviceSnapshot ───────────────────────────────────────────────────

/// Every normalized field name [`DeviceSnapshot::field`] answers to.
pub const FIELD_NAMES: &[&str] = &[
    "soc",
    "soh",
    "voltage",
    "current",
    "power",
    "remaining_capacity",
    "rated_capacity",
    "battery_count",
    "status",
    "pv1_voltage",
    "pv1_current",
    "pv1_power",
    "pv2_voltage",
    "pv2_current",
    "pv2_power",
    "pv_total_power",
    "daily_generation",
    "total_generation",
    "daily_output_energy",
    "total_output_energy",
    "max_temperature",
    "min_temperature",
    "daily_co2_savings",
    "daily_runtime",
    "total_runtime",
    "current_mode",
    "discharge_threshold",
    "charge_threshold",
    "output_power",
    "bms_enabled",
    "grid_enabled",
    "price_per_kwh",
    "daily_cost_saved",
    "total_cost_saved",
    "firmware_update_available",
    "firmware_updating",
    "firmware_version",
    "last_update",
    "device_mac",
    "device_name",
    "data_source",
];

/// Merged state of one device after a successful cycle.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    pub mac: MacAddress,
    pub name: String,
    pub source: DataSource,
    pub telemetry: Telemetry,
    pub derived: Derived,
    pub settings: SettingsBlob,
    pub firmware: FirmwareInfo,
    pub firmware_status: FirmwareStatus,
    pub info: DeviceInfo,
    /// The record exactly as the device reported it.
    pub raw: RawRecord,
    pub fetched_at: DateTime<Utc>,
}

impl DeviceSnapshot {
    /// Look a value up by its normalized name.
    ///
    /// Unknown names, and optional values the device never reported,
    /// return `None`.
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        use FieldValue::{Bool, Integer, Number, Text, Timestamp};

        let t = &self.telemetry;
        let d = &self.derived;
        let value = match name {
            "soc" => Number(t.soc),
            "soh" => Number(t.soh),
            "voltage" => Number(t.voltage),
            "current" => Number(t.current),
            "power" => Number(t.power),
            "remaining_capacity" => Number(t.remaining_capacity),
            "rated_capacity" => Number(t.rated_capacity),
            "battery_count" => Integer(t.battery_count),
            "status" => Integer(t.status),
            "pv1_voltage" => Number(t.pv1_voltage),
            "pv1_current" => Number(t.pv1_current),
            "pv1_power" => Number(t.pv1_power),
            "pv2_voltage" => Number(t.pv2_voltage),
            "pv2_current" => Number(t.pv2_current),
            "pv2_power" => Number(t.pv2_power),
            "pv_total_power" => Number(t.pv_total_power),
            "daily_generation" => Number(t.daily_generation),
            "total_generation" => Number(t.total_generation),
            "daily_output_energy" => Number(t.daily_output_energy),
            "total_output_energy" => Number(t.total_output_energy),
            "max_temperature" => Number(t.max_temperature),
            "min_temperature" => Number(t.min_temperature),
            "daily_co2_savings" => Number(t.daily_co2_savings),
            "daily_runtime" => Number(t.daily_runtime),
            "total_runtime" => Number(t.total_runtime),
            "current_mode" => Integer(d.current_mode),
            "discharge_threshold" => Number(d.discharge_threshold),
            "charge_threshold" => Number(d.charge_threshold),
            "output_power" => Number(d.output_power?),
            "bms_enabled" => Bool(d.bms_enabled?),
            "grid_enabled" => Bool(d.grid_enabled?),
            "price_per_kwh" => Number(d.price_per_kwh),
            "daily_cost_saved" => Number(d.daily_cost_saved),
            "total_cost_saved" => Number(d.total_cost_saved),
            "firmware_update_available" => Bool(d.firmware_update_available),
            "firmware_updating" => Bool(d.firmware_updating),
            "firmware_version" => Text(d.firmware_version.clone()?),
            "last_update" => Timestamp(self.fetched_at),
            "device_mac" => Text(self.mac.to_string()),
            "device_name" => Text(self.name.clone()),
            "data_source" => Text(self.source.to_string()),
            _ => return None,
        };
        Some(value)
    }

    /// A settings blob field, converted for display.
    pub fn setting(&self, key: &str) -> Option<FieldValue> {
        self.settings.get(key).and_then(FieldValue::from_json)
    }
}

// ── Fleet ────────────────────────────────────────────────────────────

/// Why a known device produced no data this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Unavailability {
    Offline,
    NotFound,
    Failed { message: String },
}

impl fmt::Display for Unavailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offline => f.write_str("offline"),
            Self::NotFound => f.write_str("no data"),
            Self::Failed { message } => write!(f, "failed: {message}"),
        }
    }
}

/// Everything one cycle produced.
///
/// `devices` only ever holds devices whose telemetry fetch succeeded in the
/// cycle that built it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FleetSnapshot {
    pub devices: IndexMap<MacAddress, Arc<DeviceSnapshot>>,
    pub unavailable: IndexMap<MacAddress, Unavailability>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl FleetSnapshot {
    pub fn device(&self, mac: &MacAddress) -> Option<&Arc<DeviceSnapshot>> {
        self.devices.get(mac)
    }

    /// Find a device by user-supplied MAC text.
    pub fn find(&self, input: &str) -> Option<&Arc<DeviceSnapshot>> {
        self.devices
            .iter()
            .find(|(mac, _)| mac.matches(input))
            .map(|(_, snapshot)| snapshot)
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }
}
