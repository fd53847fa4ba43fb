// ── API-to-domain conversions ──
//
// Turns raw cloud records into the typed snapshot. The scale factors are
// the wire contract: the device reports tenths, milli-units, and seconds,
// and every consumer sees the converted values only.

use chrono::{DateTime, Utc};
use serde_json::Value;

use bigblue_api::{
    DeviceDescriptor, DeviceInfo, FirmwareInfo, FirmwareStatus, RawRecord, SettingsBlob,
};

use crate::model::{DataSource, Derived, DeviceSnapshot, MacAddress, Mode, Telemetry};

/// Discharge floor reported when the blob has no `soc`.
pub const DEFAULT_DISCHARGE_THRESHOLD: f64 = 10.0;
/// Charge ceiling reported when the blob has no `maxSoc`.
pub const DEFAULT_CHARGE_THRESHOLD: f64 = 90.0;
/// Electricity price reported when the blob has no `pricePerKwh`.
pub const DEFAULT_PRICE_PER_KWH: f64 = 0.3;

// ── Helpers ────────────────────────────────────────────────────────

/// Raw numeric field; absent or non-numeric values read as zero.
fn raw_number(raw: &RawRecord, key: &str) -> f64 {
    match raw.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    }
}

fn raw_integer(raw: &RawRecord, key: &str) -> i64 {
    match raw.get(key) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}

fn scaled(raw: &RawRecord, key: &str, divisor: f64) -> f64 {
    raw_number(raw, key) / divisor
}

// ── Telemetry ──────────────────────────────────────────────────────

/// Scale a raw `last_data` record.
pub fn telemetry(raw: &RawRecord) -> Telemetry {
    Telemetry {
        soc: scaled(raw, "totalSoc", 10.0),
        soh: scaled(raw, "totalSoh", 10.0),
        voltage: scaled(raw, "totalVoltage", 10.0),
        current: raw_number(raw, "totalCurrent"),
        power: scaled(raw, "totalPower", 10.0),
        remaining_capacity: scaled(raw, "totalRemainingCapacity", 1000.0),
        rated_capacity: scaled(raw, "TotalRatedCapacity", 1000.0),
        battery_count: raw_integer(raw, "batteryCount"),
        status: raw_integer(raw, "status"),

        pv1_voltage: scaled(raw, "pv1V", 10.0),
        pv1_current: raw_number(raw, "pv1A"),
        pv1_power: scaled(raw, "pv1W", 10.0),
        pv2_voltage: scaled(raw, "pv2V", 10.0),
        pv2_current: raw_number(raw, "pv2A"),
        pv2_power: scaled(raw, "pv2W", 10.0),
        pv_total_power: scaled(raw, "pvTotalPower", 10.0),

        daily_generation: scaled(raw, "dailyGeneration", 1000.0),
        total_generation: scaled(raw, "totalGeneration", 1000.0),
        daily_output_energy: scaled(raw, "dailyOutputEnergy", 1000.0),
        total_output_energy: scaled(raw, "totalOutputEnergy", 1000.0),

        max_temperature: scaled(raw, "maxTemperature", 10.0),
        min_temperature: scaled(raw, "minTemperature", 10.0),
        daily_co2_savings: raw_number(raw, "dailyCo2Savings"),
        daily_runtime: scaled(raw, "dailyRuntime", 3600.0),
        total_runtime: raw_number(raw, "totalRuntime"),
    }
}

// ── Derived fields ─────────────────────────────────────────────────

/// Compute the fields that combine telemetry, settings, and firmware.
pub fn derive(
    telemetry: &Telemetry,
    settings: &SettingsBlob,
    firmware: &FirmwareInfo,
    firmware_status: &FirmwareStatus,
    info: &DeviceInfo,
) -> Derived {
    let price_per_kwh = settings
        .number(SettingsBlob::PRICE_PER_KWH)
        .unwrap_or(DEFAULT_PRICE_PER_KWH);

    Derived {
        current_mode: settings.mode().unwrap_or(Mode::DEFAULT_CODE),
        discharge_threshold: settings
            .number(SettingsBlob::DISCHARGE_SOC)
            .unwrap_or(DEFAULT_DISCHARGE_THRESHOLD),
        charge_threshold: settings
            .number(SettingsBlob::CHARGE_SOC)
            .unwrap_or(DEFAULT_CHARGE_THRESHOLD),
        output_power: settings.number(SettingsBlob::BMS_POWER),
        bms_enabled: settings.flag(SettingsBlob::BMS_ENABLE),
        grid_enabled: settings.flag(SettingsBlob::GRID_ENABLE),
        price_per_kwh,
        daily_cost_saved: telemetry.daily_generation * price_per_kwh,
        total_cost_saved: telemetry.total_generation * price_per_kwh,
        firmware_update_available: firmware.is_update_available(),
        firmware_updating: firmware_status.is_updating(),
        firmware_version: firmware
            .current_version
            .clone()
            .or_else(|| info.firmware_version.clone()),
    }
}

// ── Snapshot assembly ──────────────────────────────────────────────

/// Everything fetched for one device in one cycle.
pub struct DeviceFetch {
    pub raw: RawRecord,
    pub source: DataSource,
    pub settings: SettingsBlob,
    pub firmware: FirmwareInfo,
    pub firmware_status: FirmwareStatus,
    pub info: DeviceInfo,
}

pub fn snapshot(
    descriptor: &DeviceDescriptor,
    fetch: DeviceFetch,
    fetched_at: DateTime<Utc>,
) -> DeviceSnapshot {
    let telemetry = telemetry(&fetch.raw);
    let derived = derive(
        &telemetry,
        &fetch.settings,
        &fetch.firmware,
        &fetch.firmware_status,
        &fetch.info,
    );

    DeviceSnapshot {
        mac: MacAddress::new(&descriptor.ble_mac),
        name: descriptor.display_name(),
        source: fetch.source,
        telemetry,
        derived,
        settings: fetch.settings,
        firmware: fetch.firmware,
        firmware_status: fetch.firmware_status,
        info: fetch.info,
        raw: fetch.raw,
        fetched_at,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::float_cmp)]

    use super::*;
    use crate::model::FieldValue;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn blob(value: Value) -> SettingsBlob {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn scales_battery_fields() {
        let t = telemetry(&record(json!({
            "totalSoc": 875,
            "totalSoh": 990,
            "totalVoltage": 512,
            "totalCurrent": 3.5,
            "totalPower": 12345,
            "totalRemainingCapacity": 4300,
            "TotalRatedCapacity": 5120,
            "batteryCount": 2,
        })));
        assert_eq!(t.soc, 87.5);
        assert_eq!(t.soh, 99.0);
        assert_eq!(t.voltage, 51.2);
        assert_eq!(t.current, 3.5);
        assert_eq!(t.power, 1234.5);
        assert_eq!(t.remaining_capacity, 4.3);
        assert_eq!(t.rated_capacity, 5.12);
        assert_eq!(t.battery_count, 2);
    }

    #[test]
    fn scales_energy_and_runtime() {
        let t = telemetry(&record(json!({
            "dailyGeneration": 12345,
            "totalGeneration": 987_654,
            "dailyRuntime": 7200,
            "totalRuntime": 321,
            "maxTemperature": 315,
            "pv1W": 4020,
            "pv1A": 7,
        })));
        assert_eq!(t.daily_generation, 12.345);
        assert_eq!(t.total_generation, 987.654);
        assert_eq!(t.daily_runtime, 2.0);
        assert_eq!(t.total_runtime, 321.0);
        assert_eq!(t.max_temperature, 31.5);
        assert_eq!(t.pv1_power, 402.0);
        assert_eq!(t.pv1_current, 7.0);
    }

    #[test]
    fn absent_and_malformed_fields_read_as_zero() {
        let t = telemetry(&record(json!({ "totalSoc": null, "totalPower": "n/a" })));
        assert_eq!(t, Telemetry::default());
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let t = telemetry(&record(json!({ "totalSoc": "640" })));
        assert_eq!(t.soc, 64.0);
    }

    #[test]
    fn derived_defaults_when_blob_is_empty() {
        let d = derive(
            &Telemetry::default(),
            &SettingsBlob::default(),
            &FirmwareInfo::default(),
            &FirmwareStatus::default(),
            &DeviceInfo::default(),
        );
        assert_eq!(d.current_mode, 1);
        assert_eq!(d.discharge_threshold, 10.0);
        assert_eq!(d.charge_threshold, 90.0);
        assert_eq!(d.price_per_kwh, 0.3);
        assert_eq!(d.output_power, None);
        assert!(!d.firmware_update_available);
    }

    #[test]
    fn cost_saved_uses_generation_and_price() {
        let t = Telemetry {
            daily_generation: 10.0,
            total_generation: 200.0,
            ..Telemetry::default()
        };
        let settings = blob(json!({ "pricePerKwh": 0.25, "mode": 3, "gridEnable": 1 }));
        let d = derive(
            &t,
            &settings,
            &FirmwareInfo::default(),
            &FirmwareStatus::default(),
            &DeviceInfo::default(),
        );
        assert_eq!(d.daily_cost_saved, 2.5);
        assert_eq!(d.total_cost_saved, 50.0);
        assert_eq!(d.current_mode, 3);
        assert_eq!(d.grid_enabled, Some(true));
    }

    #[test]
    fn snapshot_exposes_every_named_field() {
        let descriptor: DeviceDescriptor =
            serde_json::from_value(json!({ "bleMac": "AA:01" })).unwrap();
        let fetch = DeviceFetch {
            raw: record(json!({ "totalSoc": 875 })),
            source: DataSource::Cloud,
            settings: blob(json!({ "bmsPower": 40, "bmsEnable": true, "gridEnable": 0 })),
            firmware: FirmwareInfo {
                current_version: Some("1.0.3".into()),
                ..FirmwareInfo::default()
            },
            firmware_status: FirmwareStatus::default(),
            info: DeviceInfo::default(),
        };
        let snap = snapshot(&descriptor, fetch, Utc::now());

        assert_eq!(snap.name, "Big Blue AA:01");
        assert_eq!(snap.field("soc"), Some(FieldValue::Number(87.5)));
        assert_eq!(snap.field("device_name"), Some(FieldValue::Text("Big Blue AA:01".into())));
        assert_eq!(snap.field("data_source"), Some(FieldValue::Text("cloud".into())));
        assert_eq!(snap.field("nonexistent"), None);
        for name in crate::model::FIELD_NAMES {
            assert!(snap.field(name).is_some(), "field {name} missing");
        }
    }
}
