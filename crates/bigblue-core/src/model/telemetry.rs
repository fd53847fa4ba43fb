use serde::Serialize;

/// Scaled battery telemetry for one device.
///
/// Built from the raw `last_data` record by [`crate::convert::telemetry`];
/// raw fields the device did not report read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Telemetry {
    // ── Battery ──
    /// State of charge, %.
    pub soc: f64,
    /// State of health, %.
    pub soh: f64,
    /// Pack voltage, V.
    pub voltage: f64,
    /// Pack current, A.
    pub current: f64,
    /// Pack power, W.
    pub power: f64,
    /// kWh
    pub remaining_capacity: f64,
    /// kWh
    pub rated_capacity: f64,
    pub battery_count: i64,
    pub status: i64,

    // ── Solar ──
    pub pv1_voltage: f64,
    pub pv1_current: f64,
    pub pv1_power: f64,
    pub pv2_voltage: f64,
    pub pv2_current: f64,
    pub pv2_power: f64,
    pub pv_total_power: f64,

    // ── Energy ──
    /// kWh
    pub daily_generation: f64,
    /// kWh
    pub total_generation: f64,
    /// kWh
    pub daily_output_energy: f64,
    /// kWh
    pub total_output_energy: f64,

    // ── Environment ──
    /// °C
    pub max_temperature: f64,
    /// °C
    pub min_temperature: f64,
    /// g
    pub daily_co2_savings: f64,
    /// h
    pub daily_runtime: f64,
    pub total_runtime: f64,
}
