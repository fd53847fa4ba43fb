// ── Entity catalog ──
//
// One table describes every entity a device exposes. A single generic
// `Entity` reads values out of the published snapshot and turns writes
// into `Command`s, so adding an entity is a table row, not a type.

use serde_json::{Value, json};

use bigblue_api::SettingsBlob;

use crate::command::Command;
use crate::error::CoreError;
use crate::model::{DeviceSnapshot, FieldValue, FleetSnapshot, MacAddress, Mode};

pub const DOMAIN: &str = "bigblue";
pub const MANUFACTURER: &str = "Big Blue";
pub const MODEL: &str = "Battery System";

// ── Descriptor types ────────────────────────────────────────────────

/// Where an entity's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// A normalized snapshot field (see [`DeviceSnapshot::field`]).
    Field(&'static str),
    /// A raw settings blob key.
    Setting(&'static str),
}

/// The write a number entity maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberWrite {
    DischargeThreshold,
    ChargeThreshold,
    OutputPower,
    /// Generic overlay of one blob key.
    Setting(&'static str),
}

impl NumberWrite {
    /// The blob key the write lands in.
    pub fn setting_key(self) -> &'static str {
        match self {
            Self::DischargeThreshold => SettingsBlob::DISCHARGE_SOC,
            Self::ChargeThreshold => SettingsBlob::CHARGE_SOC,
            Self::OutputPower => SettingsBlob::BMS_POWER,
            Self::Setting(key) => key,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberSpec {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub write: NumberWrite,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityKind {
    Sensor,
    BinarySensor,
    Number(NumberSpec),
    /// On while the device runs in this mode; turning it on selects it.
    ModeSwitch(Mode),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityDescriptor {
    pub key: &'static str,
    pub name: &'static str,
    pub unit: Option<&'static str>,
    pub icon: &'static str,
    pub device_class: Option<&'static str>,
    pub source: ValueSource,
    pub kind: EntityKind,
}

// ── Table ───────────────────────────────────────────────────────────

const fn sensor(
    key: &'static str,
    name: &'static str,
    unit: Option<&'static str>,
    icon: &'static str,
    device_class: Option<&'static str>,
) -> EntityDescriptor {
    EntityDescriptor {
        key,
        name,
        unit,
        icon,
        device_class,
        source: ValueSource::Field(key),
        kind: EntityKind::Sensor,
    }
}

const fn binary(
    key: &'static str,
    name: &'static str,
    icon: &'static str,
    device_class: Option<&'static str>,
) -> EntityDescriptor {
    EntityDescriptor {
        key,
        name,
        unit: None,
        icon,
        device_class,
        source: ValueSource::Field(key),
        kind: EntityKind::BinarySensor,
    }
}

#[allow(clippy::too_many_arguments)]
const fn number(
    key: &'static str,
    name: &'static str,
    unit: &'static str,
    icon: &'static str,
    device_class: Option<&'static str>,
    source: ValueSource,
    (min, max, step): (f64, f64, f64),
    write: NumberWrite,
) -> EntityDescriptor {
    EntityDescriptor {
        key,
        name,
        unit: Some(unit),
        icon,
        device_class,
        source,
        kind: EntityKind::Number(NumberSpec {
            min,
            max,
            step,
            write,
        }),
    }
}

const fn mode_switch(
    key: &'static str,
    name: &'static str,
    icon: &'static str,
    mode: Mode,
) -> EntityDescriptor {
    EntityDescriptor {
        key,
        name,
        unit: None,
        icon,
        device_class: None,
        source: ValueSource::Field("current_mode"),
        kind: EntityKind::ModeSwitch(mode),
    }
}

const PCT: Option<&str> = Some("%");
const VOLT: Option<&str> = Some("V");
const AMP: Option<&str> = Some("A");
const WATT: Option<&str> = Some("W");
const KWH: Option<&str> = Some("kWh");
const CELSIUS: Option<&str> = Some("°C");
const EUR: Option<&str> = Some("€");

/// Every entity exposed per device.
pub static ENTITY_CATALOG: &[EntityDescriptor] = &[
    // ── Battery ──
    sensor("soc", "State of charge", PCT, "mdi:battery", Some("battery")),
    sensor("soh", "State of health", PCT, "mdi:heart-pulse", Some("battery")),
    sensor("voltage", "Voltage", VOLT, "mdi:lightning-bolt", Some("voltage")),
    sensor("current", "Current", AMP, "mdi:current-ac", Some("current")),
    sensor("power", "Power", WATT, "mdi:power", Some("power")),
    sensor("remaining_capacity", "Remaining capacity", KWH, "mdi:battery-50", Some("energy")),
    sensor("rated_capacity", "Rated capacity", KWH, "mdi:battery", Some("energy")),
    sensor("battery_count", "Battery count", None, "mdi:battery-plus", None),
    sensor("status", "Status", None, "mdi:information-outline", None),
    // ── Solar ──
    sensor("pv1_voltage", "PV1 voltage", VOLT, "mdi:solar-power", Some("voltage")),
    sensor("pv1_current", "PV1 current", AMP, "mdi:solar-power", Some("current")),
    sensor("pv1_power", "PV1 power", WATT, "mdi:solar-power", Some("power")),
    sensor("pv2_voltage", "PV2 voltage", VOLT, "mdi:solar-power", Some("voltage")),
    sensor("pv2_current", "PV2 current", AMP, "mdi:solar-power", Some("current")),
    sensor("pv2_power", "PV2 power", WATT, "mdi:solar-power", Some("power")),
    sensor("pv_total_power", "PV total power", WATT, "mdi:solar-power", Some("power")),
    // ── Energy ──
    sensor("daily_generation", "Solar energy today", KWH, "mdi:solar-power-variant", Some("energy")),
    sensor("total_generation", "Solar energy total", KWH, "mdi:solar-power-variant", Some("energy")),
    sensor("daily_output_energy", "Output energy today", KWH, "mdi:transmission-tower-export", Some("energy")),
    sensor("total_output_energy", "Output energy total", KWH, "mdi:transmission-tower-export", Some("energy")),
    sensor("daily_cost_saved", "Savings today", EUR, "mdi:cash", Some("monetary")),
    sensor("total_cost_saved", "Savings total", EUR, "mdi:cash-multiple", Some("monetary")),
    // ── Environment ──
    sensor("max_temperature", "Max temperature", CELSIUS, "mdi:thermometer-high", Some("temperature")),
    sensor("min_temperature", "Min temperature", CELSIUS, "mdi:thermometer-low", Some("temperature")),
    sensor("daily_co2_savings", "CO2 savings", Some("g"), "mdi:molecule-co2", Some("weight")),
    sensor("daily_runtime", "Runtime today", Some("h"), "mdi:timer-outline", Some("duration")),
    sensor("total_runtime", "Runtime total", Some("h"), "mdi:timer", Some("duration")),
    // ── Device ──
    sensor("current_mode", "Current mode", None, "mdi:cog", None),
    sensor("firmware_version", "Firmware version", None, "mdi:chip", None),
    sensor("last_update", "Last update", None, "mdi:clock-outline", Some("timestamp")),
    sensor("data_source", "Data source", None, "mdi:lan", None),
    binary("bms_enabled", "BMS", "mdi:battery", None),
    binary("grid_enabled", "Grid", "mdi:transmission-tower", None),
    binary("firmware_update_available", "Firmware update", "mdi:update", Some("update")),
    binary("firmware_updating", "Firmware updating", "mdi:progress-download", None),
    // ── Controls ──
    number(
        "discharge_threshold",
        "Discharge threshold",
        "%",
        "mdi:battery-alert",
        Some("battery"),
        ValueSource::Field("discharge_threshold"),
        (5.0, 50.0, 1.0),
        NumberWrite::DischargeThreshold,
    ),
    number(
        "charge_threshold",
        "Charge threshold",
        "%",
        "mdi:battery-charging",
        Some("battery"),
        ValueSource::Field("charge_threshold"),
        (50.0, 100.0, 1.0),
        NumberWrite::ChargeThreshold,
    ),
    number(
        "output_power",
        "Output power",
        "%",
        "mdi:flash",
        None,
        ValueSource::Field("output_power"),
        (5.0, 100.0, 1.0),
        NumberWrite::OutputPower,
    ),
    number(
        "power_factor",
        "Power factor",
        "%",
        "mdi:sine-wave",
        None,
        ValueSource::Setting("pfValue"),
        (0.0, 100.0, 1.0),
        NumberWrite::Setting("pfValue"),
    ),
    number(
        "cta_power",
        "CT A power",
        "W",
        "mdi:current-ac",
        Some("power"),
        ValueSource::Setting("ctAPower"),
        (0.0, 10_000.0, 100.0),
        NumberWrite::Setting("ctAPower"),
    ),
    number(
        "ctb_power",
        "CT B power",
        "W",
        "mdi:current-ac",
        Some("power"),
        ValueSource::Setting("ctBPower"),
        (0.0, 10_000.0, 100.0),
        NumberWrite::Setting("ctBPower"),
    ),
    number(
        "ctc_power",
        "CT C power",
        "W",
        "mdi:current-ac",
        Some("power"),
        ValueSource::Setting("ctCPower"),
        (0.0, 10_000.0, 100.0),
        NumberWrite::Setting("ctCPower"),
    ),
    number(
        "ct_total_power",
        "CT total power",
        "W",
        "mdi:current-ac",
        Some("power"),
        ValueSource::Setting("ctTotalPower"),
        (0.0, 30_000.0, 100.0),
        NumberWrite::Setting("ctTotalPower"),
    ),
    number(
        "grid_time",
        "Grid time",
        "s",
        "mdi:timer",
        None,
        ValueSource::Setting("gridTime"),
        (0.0, 3600.0, 1.0),
        NumberWrite::Setting("gridTime"),
    ),
    number(
        "price_per_kwh",
        "Price per kWh",
        "€/kWh",
        "mdi:currency-eur",
        None,
        ValueSource::Field("price_per_kwh"),
        (0.0, 10.0, 0.01),
        NumberWrite::Setting("pricePerKwh"),
    ),
    mode_switch("mode_1", "Mode 1 (battery priority)", "mdi:battery", Mode::BatteryPriority),
    mode_switch(
        "mode_2",
        "Mode 2 (micro-inverter priority)",
        "mdi:solar-power",
        Mode::MicroInverterPriority,
    ),
    mode_switch("mode_3", "Mode 3 (custom schedule)", "mdi:calendar-clock", Mode::CustomSchedule),
];

/// Find a descriptor by key.
pub fn lookup(key: &str) -> Option<&'static EntityDescriptor> {
    ENTITY_CATALOG.iter().find(|d| d.key == key)
}

/// Bounds of the number entity that writes blob key `field`, if any.
pub fn number_spec_for_setting(field: &str) -> Option<&'static NumberSpec> {
    ENTITY_CATALOG.iter().find_map(|d| match &d.kind {
        EntityKind::Number(spec) if spec.write.setting_key() == field => Some(spec),
        _ => None,
    })
}

/// One entity per catalog row for the device.
pub fn entities_for(mac: &MacAddress) -> Vec<Entity> {
    ENTITY_CATALOG
        .iter()
        .map(|descriptor| Entity::new(descriptor, mac.clone()))
        .collect()
}

// ── Entity ──────────────────────────────────────────────────────────

/// A catalog row bound to one device.
///
/// Entities hold no state of their own; every read goes to the snapshot
/// passed in, and a device missing from it reads as unavailable.
#[derive(Debug, Clone)]
pub struct Entity {
    descriptor: &'static EntityDescriptor,
    mac: MacAddress,
}

impl Entity {
    pub fn new(descriptor: &'static EntityDescriptor, mac: MacAddress) -> Self {
        Self { descriptor, mac }
    }

    pub fn descriptor(&self) -> &'static EntityDescriptor {
        self.descriptor
    }

    pub fn mac(&self) -> &MacAddress {
        &self.mac
    }

    /// Stable id: `bigblue_{mac}_{key}`.
    pub fn unique_id(&self) -> String {
        format!("{DOMAIN}_{}_{}", self.mac, self.descriptor.key)
    }

    /// Entity name suffixed with the device name, when the device is known.
    pub fn display_name(&self, fleet: &FleetSnapshot) -> String {
        match fleet.device(&self.mac) {
            Some(device) => format!("{} {}", self.descriptor.name, device.name),
            None => format!("{} Big Blue {}", self.descriptor.name, self.mac),
        }
    }

    pub fn is_available(&self, fleet: &FleetSnapshot) -> bool {
        fleet.device(&self.mac).is_some()
    }

    /// Current value; `None` when the device is missing from the snapshot
    /// or never reported this value.
    pub fn value(&self, fleet: &FleetSnapshot) -> Option<FieldValue> {
        let device = fleet.device(&self.mac)?;
        if let EntityKind::ModeSwitch(mode) = self.descriptor.kind {
            return Some(FieldValue::Bool(device.derived.current_mode == mode.code()));
        }
        read(device, self.descriptor.source)
    }

    /// On/off state for binary sensors and mode switches.
    pub fn is_on(&self, fleet: &FleetSnapshot) -> Option<bool> {
        self.value(fleet)?.as_bool()
    }

    /// Turn a requested number value into the command that writes it.
    pub fn set_value(&self, value: f64) -> Result<Command, CoreError> {
        let EntityKind::Number(spec) = self.descriptor.kind else {
            return Err(self.unsupported("set a value on"));
        };
        if !value.is_finite() || value < spec.min || value > spec.max {
            return Err(CoreError::validation(format!(
                "{} must be between {} and {} (got {value})",
                self.descriptor.key, spec.min, spec.max
            )));
        }

        let mac = self.mac.clone();
        Ok(match spec.write {
            NumberWrite::DischargeThreshold => Command::SetDischargeThreshold {
                mac,
                pct: to_percent(value),
            },
            NumberWrite::ChargeThreshold => Command::SetChargeThreshold {
                mac,
                pct: to_percent(value),
            },
            NumberWrite::OutputPower => Command::SetOutputPower {
                mac,
                pct: to_percent(value),
            },
            NumberWrite::Setting(field) => Command::SetConfigParameter {
                mac,
                field: field.to_owned(),
                value: snap_to_step(value, spec.step),
            },
        })
    }

    /// Command that selects this switch's mode.
    pub fn turn_on(&self) -> Result<Command, CoreError> {
        match self.descriptor.kind {
            EntityKind::ModeSwitch(mode) => Ok(Command::SetMode {
                mac: self.mac.clone(),
                mode,
            }),
            _ => Err(self.unsupported("turn on")),
        }
    }

    /// Modes are exclusive; a mode is left by selecting another one.
    pub fn turn_off(&self) -> Result<Command, CoreError> {
        match self.descriptor.kind {
            EntityKind::ModeSwitch(mode) => Err(CoreError::validation(format!(
                "{} cannot be switched off; select another mode instead",
                mode.label()
            ))),
            _ => Err(self.unsupported("turn off")),
        }
    }

    fn unsupported(&self, action: &str) -> CoreError {
        CoreError::validation(format!("cannot {action} {}", self.descriptor.key))
    }
}

fn read(device: &DeviceSnapshot, source: ValueSource) -> Option<FieldValue> {
    match source {
        ValueSource::Field(name) => device.field(name),
        ValueSource::Setting(key) => device.setting(key),
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
fn to_percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

/// Round to the entity's step; whole steps are written as integers.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn snap_to_step(value: f64, step: f64) -> Value {
    if step >= 1.0 {
        json!(((value / step).round() * step) as i64)
    } else {
        let scale = (1.0 / step).round();
        json!((value * scale).round() / scale)
    }
}

// ── Device registration ─────────────────────────────────────────────

/// How a device presents itself to the host's device registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRegistration {
    pub identifier: (&'static str, String),
    pub name: String,
    pub manufacturer: &'static str,
    pub model: String,
    pub sw_version: Option<String>,
}

pub fn registration(device: &DeviceSnapshot) -> DeviceRegistration {
    DeviceRegistration {
        identifier: (DOMAIN, device.mac.to_string()),
        name: device.name.clone(),
        manufacturer: MANUFACTURER,
        model: device.info.model.clone().unwrap_or_else(|| MODEL.to_owned()),
        sw_version: device.derived.firmware_version.clone(),
    }
}
