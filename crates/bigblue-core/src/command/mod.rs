// ── Command API ──
//
// Every settings write flows through the `Command` enum. The coordinator's
// command processor handles one command at a time, so the download,
// overlay, and upload of one write never interleave with another's.

use std::ops::RangeInclusive;

use serde_json::{Value, json};

use bigblue_api::SettingsBlob;

use crate::error::CoreError;
use crate::model::{MacAddress, Mode};

/// Accepted discharge floor, %.
pub const DISCHARGE_RANGE: RangeInclusive<u8> = 5..=50;
/// Accepted charge ceiling, %.
pub const CHARGE_RANGE: RangeInclusive<u8> = 50..=100;
/// Accepted output power, %.
pub const OUTPUT_POWER_RANGE: RangeInclusive<u8> = 5..=100;

/// Blob fields a generic parameter write may never touch.
const RESERVED_FIELDS: &[&str] = &["bleMac", "userId"];

/// A command envelope sent through the command channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All write operations against a device's settings.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetMode {
        mac: MacAddress,
        mode: Mode,
    },
    SetDischargeThreshold {
        mac: MacAddress,
        pct: u8,
    },
    SetChargeThreshold {
        mac: MacAddress,
        pct: u8,
    },
    SetOutputPower {
        mac: MacAddress,
        pct: u8,
    },
    /// Overlay any single blob field.
    SetConfigParameter {
        mac: MacAddress,
        field: String,
        value: Value,
    },
}

/// What a successful command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    /// The blob changed and was uploaded.
    Applied,
    /// The device already had the requested value; nothing was uploaded.
    Unchanged,
}

impl Command {
    pub fn mac(&self) -> &MacAddress {
        match self {
            Self::SetMode { mac, .. }
            | Self::SetDischargeThreshold { mac, .. }
            | Self::SetChargeThreshold { mac, .. }
            | Self::SetOutputPower { mac, .. }
            | Self::SetConfigParameter { mac, .. } => mac,
        }
    }

    /// Reject out-of-range or malformed writes before any network call.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.mac().is_empty() {
            return Err(CoreError::validation("device MAC must not be empty"));
        }
        match self {
            Self::SetMode { .. } => Ok(()),
            Self::SetDischargeThreshold { pct, .. } => {
                check_range("discharge threshold", *pct, &DISCHARGE_RANGE)
            }
            Self::SetChargeThreshold { pct, .. } => {
                check_range("charge threshold", *pct, &CHARGE_RANGE)
            }
            Self::SetOutputPower { pct, .. } => {
                check_range("output power", *pct, &OUTPUT_POWER_RANGE)
            }
            Self::SetConfigParameter { field, value, .. } => validate_parameter(field, value),
        }
    }

    /// The blob field and value this command writes.
    pub fn overlay(&self) -> (&str, Value) {
        match self {
            Self::SetMode { mode, .. } => (SettingsBlob::MODE, json!(mode.code())),
            Self::SetDischargeThreshold { pct, .. } => (SettingsBlob::DISCHARGE_SOC, json!(pct)),
            Self::SetChargeThreshold { pct, .. } => (SettingsBlob::CHARGE_SOC, json!(pct)),
            Self::SetOutputPower { pct, .. } => (SettingsBlob::BMS_POWER, json!(pct)),
            Self::SetConfigParameter { field, value, .. } => (field.as_str(), value.clone()),
        }
    }

    /// Apply the command to `blob`, returning whether anything changed.
    ///
    /// A mode write compares against the effective mode, so a blob without
    /// `mode` already counts as mode 1.
    pub fn apply(&self, blob: &mut SettingsBlob) -> bool {
        if let Self::SetMode { mode, .. } = self {
            if blob.mode().unwrap_or(Mode::DEFAULT_CODE) == mode.code() {
                return false;
            }
        }
        let (field, value) = self.overlay();
        blob.set(field, value)
    }
}

fn check_range(what: &str, pct: u8, range: &RangeInclusive<u8>) -> Result<(), CoreError> {
    if range.contains(&pct) {
        Ok(())
    } else {
        Err(CoreError::validation(format!(
            "{what} must be between {} and {} (got {pct})",
            range.start(),
            range.end()
        )))
    }
}

fn validate_parameter(field: &str, value: &Value) -> Result<(), CoreError> {
    if field.trim().is_empty() {
        return Err(CoreError::validation("parameter name must not be empty"));
    }
    if RESERVED_FIELDS.contains(&field) {
        return Err(CoreError::validation(format!(
            "{field} is set by the client and cannot be overridden"
        )));
    }
    if value.is_null() {
        return Err(CoreError::validation(format!("{field} needs a value")));
    }

    // Fields backed by a number entity carry their entity's bounds.
    if let Some(spec) = crate::catalog::number_spec_for_setting(field) {
        let Some(n) = value.as_f64() else {
            return Err(CoreError::validation(format!("{field} must be numeric")));
        };
        if n < spec.min || n > spec.max {
            return Err(CoreError::validation(format!(
                "{field} must be between {} and {} (got {n})",
                spec.min, spec.max
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn mac() -> MacAddress {
        MacAddress::new("AA:01")
    }

    #[test]
    fn threshold_ranges_are_enforced() {
        let low = Command::SetDischargeThreshold { mac: mac(), pct: 4 };
        let ok = Command::SetDischargeThreshold { mac: mac(), pct: 50 };
        let high = Command::SetChargeThreshold { mac: mac(), pct: 101 };
        let floor = Command::SetChargeThreshold { mac: mac(), pct: 49 };
        let power = Command::SetOutputPower { mac: mac(), pct: 100 };

        assert!(matches!(low.validate(), Err(CoreError::ValidationFailed { .. })));
        assert!(ok.validate().is_ok());
        assert!(high.validate().is_err());
        assert!(floor.validate().is_err());
        assert!(power.validate().is_ok());
    }

    #[test]
    fn parameter_validation_uses_entity_bounds() {
        let pf = |v: Value| Command::SetConfigParameter {
            mac: mac(),
            field: "pfValue".into(),
            value: v,
        };
        assert!(pf(json!(5)).validate().is_ok());
        assert!(pf(json!(101)).validate().is_err());
        assert!(pf(json!("five")).validate().is_err());

        let reserved = Command::SetConfigParameter {
            mac: mac(),
            field: "userId".into(),
            value: json!(1),
        };
        assert!(reserved.validate().is_err());

        let free_form = Command::SetConfigParameter {
            mac: mac(),
            field: "currencyCode".into(),
            value: json!("CHF"),
        };
        assert!(free_form.validate().is_ok());
    }

    #[test]
    fn empty_mac_is_rejected() {
        let cmd = Command::SetMode {
            mac: MacAddress::new(""),
            mode: Mode::BatteryPriority,
        };
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn apply_reports_changes() {
        let mut blob: SettingsBlob = serde_json::from_value(json!({ "mode": 2, "soc": 10 })).unwrap();

        let same_mode = Command::SetMode { mac: mac(), mode: Mode::MicroInverterPriority };
        assert!(!same_mode.apply(&mut blob));

        let new_floor = Command::SetDischargeThreshold { mac: mac(), pct: 20 };
        assert!(new_floor.apply(&mut blob));
        assert_eq!(blob.integer("soc"), Some(20));
        assert_eq!(blob.mode(), Some(2));
    }

    #[test]
    fn mode_one_matches_blob_without_mode() {
        let mut blob = SettingsBlob::default();
        let cmd = Command::SetMode { mac: mac(), mode: Mode::BatteryPriority };
        assert!(!cmd.apply(&mut blob));
    }
}
