use serde::{Deserialize, Serialize};

/// Operating mode stored in the settings blob's `mode` field.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Mode {
    /// Mode 1: serve loads from the battery first.
    BatteryPriority,
    /// Mode 2: let the micro-inverter output take precedence.
    MicroInverterPriority,
    /// Mode 3: follow the configured time schedule.
    CustomSchedule,
}

impl Mode {
    /// Mode reported when the blob carries none.
    pub const DEFAULT_CODE: i64 = 1;

    pub fn code(self) -> i64 {
        match self {
            Self::BatteryPriority => 1,
            Self::MicroInverterPriority => 2,
            Self::CustomSchedule => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::BatteryPriority),
            2 => Some(Self::MicroInverterPriority),
            3 => Some(Self::CustomSchedule),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::BatteryPriority => "Battery priority",
            Self::MicroInverterPriority => "Micro-inverter priority",
            Self::CustomSchedule => "Custom schedule",
        }
    }

    /// Parse either a code (`"2"`) or a name (`"micro-inverter-priority"`).
    pub fn parse_loose(input: &str) -> Option<Self> {
        let input = input.trim();
        input
            .parse::<i64>()
            .ok()
            .and_then(Self::from_code)
            .or_else(|| input.to_ascii_lowercase().parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn codes_round_trip() {
        for mode in Mode::iter() {
            assert_eq!(Mode::from_code(mode.code()), Some(mode));
        }
        assert_eq!(Mode::from_code(0), None);
    }

    #[test]
    fn parse_loose_accepts_codes_and_names() {
        assert_eq!(Mode::parse_loose("2"), Some(Mode::MicroInverterPriority));
        assert_eq!(Mode::parse_loose("Custom-Schedule"), Some(Mode::CustomSchedule));
        assert_eq!(Mode::parse_loose("7"), None);
    }
}
