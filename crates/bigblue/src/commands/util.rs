//! Shared helpers for command handlers.

use bigblue_core::{DeviceDescriptor, FieldValue, FleetSnapshot, MacAddress, Unavailability};

use crate::error::CliError;

/// Availability of one discovered device in the latest snapshot.
pub fn availability(fleet: &FleetSnapshot, mac: &MacAddress) -> Result<(), Unavailability> {
    if fleet.device(mac).is_some() {
        return Ok(());
    }
    Err(fleet
        .unavailable
        .get(mac)
        .cloned()
        .unwrap_or(Unavailability::NotFound))
}

/// Descriptors matching `filter` (any separator, any case), or all of them.
pub fn select_devices(
    descriptors: &[DeviceDescriptor],
    filter: Option<&str>,
) -> Result<Vec<DeviceDescriptor>, CliError> {
    let Some(filter) = filter else {
        return Ok(descriptors.to_vec());
    };
    let selected: Vec<_> = descriptors
        .iter()
        .filter(|d| MacAddress::new(&d.ble_mac).matches(filter))
        .cloned()
        .collect();
    if selected.is_empty() {
        return Err(CliError::NotFound {
            identifier: filter.into(),
        });
    }
    Ok(selected)
}

/// A value with its unit, or `-` when missing.
pub fn format_value(value: Option<&FieldValue>, unit: Option<&str>) -> String {
    match (value, unit) {
        (None, _) => "-".into(),
        (Some(v), Some(unit)) => format!("{v} {unit}"),
        (Some(v), None) => v.to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::Arc;

    use super::*;

    fn descriptor(mac: &str) -> DeviceDescriptor {
        serde_json::from_value(serde_json::json!({ "bleMac": mac })).unwrap()
    }

    #[test]
    fn select_devices_matches_loosely() {
        let all = Arc::new(vec![descriptor("AA:BB:CC:DD:EE:01"), descriptor("AA:BB:CC:DD:EE:02")]);
        assert_eq!(select_devices(&all, None).unwrap().len(), 2);

        let one = select_devices(&all, Some("aa-bb-cc-dd-ee-02")).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].ble_mac, "AA:BB:CC:DD:EE:02");

        assert!(matches!(
            select_devices(&all, Some("11:22")),
            Err(CliError::NotFound { .. })
        ));
    }

    #[test]
    fn missing_device_reads_as_unavailable() {
        let fleet = FleetSnapshot::default();
        let mac = MacAddress::new("AA:BB:CC:DD:EE:01");
        assert_eq!(availability(&fleet, &mac), Err(Unavailability::NotFound));
    }

    #[test]
    fn values_carry_units() {
        assert_eq!(format_value(Some(&FieldValue::Number(87.5)), Some("%")), "87.5 %");
        assert_eq!(format_value(None, Some("%")), "-");
    }
}
