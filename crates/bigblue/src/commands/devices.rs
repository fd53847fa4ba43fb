//! `devices`: discovered batteries and their availability.

use serde::Serialize;
use tabled::Tabled;

use bigblue_core::{
    Coordinator, CoordinatorConfig, DataSource, DeviceDescriptor, FleetSnapshot, MacAddress,
};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct DeviceEntry {
    mac: String,
    name: String,
    local_ip: Option<String>,
    available: bool,
    status: String,
    soc: Option<f64>,
    source: Option<DataSource>,
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "SoC")]
    soc: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Local IP")]
    local_ip: String,
}

fn entries(descriptors: &[DeviceDescriptor], fleet: &FleetSnapshot) -> Vec<DeviceEntry> {
    descriptors
        .iter()
        .map(|d| {
            let mac = MacAddress::new(&d.ble_mac);
            let snapshot = fleet.device(&mac);
            let status = match util::availability(fleet, &mac) {
                Ok(()) => "online".to_owned(),
                Err(reason) => reason.to_string(),
            };
            DeviceEntry {
                mac: d.ble_mac.clone(),
                name: d.display_name(),
                local_ip: d.local_address().map(str::to_owned),
                available: snapshot.is_some(),
                status,
                soc: snapshot.map(|s| s.telemetry.soc),
                source: snapshot.map(|s| s.source),
            }
        })
        .collect()
}

pub async fn handle(config: CoordinatorConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let (descriptors, fleet) = Coordinator::oneshot(config, |c| async move {
        Ok((c.devices(), c.snapshot()))
    })
    .await?;

    let data = entries(&descriptors, &fleet);
    let color = output::should_color(global.color);
    let rendered = output::render_list(
        global.output,
        &data,
        |e| DeviceRow {
            mac: e.mac.clone(),
            name: e.name.clone(),
            status: output::status_text(&e.status, e.available, color),
            soc: e.soc.map_or_else(|| "-".into(), |soc| format!("{soc:.1} %")),
            source: e.source.map_or_else(|| "-".into(), |s| s.to_string()),
            local_ip: e.local_ip.clone().unwrap_or_else(|| "-".into()),
        },
        |e| e.mac.clone(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
