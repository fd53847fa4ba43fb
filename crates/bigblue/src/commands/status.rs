//! `status`: the latest snapshot of every (or one) battery.

use std::fmt::Write as _;
use std::sync::Arc;

use tabled::Tabled;

use bigblue_core::catalog;
use bigblue_core::model::FIELD_NAMES;
use bigblue_core::{Coordinator, CoordinatorConfig, DeviceSnapshot, Mode};

use crate::cli::{GlobalOpts, OutputFormat, StatusArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "SoC")]
    soc: String,
    #[tabled(rename = "Power")]
    power: String,
    #[tabled(rename = "PV")]
    pv: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

fn status_row(d: &Arc<DeviceSnapshot>) -> StatusRow {
    StatusRow {
        mac: d.mac.to_string(),
        name: d.name.clone(),
        soc: format!("{:.1} %", d.telemetry.soc),
        power: format!("{:.1} W", d.telemetry.power),
        pv: format!("{:.1} W", d.telemetry.pv_total_power),
        mode: mode_label(d.derived.current_mode),
        source: d.source.to_string(),
        updated: d.fetched_at.format("%H:%M:%S").to_string(),
    }
}

fn mode_label(code: i64) -> String {
    Mode::from_code(code).map_or_else(|| format!("mode {code}"), |m| m.label().to_owned())
}

/// Every normalized field, one per line, with catalog units.
fn detail(d: &DeviceSnapshot) -> String {
    let width = FIELD_NAMES.iter().map(|n| n.len()).max().unwrap_or(0) + 2;
    let mut out = String::new();
    for name in FIELD_NAMES {
        let unit = catalog::lookup(name).and_then(|e| e.unit);
        let value = util::format_value(d.field(name).as_ref(), unit);
        let _ = writeln!(out, "{name:<width$}{value}");
    }
    out.trim_end().to_owned()
}

fn plain(d: &DeviceSnapshot) -> String {
    FIELD_NAMES
        .iter()
        .filter_map(|name| d.field(name).map(|v| format!("{name}={v}")))
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn handle(
    config: CoordinatorConfig,
    args: StatusArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let fleet = Coordinator::oneshot(config, |c| async move { Ok(c.snapshot()) }).await?;

    let rendered = match args.mac.as_deref() {
        Some(filter) => {
            let Some(device) = fleet.find(filter) else {
                let reason = fleet
                    .unavailable
                    .iter()
                    .find(|(mac, _)| mac.matches(filter))
                    .map(|(mac, reason)| format!("{mac} ({reason})"));
                return Err(CliError::NotFound {
                    identifier: reason.unwrap_or_else(|| filter.to_owned()),
                });
            };
            output::render_single(global.output, device.as_ref(), detail, plain)?
        }
        None => {
            let devices: Vec<Arc<DeviceSnapshot>> = fleet.devices.values().cloned().collect();
            let mut rendered = output::render_list(
                global.output,
                &devices,
                status_row,
                |d| d.mac.to_string(),
            )?;
            if global.output == OutputFormat::Table && !fleet.unavailable.is_empty() {
                let color = output::should_color(global.color);
                for (mac, reason) in &fleet.unavailable {
                    let line = format!("{mac}  {reason}");
                    rendered.push('\n');
                    rendered.push_str(&output::dim(&line, color));
                }
            }
            rendered
        }
    };
    output::print_output(&rendered, global.quiet);
    Ok(())
}
