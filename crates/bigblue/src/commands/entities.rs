//! `entities`: every catalog entity of every (or one) battery.

use serde::Serialize;
use tabled::Tabled;

use bigblue_core::catalog::{self, EntityKind};
use bigblue_core::{Coordinator, CoordinatorConfig, FieldValue, MacAddress};

use crate::cli::{EntitiesArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct EntityEntry {
    unique_id: String,
    key: &'static str,
    name: String,
    kind: &'static str,
    available: bool,
    value: Option<FieldValue>,
    unit: Option<&'static str>,
}

#[derive(Tabled)]
struct EntityRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn kind_label(kind: &EntityKind) -> &'static str {
    match kind {
        EntityKind::Sensor => "sensor",
        EntityKind::BinarySensor => "binary_sensor",
        EntityKind::Number(_) => "number",
        EntityKind::ModeSwitch(_) => "switch",
    }
}

pub async fn handle(
    config: CoordinatorConfig,
    args: EntitiesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (descriptors, fleet) = Coordinator::oneshot(config, |c| async move {
        Ok((c.devices(), c.snapshot()))
    })
    .await?;
    let selected = util::select_devices(&descriptors, args.mac.as_deref())?;

    let data: Vec<EntityEntry> = selected
        .iter()
        .flat_map(|d| catalog::entities_for(&MacAddress::new(&d.ble_mac)))
        .map(|entity| {
            let descriptor = entity.descriptor();
            EntityEntry {
                unique_id: entity.unique_id(),
                key: descriptor.key,
                name: entity.display_name(&fleet),
                kind: kind_label(&descriptor.kind),
                available: entity.is_available(&fleet),
                value: entity.value(&fleet),
                unit: descriptor.unit,
            }
        })
        .collect();

    let color = output::should_color(global.color);
    let rendered = output::render_list(
        global.output,
        &data,
        |e| EntityRow {
            id: e.unique_id.clone(),
            name: e.name.clone(),
            kind: e.kind,
            value: if e.available {
                util::format_value(e.value.as_ref(), e.unit)
            } else {
                output::dim("unavailable", color)
            },
        },
        |e| {
            let value = e.value.as_ref().map_or_else(String::new, ToString::to_string);
            format!("{}={value}", e.unique_id)
        },
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
