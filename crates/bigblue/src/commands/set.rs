//! `set`: settings writes through the coordinator's command channel.

use serde::Serialize;
use serde_json::Value;

use bigblue_core::catalog::{self, EntityKind};
use bigblue_core::{Command, CommandResult, Coordinator, CoordinatorConfig, Entity, MacAddress, Mode};

use crate::cli::{GlobalOpts, OutputFormat, SetArgs, SetCommand};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct SetOutcome {
    mac: String,
    changed: bool,
}

/// Map CLI input to the command it performs.
fn build_command(cmd: SetCommand) -> Result<Command, CliError> {
    Ok(match cmd {
        SetCommand::Mode { mac, mode } => Command::SetMode {
            mac: MacAddress::new(mac),
            mode: Mode::parse_loose(&mode).ok_or_else(|| CliError::Validation {
                field: "mode".into(),
                reason: format!(
                    "unknown mode '{mode}'; use 1, 2, 3 or battery-priority, \
                     micro-inverter-priority, custom-schedule"
                ),
            })?,
        },
        SetCommand::Discharge { mac, pct } => Command::SetDischargeThreshold {
            mac: MacAddress::new(mac),
            pct,
        },
        SetCommand::Charge { mac, pct } => Command::SetChargeThreshold {
            mac: MacAddress::new(mac),
            pct,
        },
        SetCommand::OutputPower { mac, pct } => Command::SetOutputPower {
            mac: MacAddress::new(mac),
            pct,
        },
        SetCommand::Param { mac, field, value } => Command::SetConfigParameter {
            mac: MacAddress::new(mac),
            field,
            value: parse_param(&value),
        },
        SetCommand::Entity { mac, key, value } => entity_command(&mac, &key, &value)?,
    })
}

/// JSON when it parses (`1.5`, `true`, `[1,2]`), plain text otherwise.
fn parse_param(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

fn entity_command(mac: &str, key: &str, value: &str) -> Result<Command, CliError> {
    let descriptor = catalog::lookup(key).ok_or_else(|| CliError::NotFound {
        identifier: format!("entity {key}"),
    })?;
    let entity = Entity::new(descriptor, MacAddress::new(mac));

    let command = match (descriptor.kind, value.to_ascii_lowercase().as_str()) {
        (EntityKind::ModeSwitch(_), "on") => entity.turn_on(),
        (EntityKind::ModeSwitch(_), "off") => entity.turn_off(),
        (EntityKind::Number(_), _) => {
            let number: f64 = value.parse().map_err(|_| CliError::Validation {
                field: key.into(),
                reason: format!("'{value}' is not a number"),
            })?;
            entity.set_value(number)
        }
        (EntityKind::ModeSwitch(_), _) => {
            return Err(CliError::Validation {
                field: key.into(),
                reason: "expected on or off".into(),
            });
        }
        (EntityKind::Sensor | EntityKind::BinarySensor, _) => {
            return Err(CliError::Validation {
                field: key.into(),
                reason: "read-only entity".into(),
            });
        }
    };
    command.map_err(CliError::from)
}

pub async fn handle(
    config: CoordinatorConfig,
    args: SetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let command = build_command(args.command)?;
    command.validate()?;

    let mac = command.mac().to_string();
    let result = Coordinator::oneshot(config, |c| async move { c.execute(command).await }).await?;

    let changed = result == CommandResult::Applied;
    let rendered = match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Plain => {
            output::render_single(
                global.output,
                &SetOutcome { mac, changed },
                |_| String::new(),
                |o| if o.changed { "applied" } else { "unchanged" }.to_owned(),
            )?
        }
        OutputFormat::Table => {
            let color = output::should_color(global.color);
            if changed {
                output::status_text("Setting applied", true, color)
            } else {
                output::dim("Already set; nothing uploaded", color)
            }
        }
    };
    output::print_output(&rendered, global.quiet);
    Ok(())
}
