//! `settings`: the raw settings blob of one battery.

use tabled::Tabled;

use bigblue_core::catalog;
use bigblue_core::{Coordinator, CoordinatorConfig, MacAddress, SettingsBlob};

use crate::cli::{GlobalOpts, SettingsArgs};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Range")]
    range: String,
}

fn rows(blob: &SettingsBlob) -> Vec<SettingRow> {
    blob.fields()
        .iter()
        .map(|(field, value)| SettingRow {
            field: field.clone(),
            value: match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            range: catalog::number_spec_for_setting(field)
                .map_or_else(String::new, |spec| format!("{}..{}", spec.min, spec.max)),
        })
        .collect()
}

fn plain(blob: &SettingsBlob) -> String {
    blob.fields()
        .iter()
        .map(|(field, value)| format!("{field}={value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn handle(
    config: CoordinatorConfig,
    args: SettingsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mac = MacAddress::new(&args.mac);
    let blob =
        Coordinator::oneshot(config, |c| async move { c.fetch_settings(&mac).await }).await?;

    let rendered = output::render_single(
        global.output,
        &blob,
        |b| output::render_table(&rows(b)),
        plain,
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
