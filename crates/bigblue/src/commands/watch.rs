//! `watch`: keep the coordinator running and print one line per cycle.

use chrono::Local;
use serde::Serialize;

use bigblue_core::{Coordinator, CoordinatorConfig, FleetSnapshot, UpdateStatus};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct CycleLine<'a> {
    cycle: u64,
    healthy: bool,
    error: Option<&'a str>,
    fleet: &'a FleetSnapshot,
}

fn summary(status: &UpdateStatus, fleet: &FleetSnapshot, color: bool) -> String {
    let stamp = Local::now().format("%H:%M:%S");
    if let Some(ref error) = status.last_error {
        let text = format!("refresh failed: {error}");
        return format!("{stamp}  {}", output::status_text(&text, false, color));
    }
    let devices = fleet
        .devices
        .values()
        .map(|d| {
            format!(
                "{} {:.1}% {:+.0}W pv {:.0}W",
                d.name, d.telemetry.soc, d.telemetry.power, d.telemetry.pv_total_power
            )
        })
        .chain(
            fleet
                .unavailable
                .iter()
                .map(|(mac, reason)| output::dim(&format!("{mac} {reason}"), color)),
        )
        .collect::<Vec<_>>()
        .join("  |  ");
    format!("{stamp}  {devices}")
}

fn render(
    format: OutputFormat,
    status: &UpdateStatus,
    fleet: &FleetSnapshot,
    color: bool,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            let line = CycleLine {
                cycle: status.cycles,
                healthy: status.is_healthy(),
                error: status.last_error.as_deref(),
                fleet,
            };
            Ok(serde_json::to_string(&line)?)
        }
        OutputFormat::Table | OutputFormat::Plain => Ok(summary(status, fleet, color)),
    }
}

pub async fn handle(
    mut config: CoordinatorConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(interval) = args.interval {
        config.update_interval = interval;
    }
    if config.update_interval.is_zero() {
        config.update_interval = CoordinatorConfig::DEFAULT_INTERVAL;
    }

    let coordinator = Coordinator::new(config)?;
    let mut status_rx = coordinator.subscribe_status();
    if let Err(e) = coordinator.start().await {
        coordinator.stop().await;
        return Err(e.into());
    }

    let color = output::should_color(global.color);
    let print = |status: &UpdateStatus| -> Result<(), CliError> {
        let line = render(global.output, status, &coordinator.snapshot(), color)?;
        output::print_output(&line, global.quiet);
        Ok(())
    };

    print(&status_rx.borrow_and_update().clone())?;

    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let status = status_rx.borrow_and_update().clone();
                if let Err(e) = print(&status) {
                    break Err(e);
                }
            }
        }
    };

    coordinator.stop().await;
    tracing::debug!("watch ended");
    result
}
