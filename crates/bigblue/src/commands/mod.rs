//! Command dispatch: bridges CLI args -> coordinator -> output formatting.

pub mod config_cmd;
pub mod devices;
pub mod entities;
pub mod set;
pub mod settings;
pub mod status;
pub mod util;
pub mod watch;

use bigblue_core::CoordinatorConfig;

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Resolve the account for commands that talk to the cloud.
fn account(global: &GlobalOpts) -> Result<CoordinatorConfig, CliError> {
    config::build_coordinator_config(global)
}

/// Dispatch a command to its handler. Only account-bound commands
/// resolve credentials; `config` works without any.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Devices => devices::handle(account(global)?, global).await,
        Command::Status(args) => status::handle(account(global)?, args, global).await,
        Command::Watch(args) => watch::handle(account(global)?, args, global).await,
        Command::Set(args) => set::handle(account(global)?, args, global).await,
        Command::Settings(args) => settings::handle(account(global)?, args, global).await,
        Command::Entities(args) => entities::handle(account(global)?, args, global).await,
    }
}
