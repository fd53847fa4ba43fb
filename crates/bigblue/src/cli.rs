//! Clap derive structures for the `bigblue` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use bigblue_core::TransportMode;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// bigblue -- monitor and control Big Blue battery systems
#[derive(Debug, Parser)]
#[command(
    name = "bigblue",
    version,
    about = "Monitor and control Big Blue battery systems",
    long_about = "Polls the Powafree cloud (and optionally the battery's local API)\n\
        for telemetry and settings, and writes control settings back.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "BIGBLUE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Account e-mail (overrides profile)
    #[arg(long, env = "BIGBLUE_EMAIL", global = true)]
    pub email: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "BIGBLUE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Telemetry transport (overrides profile)
    #[arg(long, env = "BIGBLUE_TRANSPORT", global = true)]
    pub transport: Option<TransportArg>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportArg {
    /// Local API first when the device has an address, cloud otherwise
    Auto,
    /// Local API only
    Local,
    /// Cloud only
    Cloud,
}

impl From<TransportArg> for TransportMode {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Auto => Self::Auto,
            TransportArg::Local => Self::Local,
            TransportArg::Cloud => Self::Cloud,
        }
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List discovered batteries and their availability
    #[command(alias = "ls")]
    Devices,

    /// Show the latest snapshot of every (or one) battery
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Keep polling and print a line per cycle until Ctrl-C
    Watch(WatchArgs),

    /// Change a battery setting
    Set(SetArgs),

    /// Print a battery's raw settings blob
    Settings(SettingsArgs),

    /// Show every entity value for every (or one) battery
    Entities(EntitiesArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),
}

// ── Read commands ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Battery MAC address (any separator, any case)
    pub mac: Option<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Polling interval, e.g. "30s" or "2m" (overrides profile)
    #[arg(long, short = 'i', value_parser = humantime::parse_duration)]
    pub interval: Option<Duration>,
}

#[derive(Debug, Args)]
pub struct SettingsArgs {
    /// Battery MAC address
    pub mac: String,
}

#[derive(Debug, Args)]
pub struct EntitiesArgs {
    /// Battery MAC address
    pub mac: Option<String>,
}

// ── Set ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SetArgs {
    #[command(subcommand)]
    pub command: SetCommand,
}

#[derive(Debug, Subcommand)]
pub enum SetCommand {
    /// Select the operating mode (1|2|3 or its name)
    Mode {
        mac: String,
        /// battery-priority, micro-inverter-priority, custom-schedule
        mode: String,
    },

    /// Discharge floor in percent (5-50)
    Discharge { mac: String, pct: u8 },

    /// Charge ceiling in percent (50-100)
    Charge { mac: String, pct: u8 },

    /// Output power in percent (5-100)
    OutputPower { mac: String, pct: u8 },

    /// Overlay any settings field; VALUE is parsed as JSON, else taken as text
    Param {
        mac: String,
        field: String,
        value: String,
    },

    /// Write through an entity: a number, or on/off for mode switches
    Entity {
        mac: String,
        /// Entity key, e.g. "power_factor" or "mode_2"
        key: String,
        value: String,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or replace a profile
    Init(ConfigInitArgs),

    /// Show the configuration with secrets masked
    Show,

    /// Print the config file location
    Path,

    /// Store a profile's password in the system keyring
    SetPassword,
}

#[derive(Debug, Args)]
pub struct ConfigInitArgs {
    /// Read the password from this environment variable instead of storing it
    #[arg(long)]
    pub password_env: Option<String>,

    /// Cloud base URL override
    #[arg(long)]
    pub base_url: Option<String>,

    /// Enable the local API fast path
    #[arg(long)]
    pub local_api: bool,

    /// Store the password in the config file instead of the keyring
    #[arg(long)]
    pub plaintext: bool,

    /// Make this the default profile
    #[arg(long)]
    pub default: bool,
}
