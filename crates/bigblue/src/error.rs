//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use bigblue_config::ConfigError;
use bigblue_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Cloud ────────────────────────────────────────────────────────
    #[error("Could not refresh battery data: {message}")]
    #[diagnostic(
        code(bigblue::update_failed),
        help(
            "Check your e-mail and password and that the Powafree cloud is reachable.\n\
             Run with -vv for request-level logs."
        )
    )]
    UpdateFailed { message: String },

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(bigblue::auth_failed),
        help("Run: bigblue config set-password --profile {profile}")
    )]
    AuthFailed { profile: String, message: String },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(bigblue::no_credentials),
        help(
            "Configure one with: bigblue config init --profile {profile}\n\
             Or set the BIGBLUE_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String },

    #[error("No batteries are registered to this account")]
    #[diagnostic(
        code(bigblue::no_devices),
        help("Pair the battery in the vendor app first.")
    )]
    NoDevices,

    #[error("Battery '{identifier}' not found")]
    #[diagnostic(
        code(bigblue::not_found),
        help("Run: bigblue devices to see available batteries")
    )]
    NotFound { identifier: String },

    #[error("The cloud rejected the change: {message}")]
    #[diagnostic(code(bigblue::rejected))]
    Rejected { message: String },

    #[error("API error: {message}")]
    #[diagnostic(code(bigblue::api_error))]
    Api { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(bigblue::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(bigblue::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: bigblue config init --profile {name} --email <EMAIL>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No account configured")]
    #[diagnostic(
        code(bigblue::no_config),
        help(
            "Create a profile with: bigblue config init --email <EMAIL>\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Keyring error: {message}")]
    #[diagnostic(code(bigblue::keyring))]
    Keyring { message: String },

    #[error(transparent)]
    #[diagnostic(code(bigblue::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    #[diagnostic(code(bigblue::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UpdateFailed { .. } | Self::Api { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::NoDevices => exit_code::NOT_FOUND,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },
            CoreError::UpdateFailed { message } => CliError::UpdateFailed { message },
            CoreError::NoDevices => CliError::NoDevices,
            CoreError::CoordinatorStopped => CliError::UpdateFailed {
                message: "the coordinator is not running".into(),
            },
            CoreError::DeviceNotFound { identifier } => CliError::NotFound { identifier },
            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::Rejected { message } => CliError::Rejected { message },
            CoreError::Api { message, .. } => CliError::Api { message },
            CoreError::Config { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { profile, available } => {
                if available.is_empty() {
                    CliError::NoConfig {
                        path: bigblue_config::config_path().display().to_string(),
                    }
                } else {
                    CliError::ProfileNotFound {
                        name: profile,
                        available: available.join(", "),
                    }
                }
            }
            ConfigError::Keyring(e) => CliError::Keyring {
                message: e.to_string(),
            },
            other => CliError::Config(Box::new(other)),
        }
    }
}
