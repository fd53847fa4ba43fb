//! CLI configuration: thin wrapper around `bigblue_config`.
//!
//! Adds the flag overrides from `GlobalOpts` (--email, --transport) on top
//! of the selected profile.

use bigblue_config::{Config, ConfigError, Profile};
use bigblue_core::CoordinatorConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use bigblue_config::{config_path, load_config, save_config};

/// Translate the active profile plus global flags into a
/// `CoordinatorConfig`.
///
/// Without a matching profile, `--email` (or `BIGBLUE_EMAIL`) plus a
/// password from the environment or keyring is enough.
pub fn build_coordinator_config(global: &GlobalOpts) -> Result<CoordinatorConfig, CliError> {
    let cfg = load_config()?;
    let (name, mut profile) = select_profile(&cfg, global)?;

    if let Some(ref email) = global.email {
        profile.email.clone_from(email);
    }
    if let Some(transport) = global.transport {
        profile.transport = Some(transport.into());
    }

    let config = bigblue_config::profile_to_coordinator_config(&cfg.defaults, &profile, &name)
        .map_err(|e| match e {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            other => other.into(),
        })?;
    tracing::debug!(profile = %name, email = %config.email, "resolved account");
    Ok(config)
}

fn select_profile(cfg: &Config, global: &GlobalOpts) -> Result<(String, Profile), CliError> {
    match cfg.profile(global.profile.as_deref()) {
        Ok((name, profile)) => Ok((name.to_owned(), profile.clone())),
        Err(ConfigError::UnknownProfile { profile, .. })
            if global.email.is_some() && global.profile.is_none() =>
        {
            Ok((profile, Profile::default()))
        }
        Err(e) => Err(e.into()),
    }
}
