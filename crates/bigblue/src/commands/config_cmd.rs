//! Config subcommand handlers.

use std::fmt::Write as _;

use bigblue_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, ConfigInitArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking the plaintext password.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "interval = {}", cfg.defaults.interval);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "transport = \"{}\"", cfg.defaults.transport);
    let _ = writeln!(out, "local_api = {}", cfg.defaults.local_api);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "email = \"{}\"", p.email);
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"{MASK}\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        if let Some(ref url) = p.base_url {
            let _ = writeln!(out, "base_url = \"{url}\"");
        }
        if let Some(interval) = p.interval {
            let _ = writeln!(out, "interval = {interval}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(transport) = p.transport {
            let _ = writeln!(out, "transport = \"{transport}\"");
        }
        if let Some(local_api) = p.local_api {
            let _ = writeln!(out, "local_api = {local_api}");
        }
    }

    out.trim_end().to_owned()
}

/// A copy safe to serialize: plaintext passwords replaced by the mask.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(MASK.into());
        }
    }
    cfg
}

fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_password() -> Result<String, CliError> {
    let password = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(password)
}

/// Build the profile `config init` writes. The password, when given,
/// goes to the keyring unless `plaintext` is set.
fn init_profile(
    args: &ConfigInitArgs,
    global: &GlobalOpts,
    password: Option<String>,
) -> Result<Profile, CliError> {
    let Some(email) = global.email.clone() else {
        return Err(CliError::Validation {
            field: "email".into(),
            reason: "pass --email <EMAIL> (or set BIGBLUE_EMAIL)".into(),
        });
    };

    Ok(Profile {
        email,
        password: password.filter(|_| args.plaintext),
        password_env: args.password_env.clone(),
        base_url: args.base_url.clone(),
        transport: global.transport.map(Into::into),
        local_api: args.local_api.then_some(true),
        ..Profile::default()
    })
}

fn init(args: &ConfigInitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load_config()?;
    let profile_name = global
        .profile
        .clone()
        .unwrap_or_else(|| cfg.active_profile_name(None).to_owned());

    // Checked before prompting so a missing e-mail fails fast.
    init_profile(args, global, None)?;

    let password = if args.password_env.is_some() {
        None
    } else {
        Some(prompt_password()?)
    };
    let profile = init_profile(args, global, password.clone())?;

    if let Some(ref password) = password {
        if args.plaintext {
            eprintln!("   Password saved to the config file (plaintext)");
        } else {
            bigblue_config::store_password(&profile_name, password)?;
            eprintln!("   Password stored in system keyring");
        }
    }

    cfg.profiles.insert(profile_name.clone(), profile);
    if args.default || cfg.profiles.len() == 1 {
        cfg.default_profile = Some(profile_name.clone());
    }
    let path = config::save_config(&cfg)?;

    eprintln!("Configuration written to {}", path.display());
    eprintln!("  Profile: {profile_name}");
    eprintln!("\n  Test it: bigblue devices");
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init(init_args) => init(&init_args, global),

        ConfigCommand::Show => {
            let cfg = redacted(&bigblue_config::load_config_or_default());
            let out = output::render_single(global.output, &cfg, format_config_redacted, |_| {
                config::config_path().display().to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let cfg = config::load_config()?;
            let (name, _) = cfg.profile(global.profile.as_deref())?;
            let password = prompt_password()?;
            bigblue_config::store_password(name, &password)?;
            eprintln!("Password for profile '{name}' stored in system keyring");
            Ok(())
        }
    }
}
