// ── Runtime coordinator configuration ──
//
// These types describe how to reach one Powafree account. They carry the
// credentials and polling tuning but never touch disk; the CLI builds a
// `CoordinatorConfig` from its profile and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

/// Which path telemetry is read through.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransportMode {
    /// Local first when the device advertises an address, cloud otherwise.
    #[default]
    Auto,
    /// Local only, unless local access is impossible for the device.
    Local,
    /// Cloud only.
    Cloud,
}

/// Whether the local fast path may be used at all. Resolved once when the
/// coordinator is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalCapability {
    Available,
    Unavailable,
}

/// Configuration for one account.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Cloud base URL. `None` uses `http://www.powafree.com`.
    pub base_url: Option<Url>,
    pub email: String,
    pub password: SecretString,
    /// Time between polling cycles. Zero disables periodic polling;
    /// on-demand refreshes still run.
    pub update_interval: Duration,
    /// Budget for each cloud request.
    pub timeout: Duration,
    pub transport: TransportMode,
    /// Enables the local fast path.
    pub local_api: bool,
}

impl CoordinatorConfig {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(email: impl Into<String>, password: SecretString) -> Self {
        Self {
            base_url: None,
            email: email.into(),
            password,
            update_interval: Self::DEFAULT_INTERVAL,
            timeout: Self::DEFAULT_TIMEOUT,
            transport: TransportMode::Auto,
            local_api: false,
        }
    }

    pub fn local_capability(&self) -> LocalCapability {
        if self.local_api {
            LocalCapability::Available
        } else {
            LocalCapability::Unavailable
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn transport_mode_parses_lowercase() {
        assert_eq!("local".parse::<TransportMode>().unwrap(), TransportMode::Local);
        assert_eq!(TransportMode::Cloud.to_string(), "cloud");
        assert!("lan".parse::<TransportMode>().is_err());
    }

    #[test]
    fn local_capability_follows_flag() {
        let mut config = CoordinatorConfig::new("a@b.c", "pw".into());
        assert_eq!(config.local_capability(), LocalCapability::Unavailable);
        config.local_api = true;
        assert_eq!(config.local_capability(), LocalCapability::Available);
    }
}
