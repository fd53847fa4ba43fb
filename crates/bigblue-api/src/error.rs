use thiserror::Error;

/// Envelope result codes returned by the Powafree cloud.
pub mod codes {
    /// Request succeeded; `data` carries the payload.
    pub const SUCCESS: i64 = 0;
    /// The device exists but is not reporting.
    pub const DEVICE_OFFLINE: i64 = 1002;
    /// The session token was rejected and must be renewed.
    pub const INVALID_TOKEN: i64 = 1009;
    /// No record exists for the requested device.
    pub const RECORD_NOT_FOUND: i64 = 1013;
}

/// Top-level error type for the `bigblue-api` crate.
///
/// Covers authentication, transport, and envelope-level failures for both
/// the cloud and the local transport. `bigblue-core` decides which of these
/// become "no data" and which abort a polling cycle.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login was rejected or returned an unusable session.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// An authenticated call was attempted without a session.
    #[error("Not authenticated -- call authenticate() first")]
    NotAuthenticated,

    /// The server rejected the session token (code 1009).
    #[error("Session token expired -- re-authentication required")]
    TokenExpired,

    // ── Device ──────────────────────────────────────────────────────
    /// A device-scoped call was made with an empty device identifier.
    #[error("No device identifier supplied")]
    MissingDevice,

    /// The cloud has no record for the device (code 1013).
    #[error("Device not found")]
    DeviceNotFound,

    /// The device is known but offline (code 1002).
    #[error("Device offline")]
    DeviceOffline,

    /// The cloud returned no settings to modify; uploading would reset
    /// the device to factory values.
    #[error("Current settings unavailable for {mac}")]
    SettingsUnavailable { mac: String },

    // ── Envelope ────────────────────────────────────────────────────
    /// Any other non-zero envelope code.
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    /// Non-success HTTP status, with a preview of the body.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, ...)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Map a non-zero envelope code to its error.
    pub fn from_code(code: i64, message: Option<String>) -> Self {
        match code {
            codes::INVALID_TOKEN => Self::TokenExpired,
            codes::RECORD_NOT_FOUND => Self::DeviceNotFound,
            codes::DEVICE_OFFLINE => Self::DeviceOffline,
            _ => Self::Api {
                code,
                message: message.unwrap_or_else(|| format!("code={code}")),
            },
        }
    }

    /// Returns `true` for expected "no data" outcomes that are logged at
    /// warn rather than treated as failures.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::DeviceNotFound | Self::DeviceOffline)
    }

    /// Returns `true` if this error indicates auth has expired
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::TokenExpired | Self::NotAuthenticated)
    }

    /// Returns `true` if this is a transient error worth retrying on the
    /// next cycle.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => *status >= 500,
            Self::DeviceOffline => true,
            _ => false,
        }
    }

    /// The envelope code behind this error, if it came from one.
    pub fn api_code(&self) -> Option<i64> {
        match self {
            Self::TokenExpired => Some(codes::INVALID_TOKEN),
            Self::DeviceNotFound => Some(codes::RECORD_NOT_FOUND),
            Self::DeviceOffline => Some(codes::DEVICE_OFFLINE),
            Self::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// First 200 characters of a response body, for error messages.
pub(crate) fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
