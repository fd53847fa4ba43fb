// ── Core error types ──
//
// User-facing errors from bigblue-core. Consumers never see envelope codes
// or JSON parse failures directly; the `From<bigblue_api::Error>` impl
// translates them into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Cycle errors ─────────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Update failed: {message}")]
    UpdateFailed { message: String },

    #[error("No devices registered to this account")]
    NoDevices,

    #[error("Coordinator is not running")]
    CoordinatorStopped,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Operation rejected by the cloud: {message}")]
    Rejected { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// Envelope code, when the cloud returned one.
        code: Option<i64>,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<bigblue_api::Error> for CoreError {
    fn from(err: bigblue_api::Error) -> Self {
        use bigblue_api::Error as ApiError;

        let code = err.api_code();
        match err {
            ApiError::Authentication { message } => CoreError::AuthenticationFailed { message },
            ApiError::NotAuthenticated | ApiError::TokenExpired => {
                CoreError::AuthenticationFailed {
                    message: err.to_string(),
                }
            }
            ApiError::MissingDevice => CoreError::validation("no device identifier supplied"),
            ApiError::DeviceNotFound => CoreError::DeviceNotFound {
                identifier: "unknown to the cloud".into(),
            },
            ApiError::DeviceOffline => CoreError::Api {
                message: "device offline".into(),
                code,
                status: None,
            },
            ApiError::Api { message, .. } => CoreError::Api {
                message,
                code,
                status: None,
            },
            ApiError::Http { status, body } => CoreError::Api {
                message: format!("HTTP {status}: {body}"),
                code: None,
                status: Some(status),
            },
            ApiError::Transport(ref e) => CoreError::Api {
                message: e.to_string(),
                code: None,
                status: e.status().map(|s| s.as_u16()),
            },
            ApiError::SettingsUnavailable { .. } => CoreError::Rejected {
                message: err.to_string(),
            },
            ApiError::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ApiError::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("unexpected response: {message}"),
                code: None,
                status: None,
            },
        }
    }
}
