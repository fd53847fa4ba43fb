// Login session state
//
// A session is immutable once built. Re-authentication produces a new
// `Arc<Session>` that replaces the old one wholesale, so concurrent
// requests always see a consistent token/user pair.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Account identifier returned by login.
///
/// The cloud has returned it both as a JSON number and as a string, and it
/// must be echoed back in the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Numeric(i64),
    Text(String),
}

impl UserId {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(s) if s.is_empty())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// An authenticated session against the cloud.
#[derive(Clone)]
pub struct Session {
    token: SecretString,
    user_id: UserId,
    name: Option<String>,
}

impl Session {
    pub fn new(token: SecretString, user_id: UserId, name: Option<String>) -> Self {
        Self {
            token,
            user_id,
            name,
        }
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Account display name, when login returned one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// `true` when both the token and the user id are usable.
    pub fn is_valid(&self) -> bool {
        !self.token.expose_secret().is_empty() && !self.user_id.is_empty()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .finish()
    }
}
