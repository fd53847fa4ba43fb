// ── Device identity ──
//
// The cloud keys every device by its Bluetooth MAC (`bleMac`) and expects
// it back byte-for-byte, so the value is kept as received.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Device identifier as the cloud reports it (surrounding whitespace trimmed).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacAddress(String);

impl MacAddress {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Case- and separator-insensitive comparison, for matching user input.
    pub fn matches(&self, input: &str) -> bool {
        fn hex(s: &str) -> impl Iterator<Item = char> + '_ {
            s.chars()
                .filter(char::is_ascii_alphanumeric)
                .map(|c| c.to_ascii_lowercase())
        }
        hex(&self.0).eq(hex(input))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MacAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for MacAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
