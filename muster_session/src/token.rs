use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// An opaque bearer credential proving the current session to the platform.
///
/// The value is never empty: construction rejects empty input, so holding a
/// `BearerToken` means holding a credential. `Debug` and `Display` redact the
/// token body; use the alternate form (`{:#}`) to reveal a short prefix when
/// diagnosing a live session.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BearerToken(String);

/// The error returned when constructing a [`BearerToken`] from an empty string
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("bearer tokens must not be empty")]
pub struct EmptyToken;

impl BearerToken {
    /// Constructs a token, rejecting empty input
    pub fn new(raw: impl Into<String>) -> Result<Self, EmptyToken> {
        let raw = raw.into();
        if raw.is_empty() {
            Err(EmptyToken)
        } else {
            Ok(Self(raw))
        }
    }

    /// Constructs a token from a static string, panicking if empty
    ///
    /// Intended for tests and examples.
    pub fn from_static(raw: &'static str) -> Self {
        assert!(!raw.is_empty(), "bearer tokens must not be empty");
        Self(raw.to_owned())
    }

    /// The raw token value
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwraps the token into its raw value
    #[inline]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for BearerToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        BearerToken::new(raw).map_err(serde::de::Error::custom)
    }
}

const REVEAL_PREFIX: usize = 8;

fn limited_reveal(token: &str, f: &mut fmt::Formatter) -> fmt::Result {
    match token.char_indices().nth(REVEAL_PREFIX) {
        Some((idx, _)) => {
            f.write_str(&token[..idx])?;
            f.write_str("…")
        }
        None => f.write_str(token),
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            f.write_str("\"")?;
            limited_reveal(&self.0, f)?;
            f.write_str("\"")
        } else {
            f.write_str("***BEARER TOKEN***")
        }
    }
}

impl fmt::Display for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            limited_reveal(&self.0, f)
        } else {
            f.write_str("***BEARER TOKEN***")
        }
    }
}
