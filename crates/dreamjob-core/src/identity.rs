//! Authenticated user identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable key identifying an authenticated user for the lifetime of a login.
///
/// Identities are normalized emails: surrounding whitespace is trimmed and the
/// value is lowercased, so `" Alice@Example.com "` and `"alice@example.com"`
/// map to the same session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct UserIdentity(String);

impl UserIdentity {
    /// Create an identity from a raw email, normalizing it.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    /// Borrow the normalized value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UserIdentity {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<UserIdentity> for String {
    fn from(value: UserIdentity) -> Self {
        value.0
    }
}
