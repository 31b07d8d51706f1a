//! Progress/log line emitted by business logic.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One line of live output fanned out to session subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogLine(String);

impl LogLine {
    /// Create a new log line.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Borrow the text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the owned text.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogLine {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for LogLine {
    fn from(value: String) -> Self {
        Self(value)
    }
}
