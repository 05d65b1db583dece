//! Correlation token shared by every record of one run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier attached to every record leaving a buffer, so a downstream
/// consumer can group records produced by the same run.
///
/// The engine does not generate tokens; the owner of the buffer picks one
/// (typically a random UUID) and injects it at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrelationToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
