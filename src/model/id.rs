//! Application identifier.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Externally assigned identifier naming one object across a whole source
/// hierarchy for a run.
///
/// Ordered so that unordered pairs can be stored canonically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ApplicationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ApplicationId {
    fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for ApplicationId {
    fn from(s: String) -> Self { Self(s) }
}

impl From<&ApplicationId> for ApplicationId {
    fn from(id: &ApplicationId) -> Self { id.clone() }
}
