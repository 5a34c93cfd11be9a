use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a playable area, compared by its stable name.
///
/// Two handles with the same name refer to the same place even if the host
/// created them from different in-memory objects (for example after a
/// reload), so networks are always grouped by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationName(String);

impl LocationName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LocationName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for LocationName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for LocationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
