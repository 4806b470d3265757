use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub mod coerce;
pub mod player;
pub mod value;

pub use coerce::{CoerceError, FromValue};
pub use value::{split_path, Mapping, Value};

/// Stable, backend-assigned player identifier (numeric id or GUID rendered as text).
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, PartialOrd, Ord, Hash, Default)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        PlayerId(value)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        PlayerId(String::from(value))
    }
}

impl From<PlayerId> for String {
    fn from(value: PlayerId) -> Self {
        value.0
    }
}

impl Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::borrow::Borrow<str> for PlayerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
