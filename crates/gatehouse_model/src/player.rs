use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::Value;
use crate::PlayerId;

/// Keys used by the record itself. Backend-specific fields must not shadow them.
pub const RESERVED_FIELDS: [&str; 3] = ["id", "name", "firstSeen"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub id: PlayerId,
    /// Last known display name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<DateTime<Utc>>,
    /// Backend-specific fields, stored next to the known ones.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PlayerRecord {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            first_seen: Some(Utc::now()),
            extra: Default::default(),
        }
    }

    /// Case-insensitive substring match on the display name. `needle` must
    /// already be lower-cased.
    pub fn name_contains(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
    }

    pub fn get_extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn is_reserved_field(key: &str) -> bool {
        RESERVED_FIELDS.contains(&key)
    }
}
