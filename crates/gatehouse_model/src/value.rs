use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Serialize;

/// Mapping node. Keys are kept sorted so a serialized document is always
/// written in the same order.
pub type Mapping = BTreeMap<String, Value>;

/// Node of a persisted document tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

/// Splits a dotted path (`a.b.c`) into segments. Empty segments are skipped,
/// so `""` addresses the document root.
pub fn split_path(dotted: &str) -> Vec<&str> {
    dotted.split('.').filter(|s| !s.is_empty()).collect()
}

impl Value {
    pub fn mapping() -> Self {
        Value::Mapping(Mapping::new())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Follows `path` through nested mappings. Any segment that is missing or
    /// that lands on a non-mapping node yields `None`.
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        let mut node = self;
        for segment in path {
            node = node.as_mapping()?.get(segment.as_ref())?;
        }
        Some(node)
    }

    pub fn get_mut<S: AsRef<str>>(&mut self, path: &[S]) -> Option<&mut Value> {
        let mut node = self;
        for segment in path {
            node = match node {
                Value::Mapping(m) => m.get_mut(segment.as_ref())?,
                _ => return None,
            };
        }
        Some(node)
    }

    pub fn contains<S: AsRef<str>>(&self, path: &[S]) -> bool {
        self.get(path).is_some()
    }

    /// Stores `value` at `path`, creating intermediate mappings. Intermediate
    /// nodes that are not mappings are replaced. Returns the previous value.
    pub fn set<S: AsRef<str>>(&mut self, path: &[S], value: Value) -> Option<Value> {
        let Some((last, parents)) = path.split_last() else {
            return Some(std::mem::replace(self, value));
        };
        let mut node = self;
        for segment in parents {
            node = node
                .force_mapping()
                .entry(segment.as_ref().to_owned())
                .or_insert_with(Value::mapping);
        }
        node.force_mapping().insert(last.as_ref().to_owned(), value)
    }

    /// Removes the node at `path`. Removing the root resets it to an empty mapping.
    pub fn remove<S: AsRef<str>>(&mut self, path: &[S]) -> Option<Value> {
        let Some((last, parents)) = path.split_last() else {
            return Some(std::mem::replace(self, Value::mapping()));
        };
        match self.get_mut(parents)? {
            Value::Mapping(m) => m.remove(last.as_ref()),
            _ => None,
        }
    }

    fn force_mapping(&mut self) -> &mut Mapping {
        if !matches!(self, Value::Mapping(_)) {
            *self = Value::mapping();
        }
        match self {
            Value::Mapping(m) => m,
            _ => unreachable!("node was just replaced with a mapping"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Sequence(value)
    }
}

impl From<Mapping> for Value {
    fn from(value: Mapping) -> Self {
        Value::Mapping(value)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a document value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(i64::try_from(v)
            .map(Value::Int)
            .unwrap_or(Value::Float(v as f64)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut out = Vec::with_capacity(seq.size_hint().unwrap_or_default());
        while let Some(item) = seq.next_element()? {
            out.push(item);
        }
        Ok(Value::Sequence(out))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut out = Mapping::new();
        while let Some((MapKey(key), value)) = map.next_entry()? {
            out.insert(key, value);
        }
        Ok(Value::Mapping(out))
    }
}

/// Mapping key. Hand-edited files often carry unquoted numeric ids as keys,
/// those are read back as their textual form.
struct MapKey(String);

impl<'de> Deserialize<'de> for MapKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MapKeyVisitor)
    }
}

struct MapKeyVisitor;

impl<'de> Visitor<'de> for MapKeyVisitor {
    type Value = MapKey;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a scalar mapping key")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<MapKey, E> {
        Ok(MapKey(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<MapKey, E> {
        Ok(MapKey(v))
    }
}
