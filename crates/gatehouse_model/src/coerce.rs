//! Conversion of untyped document nodes into the types callers expect.
//!
//! Scalars follow a lenient rule (numbers and booleans may be written as
//! strings, integral floats are accepted as integers). Containers convert
//! element by element and report the path of the first element that fails.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

use thiserror::Error;

use crate::value::Value;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Type mismatch at `{}`: expected {expected}, found {found}", display_path(.path))]
pub struct CoerceError {
    pub path: String,
    pub expected: &'static str,
    pub found: &'static str,
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "<root>"
    } else {
        path
    }
}

impl CoerceError {
    pub fn new(expected: &'static str, found: &Value) -> Self {
        Self {
            path: String::new(),
            expected,
            found: found.kind(),
        }
    }

    /// Prefixes the error path with the segment of the enclosing container.
    pub fn within(mut self, segment: impl Display) -> Self {
        let segment = segment.to_string();
        self.path = if self.path.is_empty() || self.path.starts_with('[') {
            format!("{segment}{}", self.path)
        } else {
            format!("{segment}.{}", self.path)
        };
        self
    }
}

pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, CoerceError>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        Ok(value.clone())
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(CoerceError::new("string", other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Ok(false),
            other => Err(CoerceError::new("boolean", other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| CoerceError::new("float", value)),
            other => Err(CoerceError::new("float", other)),
        }
    }
}

fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 => {
            let truncated = *f as i64;
            (truncated as f64 == *f).then_some(truncated)
        }
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

macro_rules! integer_from_value {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self, CoerceError> {
                    coerce_i64(value)
                        .and_then(|i| <$ty>::try_from(i).ok())
                        .ok_or_else(|| CoerceError::new(stringify!($ty), value))
                }
            }
        )*
    };
}

integer_from_value!(i64, i32, u32, u64, usize);

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        let Value::Sequence(items) = value else {
            return Err(CoerceError::new("sequence", value));
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| T::from_value(item).map_err(|e| e.within(format!("[{i}]"))))
            .collect()
    }
}

fn coerce_entries<T, C>(value: &Value) -> Result<C, CoerceError>
where
    T: FromValue,
    C: FromIterator<(String, T)>,
{
    let Value::Mapping(entries) = value else {
        return Err(CoerceError::new("mapping", value));
    };
    entries
        .iter()
        .map(|(k, v)| {
            T::from_value(v)
                .map(|v| (k.clone(), v))
                .map_err(|e| e.within(k))
        })
        .collect()
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        coerce_entries(value)
    }
}

impl<T: FromValue> FromValue for HashMap<String, T> {
    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        coerce_entries(value)
    }
}
