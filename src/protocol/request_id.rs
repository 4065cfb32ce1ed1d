//! Correlation id type for app-server messages.
//!
//! The wire allows any JSON number or a string under the `id` slot. The
//! bridge only ever issues integers, but the peer may use strings or
//! non-integral numbers for the requests it initiates, so every shape must
//! round-trip unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Identifier linking a request to its response or error.
///
/// Serialized untagged: a numeric id is written as the number, `String("a")`
/// as `"a"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(Number),
    String(String),
}

impl RequestId {
    /// Extract the id from a decoded value sitting in the `id` slot.
    ///
    /// Any number or string is accepted. Floats without a fractional part
    /// are folded to integers so `1.0` correlates with `1`. Returns `None`
    /// for nulls, booleans, arrays and objects.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self::Number(normalize(n))),
            Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }
}

fn normalize(n: &Number) -> Number {
    let integral = n
        .as_f64()
        .filter(|f| n.is_f64() && f.fract() == 0.0)
        .filter(|f| *f >= i64::MIN as f64 && *f < i64::MAX as f64);
    match integral {
        Some(f) => Number::from(f as i64),
        None => n.clone(),
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        Self::Number(Number::from(id))
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::String(id.to_string())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self::String(id)
    }
}
