//! Device state machines, one per component kind, plus the solar model
//! the lights follow.

pub mod aplayer;
pub mod feeder;
pub mod keypanel;
pub mod lights;
pub mod sun;

use serde::Serialize;
use serde_json::Value;

use crate::error::ProtocolError;

/// A boolean field of a `change-state` payload. `0` and `1` are accepted
/// as well.
pub(crate) fn flag(field: &str, value: &Value) -> Result<bool, ProtocolError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_u64() == Some(0) => Ok(false),
        Value::Number(n) if n.as_u64() == Some(1) => Ok(true),
        other => Err(ProtocolError::Malformed(format!(
            "{field}: expected true/false or 0/1, got {other}"
        ))),
    }
}

/// A finite, non-negative number rounded to the nearest integer.
pub(crate) fn whole(field: &str, value: &Value) -> Result<u64, ProtocolError> {
    match value.as_f64() {
        Some(n) if n.is_finite() && n >= 0.0 => Ok(n.round() as u64),
        _ => Err(ProtocolError::Malformed(format!(
            "{field}: expected a non-negative number, got {value}"
        ))),
    }
}

/// Params rendered for `get-params`.
pub(crate) fn to_object<T: Serialize>(params: &T) -> Value {
    serde_json::to_value(params).unwrap_or_default()
}
