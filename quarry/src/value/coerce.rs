//! Scalar coercions used by term equality and range comparison.
//!
//! Every coercion returns `None` when the value cannot be represented in the
//! target type; callers decide how to recover.

use super::Value;

pub fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Value::Int(n) => Some(*n != 0),
        Value::Long(n) => Some(*n != 0),
        _ => None,
    }
}

pub fn to_long(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(i64::from(*n)),
        Value::Long(n) => Some(*n),
        Value::Float(n) if n.is_finite() => Some(*n as i64),
        Value::Double(n) if n.is_finite() => Some(*n as i64),
        Value::Str(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|n| n.is_finite()).map(|n| n as i64))
        }
        _ => None,
    }
}

pub fn to_int(value: &Value) -> Option<i32> {
    match value {
        Value::Int(n) => Some(*n),
        Value::Float(n) if n.is_finite() => Some(*n as i32),
        Value::Double(n) if n.is_finite() => Some(*n as i32),
        other => to_long(other).and_then(|n| i32::try_from(n).ok()),
    }
}

pub fn to_double(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(f64::from(*n)),
        Value::Long(n) => Some(*n as f64),
        Value::Float(n) => Some(f64::from(*n)),
        Value::Double(n) => Some(*n),
        Value::Str(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub fn to_float(value: &Value) -> Option<f32> {
    to_double(value).map(|n| n as f32)
}

pub fn to_string(value: &Value) -> String {
    value.to_string()
}

/// Coerce `literal` to the runtime type of `sample`.
///
/// Only numeric and boolean samples drive a conversion; any other sample
/// returns `None`.
pub fn coerce_like(literal: &Value, sample: &Value) -> Option<Value> {
    match sample {
        Value::Bool(_) => to_bool(literal).map(Value::Bool),
        Value::Int(_) => to_int(literal).map(Value::Int),
        Value::Long(_) => to_long(literal).map(Value::Long),
        Value::Float(_) => to_float(literal).map(Value::Float),
        Value::Double(_) => to_double(literal).map(Value::Double),
        _ => None,
    }
}
