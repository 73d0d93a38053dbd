//! Value ordering for range bounds and result sorting.

use quarry::value::coerce;
use quarry::Value;
use std::cmp::Ordering;

/// Compare a record value `a` against a bound `b`.
///
/// Dispatch follows the runtime type of `a`: `b` is coerced to that type
/// before comparing. A null `a` is less than everything. When `b` cannot be
/// coerced, or `a` is not a string or number, both sides compare by their
/// string form.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match a {
        Value::Null => Ordering::Less,
        Value::Str(s) => s.as_str().cmp(coerce::to_string(b).as_str()),
        Value::Int(n) => match coerce::to_int(b) {
            Some(other) => n.cmp(&other),
            None => compare_strings(a, b),
        },
        Value::Long(n) => match coerce::to_long(b) {
            Some(other) => n.cmp(&other),
            None => compare_strings(a, b),
        },
        Value::Float(n) => match coerce::to_float(b) {
            Some(other) => n.total_cmp(&other),
            None => compare_strings(a, b),
        },
        Value::Double(n) => match coerce::to_double(b) {
            Some(other) => n.total_cmp(&other),
            None => compare_strings(a, b),
        },
        Value::Bool(_) | Value::List(_) | Value::Map(_) => compare_strings(a, b),
    }
}

fn compare_strings(a: &Value, b: &Value) -> Ordering {
    coerce::to_string(a).cmp(&coerce::to_string(b))
}

fn sort_rank(value: &Value) -> u8 {
    match value {
        Value::Int(_) | Value::Long(_) | Value::Float(_) | Value::Double(_) => 0,
        Value::Str(_) => 1,
        Value::Bool(_) => 2,
        Value::List(_) | Value::Map(_) => 3,
        Value::Null => 4,
    }
}

/// Total order used for sorting result sets: numbers, then strings, then
/// booleans, then compound values, with nulls last.
pub fn sort_order(a: &Value, b: &Value) -> Ordering {
    let rank = sort_rank(a).cmp(&sort_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(_) | Value::Long(_), Value::Int(_) | Value::Long(_)) => {
            match (coerce::to_long(a), coerce::to_long(b)) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => Ordering::Equal,
            }
        }
        _ if a.is_number() => match (coerce::to_double(a), coerce::to_double(b)) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => Ordering::Equal,
        },
        _ => compare_strings(a, b),
    }
}
