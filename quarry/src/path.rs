//! Field path evaluation over arbitrary record shapes.
//!
//! Paths use dot segments and bracket indexes: `owner.tags[0].name`.
//! A key segment applied to a list is mapped over its elements.

use crate::value::Value;
use crate::{Error, Result};
use serde::Serialize;

/// Resolves a field path against one record
pub trait PathEvaluator<R: ?Sized>: Send + Sync {
    fn eval_path(&self, record: &R, path: &str) -> Result<Value>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

fn parse_path(path: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut key = String::new();
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !key.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut key)));
                }
            }
            '[' => {
                if !key.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut key)));
                }
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(d) => digits.push(d),
                        None => {
                            return Err(Error::Path(format!("Unclosed '[' in path '{}'", path)))
                        }
                    }
                }
                let index = digits.trim().parse::<usize>().map_err(|_| {
                    Error::Path(format!("Invalid index '{}' in path '{}'", digits, path))
                })?;
                segments.push(Segment::Index(index));
            }
            _ => key.push(c),
        }
    }
    if !key.is_empty() {
        segments.push(Segment::Key(key));
    }
    if segments.is_empty() {
        return Err(Error::Path("Empty path".to_string()));
    }
    Ok(segments)
}

fn step(current: &serde_json::Value, segment: &Segment, path: &str) -> Result<serde_json::Value> {
    use serde_json::Value as Json;

    match (segment, current) {
        (_, Json::Null) => Ok(Json::Null),
        (Segment::Key(key), Json::Object(map)) => Ok(map.get(key).cloned().unwrap_or(Json::Null)),
        (Segment::Key(_), Json::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match step(item, segment, path)? {
                    Json::Null => {}
                    Json::Array(nested) => out.extend(nested),
                    other => out.push(other),
                }
            }
            Ok(Json::Array(out))
        }
        (Segment::Index(i), Json::Array(items)) => Ok(items.get(*i).cloned().unwrap_or(Json::Null)),
        (Segment::Key(key), other) => Err(Error::Path(format!(
            "Cannot read key '{}' of a non-object value {} in path '{}'",
            key, other, path
        ))),
        (Segment::Index(i), other) => Err(Error::Path(format!(
            "Cannot index [{}] into non-list value {} in path '{}'",
            i, other, path
        ))),
    }
}

/// Path evaluator for JSON documents
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPathEvaluator;

impl PathEvaluator<serde_json::Value> for JsonPathEvaluator {
    fn eval_path(&self, record: &serde_json::Value, path: &str) -> Result<Value> {
        let segments = parse_path(path)?;
        let mut iter = segments.iter();
        let Some(first) = iter.next() else {
            return Ok(Value::Null);
        };
        let mut current = step(record, first, path)?;
        for segment in iter {
            current = step(&current, segment, path)?;
        }
        Ok(Value::from(current))
    }
}

/// Path evaluator for any serializable record (structs, maps).
///
/// The record is serialized to JSON on each evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdePathEvaluator;

impl<R: Serialize> PathEvaluator<R> for SerdePathEvaluator {
    fn eval_path(&self, record: &R, path: &str) -> Result<Value> {
        let json = serde_json::to_value(record)
            .map_err(|e| Error::Path(format!("Record is not serializable: {}", e)))?;
        JsonPathEvaluator.eval_path(&json, path)
    }
}

/// Extract every value at `path`.
///
/// Evaluation failures and absent paths yield no values; lists yield one value
/// per element.
pub fn extract<R: ?Sized>(evaluator: &dyn PathEvaluator<R>, record: &R, path: &str) -> Vec<Value> {
    match evaluator.eval_path(record, path) {
        Ok(Value::Null) => Vec::new(),
        Ok(Value::List(items)) => items,
        Ok(value) => vec![value],
        Err(e) => {
            tracing::trace!(path, error = %e, "field extraction failed, treating as no value");
            Vec::new()
        }
    }
}

/// Extract the raw value at `path`, `Null` when evaluation fails.
pub fn extract_value<R: ?Sized>(evaluator: &dyn PathEvaluator<R>, record: &R, path: &str) -> Value {
    evaluator.eval_path(record, path).unwrap_or(Value::Null)
}
