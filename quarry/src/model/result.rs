use super::query::Query;
use super::request::Field;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult<T> {
    #[serde(default)]
    pub aggs: BTreeMap<String, AggResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<T>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Vec<Value>>>,
    pub total_items: u64,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl<T> Default for SearchResult<T> {
    fn default() -> Self {
        Self {
            aggs: BTreeMap::new(),
            items: None,
            rows: None,
            total_items: 0,
            fields: Vec::new(),
        }
    }
}

impl<T> SearchResult<T> {
    pub fn items_or_empty(&self) -> &[T] {
        self.items.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggResult {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buckets: Option<Vec<Bucket>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Stats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AggResult {
    pub fn with_buckets(key: impl Into<String>, buckets: Vec<Bucket>) -> Self {
        Self {
            key: key.into(),
            buckets: Some(buckets),
            ..Default::default()
        }
    }

    pub fn with_stats(key: impl Into<String>, stats: Stats) -> Self {
        Self {
            key: key.into(),
            stats: Some(stats),
            ..Default::default()
        }
    }

    pub fn with_value(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn bucket(&self, key: &Value) -> Option<&Bucket> {
        self.buckets.as_ref()?.iter().find(|b| &b.key == key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub key: Value,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Stats>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aggs: BTreeMap<String, AggResult>,
    /// Filter that selects this bucket's documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Query>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Value>,
}

impl Bucket {
    pub fn new(key: impl Into<Value>, count: u64) -> Self {
        Self {
            key: key.into(),
            count,
            stats: None,
            aggs: BTreeMap::new(),
            query: None,
            from: None,
            to: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub count: u64,
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
}

impl Stats {
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut stats = Stats::default();
        for v in values {
            stats.count += 1;
            stats.sum += v;
            stats.min = Some(stats.min.map_or(v, |m| m.min(v)));
            stats.max = Some(stats.max.map_or(v, |m| m.max(v)));
        }
        if stats.count > 0 {
            stats.avg = Some(stats.sum / stats.count as f64);
        }
        stats
    }
}
