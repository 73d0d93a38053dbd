use super::query::Query;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregation request. `key` names the result; `kind` selects the bucketing strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agg {
    pub key: String,
    #[serde(flatten)]
    pub kind: AggKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggs: Vec<Agg>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_doc_count: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketOrder {
    /// Descending count, ties broken by key
    Count,
    /// Ascending key
    Key,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<f64>,
}

/// Date bounds are date math expressions or epoch millis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRangeEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AggKind {
    Terms {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sort: Option<BucketOrder>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        missing: Option<Value>,
    },
    Histogram {
        field: String,
        interval: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        missing: Option<Value>,
    },
    DateHistogram {
        field: String,
        /// `1d`, `30m`, `month`, `quarter`, ...
        interval: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_zone: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        missing: Option<Value>,
    },
    Range {
        field: String,
        ranges: Vec<RangeEntry>,
    },
    DateRange {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_zone: Option<String>,
        ranges: Vec<DateRangeEntry>,
    },
    Filters {
        filters: BTreeMap<String, Query>,
    },
    Stats {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    Missing {
        field: String,
    },
    GeoBounds {
        field: String,
    },
    GeoCentroid {
        field: String,
    },
    GeoHash {
        field: String,
        precision: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<usize>,
    },
    GeoDistance {
        field: String,
        origin: GeoPoint,
        /// `m`, `km` or `mi`; meters when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
        ranges: Vec<RangeEntry>,
    },
    /// Reference to a registered aggregation, resolved before execution
    Named {
        name: String,
    },
}

impl AggKind {
    pub fn name(&self) -> &'static str {
        match self {
            AggKind::Terms { .. } => "terms",
            AggKind::Histogram { .. } => "histogram",
            AggKind::DateHistogram { .. } => "date_histogram",
            AggKind::Range { .. } => "range",
            AggKind::DateRange { .. } => "date_range",
            AggKind::Filters { .. } => "filters",
            AggKind::Stats { .. } => "stats",
            AggKind::Missing { .. } => "missing",
            AggKind::GeoBounds { .. } => "geo_bounds",
            AggKind::GeoCentroid { .. } => "geo_centroid",
            AggKind::GeoHash { .. } => "geo_hash",
            AggKind::GeoDistance { .. } => "geo_distance",
            AggKind::Named { .. } => "named",
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            AggKind::Terms { field, .. }
            | AggKind::Histogram { field, .. }
            | AggKind::DateHistogram { field, .. }
            | AggKind::Range { field, .. }
            | AggKind::DateRange { field, .. }
            | AggKind::Stats { field, .. }
            | AggKind::Missing { field }
            | AggKind::GeoBounds { field }
            | AggKind::GeoCentroid { field }
            | AggKind::GeoHash { field, .. }
            | AggKind::GeoDistance { field, .. } => Some(field),
            AggKind::Filters { .. } | AggKind::Named { .. } => None,
        }
    }

    pub fn field_mut(&mut self) -> Option<&mut String> {
        match self {
            AggKind::Terms { field, .. }
            | AggKind::Histogram { field, .. }
            | AggKind::DateHistogram { field, .. }
            | AggKind::Range { field, .. }
            | AggKind::DateRange { field, .. }
            | AggKind::Stats { field, .. }
            | AggKind::Missing { field }
            | AggKind::GeoBounds { field }
            | AggKind::GeoCentroid { field }
            | AggKind::GeoHash { field, .. }
            | AggKind::GeoDistance { field, .. } => Some(field),
            AggKind::Filters { .. } | AggKind::Named { .. } => None,
        }
    }
}

impl Agg {
    pub fn new(key: impl Into<String>, kind: AggKind) -> Self {
        Self {
            key: key.into(),
            kind,
            aggs: Vec::new(),
            extensions: BTreeMap::new(),
            min_doc_count: None,
        }
    }

    pub fn terms(key: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(
            key,
            AggKind::Terms {
                field: field.into(),
                size: None,
                sort: None,
                format: None,
                missing: None,
            },
        )
    }

    pub fn histogram(key: impl Into<String>, field: impl Into<String>, interval: f64) -> Self {
        Self::new(
            key,
            AggKind::Histogram {
                field: field.into(),
                interval,
                offset: None,
                missing: None,
            },
        )
    }

    pub fn date_histogram(
        key: impl Into<String>,
        field: impl Into<String>,
        interval: impl Into<String>,
    ) -> Self {
        Self::new(
            key,
            AggKind::DateHistogram {
                field: field.into(),
                interval: interval.into(),
                format: None,
                time_zone: None,
                missing: None,
            },
        )
    }

    pub fn range(key: impl Into<String>, field: impl Into<String>, ranges: Vec<RangeEntry>) -> Self {
        Self::new(
            key,
            AggKind::Range {
                field: field.into(),
                ranges,
            },
        )
    }

    pub fn date_range(
        key: impl Into<String>,
        field: impl Into<String>,
        ranges: Vec<DateRangeEntry>,
    ) -> Self {
        Self::new(
            key,
            AggKind::DateRange {
                field: field.into(),
                format: None,
                time_zone: None,
                ranges,
            },
        )
    }

    pub fn filters(key: impl Into<String>, filters: BTreeMap<String, Query>) -> Self {
        Self::new(key, AggKind::Filters { filters })
    }

    pub fn stats(key: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(
            key,
            AggKind::Stats {
                field: field.into(),
                format: None,
            },
        )
    }

    pub fn missing(key: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(key, AggKind::Missing { field: field.into() })
    }

    pub fn named(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(key, AggKind::Named { name: name.into() })
    }

    pub fn with_aggs(mut self, aggs: Vec<Agg>) -> Self {
        self.aggs = aggs;
        self
    }

    pub fn with_min_doc_count(mut self, min_doc_count: u64) -> Self {
        self.min_doc_count = Some(min_doc_count);
        self
    }

    pub fn field(&self) -> Option<&str> {
        self.kind.field()
    }
}

impl RangeEntry {
    pub fn new(from: Option<f64>, to: Option<f64>) -> Self {
        Self { key: None, from, to }
    }

    pub fn keyed(key: impl Into<String>, from: Option<f64>, to: Option<f64>) -> Self {
        Self {
            key: Some(key.into()),
            from,
            to,
        }
    }

    /// Explicit key, or `from-to` with `*` for an open end
    pub fn bucket_key(&self) -> String {
        self.key.clone().unwrap_or_else(|| {
            let from = self.from.map(|n| n.to_string()).unwrap_or_else(|| "*".to_string());
            let to = self.to.map(|n| n.to_string()).unwrap_or_else(|| "*".to_string());
            format!("{}-{}", from, to)
        })
    }
}

impl DateRangeEntry {
    pub fn bucket_key(&self) -> String {
        self.key.clone().unwrap_or_else(|| {
            let from = self.from.as_ref().map(Value::to_string).unwrap_or_else(|| "*".to_string());
            let to = self.to.as_ref().map(Value::to_string).unwrap_or_else(|| "*".to_string());
            format!("{}-{}", from, to)
        })
    }
}
