use super::agg::Agg;
use super::query::Query;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Projected column. `name` is a plain path, `expr` an expression evaluated by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, serde_json::Value>,
}

impl Field {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn expr(expr: impl Into<String>) -> Self {
        Self {
            expr: Some(expr.into()),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Path a backend reads for this column
    pub fn path(&self) -> Option<&str> {
        self.name.as_deref().or(self.expr.as_deref())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocSort {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

impl DocSort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

fn default_limit() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Query>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_set: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sorts: Vec<DocSort>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggs: Vec<Agg>,
    /// Free-form request parameters, e.g. `timeZone`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, serde_json::Value>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: default_limit(),
            query: None,
            fields: Vec::new(),
            field_set: None,
            sorts: Vec::new(),
            aggs: Vec::new(),
            params: BTreeMap::new(),
        }
    }
}

impl SearchRequest {
    pub fn new(query: Query) -> Self {
        Self {
            query: Some(query),
            ..Default::default()
        }
    }

    pub fn paged(mut self, offset: u64, limit: u64) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_field_set(mut self, field_set: impl Into<String>) -> Self {
        self.field_set = Some(field_set.into());
        self
    }

    pub fn with_sorts(mut self, sorts: Vec<DocSort>) -> Self {
        self.sorts = sorts;
        self
    }

    pub fn with_aggs(mut self, aggs: Vec<Agg>) -> Self {
        self.aggs = aggs;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// `params["timeZone"]` when it is a string
    pub fn time_zone(&self) -> Option<&str> {
        self.params.get("timeZone").and_then(|v| v.as_str())
    }
}
