use super::{AggTransformer, LuceneQueryTransformer, QueryTransformer};
use crate::datemath::Interval;
use crate::model::{Agg, AggKind, DateRangeQuery, NamedQuery, Query, RangeQuery};
use crate::value::coerce;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registered name → aggregation definition
pub type NamedAggMap = BTreeMap<String, Agg>;

/// Registered name → query
pub type NamedQueryMap = BTreeMap<String, Query>;

/// Expands `Named { name, value }` into the filter that selects the bucket
/// keyed `value` of the registered aggregation `name`.
///
/// Registered queries and aggregation filters are written in storage field
/// names, so the alias pass does not run on an expansion. Text queries inside
/// them are parsed.
#[derive(Debug, Clone, Default)]
pub struct NamedAggQueryTransformer {
    named_queries: Arc<NamedQueryMap>,
    named_aggs: Arc<NamedAggMap>,
    time_zone: Option<String>,
}

impl NamedAggQueryTransformer {
    pub fn new(
        named_queries: Arc<NamedQueryMap>,
        named_aggs: Arc<NamedAggMap>,
        time_zone: Option<String>,
    ) -> Self {
        Self {
            named_queries,
            named_aggs,
            time_zone,
        }
    }

    fn bucket_not_found(name: &str, key: &str) -> Error {
        Error::NotFound(format!("Bucket '{}' of named aggregation '{}'", key, name))
    }

    fn expand(&self, agg: &Agg, q: &NamedQuery) -> Result<Query> {
        let key = q.value.to_string();
        match &agg.kind {
            AggKind::Filters { filters } => filters
                .get(&key)
                .cloned()
                .ok_or_else(|| Self::bucket_not_found(&q.name, &key)),
            AggKind::Terms { field, .. } => Ok(Query::term(field.as_str(), q.value.clone())),
            AggKind::Missing { field } => Ok(Query::not(vec![Query::exists(field.as_str())])),
            AggKind::Range { field, ranges } => {
                let entry = ranges
                    .iter()
                    .find(|r| r.bucket_key() == key)
                    .ok_or_else(|| Self::bucket_not_found(&q.name, &key))?;
                let mut range = RangeQuery::new(field.as_str());
                range.gte = entry.from.map(Into::into);
                range.lt = entry.to.map(Into::into);
                Ok(Query::Range(range))
            }
            AggKind::DateRange {
                field,
                time_zone,
                ranges,
                ..
            } => {
                let entry = ranges
                    .iter()
                    .find(|r| r.bucket_key() == key)
                    .ok_or_else(|| Self::bucket_not_found(&q.name, &key))?;
                let mut range = DateRangeQuery::new(field.as_str());
                range.gte = entry.from.clone();
                range.lt = entry.to.clone();
                range.time_zone = time_zone.clone().or_else(|| self.time_zone.clone());
                Ok(Query::DateRange(range))
            }
            AggKind::Histogram {
                field, interval, ..
            } => {
                let start = coerce::to_double(&q.value).ok_or_else(|| {
                    Error::InvalidQuery(format!(
                        "Histogram bucket '{}' of '{}' is not numeric",
                        key, q.name
                    ))
                })?;
                Ok(RangeQuery::new(field.as_str())
                    .gte(start)
                    .lt(start + interval)
                    .into())
            }
            AggKind::DateHistogram {
                field,
                interval,
                time_zone,
                ..
            } => {
                let step = Interval::parse(interval)?.to_date_math();
                let mut range = DateRangeQuery::new(field.as_str())
                    .gte(q.value.clone())
                    .lt(format!("{}||{}", key, step));
                range.time_zone = time_zone.clone().or_else(|| self.time_zone.clone());
                Ok(Query::DateRange(range))
            }
            other => Err(Error::Unsupported(format!(
                "Named query over {} aggregation '{}'",
                other.name(),
                q.name
            ))),
        }
    }
}

impl QueryTransformer for NamedAggQueryTransformer {
    fn transform_named(&self, q: NamedQuery) -> Result<Query> {
        if let Some(query) = self.named_queries.get(&q.name) {
            return LuceneQueryTransformer.transform(query.clone());
        }
        let agg = self
            .named_aggs
            .get(&q.name)
            .ok_or_else(|| Error::NotFound(format!("Named aggregation '{}'", q.name)))?;
        let expanded = LuceneQueryTransformer.transform(self.expand(agg, &q)?)?;
        tracing::trace!(name = %q.name, value = %q.value, expanded = expanded.query_type(), "expanded named query");
        Ok(expanded)
    }
}

/// Replaces `Named { name }` aggregations with their registered definition
#[derive(Debug, Clone, Default)]
pub struct NamedAggTransformer {
    named_aggs: Arc<NamedAggMap>,
}

impl NamedAggTransformer {
    pub fn new(named_aggs: Arc<NamedAggMap>) -> Self {
        Self { named_aggs }
    }
}

impl AggTransformer for NamedAggTransformer {
    fn transform_agg(&self, agg: Agg) -> Result<Agg> {
        let AggKind::Named { name } = &agg.kind else {
            return Ok(agg);
        };
        let registered = self
            .named_aggs
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("Named aggregation '{}'", name)))?;

        let mut resolved = registered.clone();
        resolved.key = agg.key;
        resolved.aggs.extend(agg.aggs);
        if agg.min_doc_count.is_some() {
            resolved.min_doc_count = agg.min_doc_count;
        }
        resolved.extensions.extend(agg.extensions);
        Ok(resolved)
    }
}
