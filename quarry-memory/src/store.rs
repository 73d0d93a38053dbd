//! Reference `SearchDao` over an in-memory map.
//!
//! Entities live in a `RwLock`-guarded map keyed by id. Searches hold the read
//! lock for the whole filter, aggregate, sort and page pass; `save` and
//! `delete_by_id` take the write lock. Unsorted results come back in id order.

use crate::aggs::AggregationEngine;
use crate::comparator::sort_order;
use crate::predicate::{Clock, PredicateCompiler};
use async_trait::async_trait;
use parking_lot::RwLock;
use quarry::dao::SearchDao;
use quarry::model::{Direction, DocSort, Field, Query, SearchRequest, SearchResult};
use quarry::path::{extract_value, JsonPathEvaluator, PathEvaluator};
use quarry::{Error, Result, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

pub struct MapBackedSearchDao<R> {
    items: RwLock<BTreeMap<String, R>>,
    compiler: PredicateCompiler<R>,
    aggs: AggregationEngine<R>,
}

impl MapBackedSearchDao<serde_json::Value> {
    /// Store for JSON documents
    pub fn json() -> Self {
        Self::new(Arc::new(JsonPathEvaluator))
    }
}

impl<R: Clone + Send + Sync + 'static> MapBackedSearchDao<R> {
    pub fn new(evaluator: Arc<dyn PathEvaluator<R>>) -> Self {
        Self::from_compiler(PredicateCompiler::new(evaluator))
    }

    /// Store whose date math resolves `now` against `clock`
    pub fn with_clock(evaluator: Arc<dyn PathEvaluator<R>>, clock: Arc<dyn Clock>) -> Self {
        Self::from_compiler(PredicateCompiler::with_clock(evaluator, clock))
    }

    fn from_compiler(compiler: PredicateCompiler<R>) -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
            aggs: AggregationEngine::new(compiler.clone()),
            compiler,
        }
    }

    /// Seed the store
    pub fn with_items<I, K>(self, items: I) -> Self
    where
        I: IntoIterator<Item = (K, R)>,
        K: Into<String>,
    {
        self.items
            .write()
            .extend(items.into_iter().map(|(id, item)| (id.into(), item)));
        self
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    fn run(&self, request: &SearchRequest) -> Result<SearchResult<R>> {
        let started = Instant::now();
        let query = request.query.clone().unwrap_or(Query::MatchAll);
        let predicate = self.compiler.compile(&query)?;

        let items = self.items.read();
        let mut matched: Vec<&R> = items.values().filter(|r| predicate(*r)).collect();
        let aggs = self.aggs.compute(&request.aggs, &matched)?;
        let total = matched.len();

        if !request.sorts.is_empty() {
            self.sort(&mut matched, &request.sorts);
        }

        let start = usize::try_from(request.offset).unwrap_or(usize::MAX).min(total);
        let limit = usize::try_from(request.limit).unwrap_or(usize::MAX);
        let end = start.saturating_add(limit).min(total);
        let page = &matched[start..end];

        tracing::debug!(
            total = items.len(),
            matched = total,
            returned = page.len(),
            aggs = aggs.len(),
            "in-memory search"
        );
        metrics::counter!("quarry_memory_searches_total").increment(1);
        metrics::histogram!("quarry_memory_search_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        let mut result = SearchResult {
            aggs,
            total_items: total as u64,
            fields: request.fields.clone(),
            ..Default::default()
        };
        if request.fields.is_empty() {
            result.items = Some(page.iter().map(|r| (*r).clone()).collect());
        } else {
            result.rows = Some(page.iter().map(|r| self.project(r, &request.fields)).collect());
        }
        Ok(result)
    }

    /// Stable multi-key sort; missing values sort last in either direction
    fn sort(&self, records: &mut Vec<&R>, sorts: &[DocSort]) {
        let evaluator = self.compiler.evaluator();
        let mut keyed: Vec<(Vec<Value>, &R)> = records
            .iter()
            .map(|r| {
                let key = sorts
                    .iter()
                    .map(|s| extract_value(evaluator.as_ref(), *r, &s.field))
                    .collect();
                (key, *r)
            })
            .collect();
        keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b, sorts));
        *records = keyed.into_iter().map(|(_, r)| r).collect();
    }

    fn project(&self, record: &R, fields: &[Field]) -> Vec<Value> {
        let evaluator = self.compiler.evaluator();
        fields
            .iter()
            .map(|field| match field.path() {
                Some(path) => extract_value(evaluator.as_ref(), record, path),
                None => Value::Null,
            })
            .collect()
    }
}

fn compare_keys(a: &[Value], b: &[Value], sorts: &[DocSort]) -> Ordering {
    for ((x, y), sort) in a.iter().zip(b).zip(sorts) {
        let ordering = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => match sort.direction {
                Direction::Asc => sort_order(x, y),
                Direction::Desc => sort_order(x, y).reverse(),
            },
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl<R: Clone + Send + Sync + 'static> SearchDao<R> for MapBackedSearchDao<R> {
    async fn create(&self, _entity: R) -> Result<R> {
        Err(Error::NotImplemented(
            "create is not supported by the in-memory store, use save with an id".to_string(),
        ))
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool> {
        match self.items.write().remove(id) {
            Some(_) => {
                tracing::debug!(id, "entity deleted");
                Ok(true)
            }
            None => Err(Error::NotFound(format!("No entity with id '{}'", id))),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<R>> {
        Ok(self.items.read().get(id).cloned())
    }

    async fn save(&self, id: &str, entity: R) -> Result<R> {
        self.items.write().insert(id.to_string(), entity.clone());
        Ok(entity)
    }

    async fn search(&self, request: SearchRequest) -> Result<SearchResult<R>> {
        self.run(&request)
    }
}
