use super::SearchDao;
use crate::config::TransformConfig;
use crate::model::{Agg, AggKind, AggResult, DocSort, Field, Query, SearchRequest, SearchResult};
use crate::xform::alias::AliasMap;
use crate::xform::named::{NamedAggMap, NamedQueryMap};
use crate::xform::{
    AggTransformer, FieldAliasAggTransformer, FieldAliasQueryTransformer, LuceneQueryTransformer,
    NamedAggQueryTransformer, NamedAggTransformer, QueryTransformer,
};
use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Field set name → fields it expands to
pub type FieldSetMap = BTreeMap<String, Vec<Field>>;

/// Decorator that rewrites requests from the public field vocabulary into
/// the delegate's, and restores the caller's view on the way back.
pub struct QueryTransformingSearchDao<T: Send + Sync + 'static> {
    delegate: Arc<dyn SearchDao<T>>,
    aliases: Arc<AliasMap>,
    field_sets: Arc<FieldSetMap>,
    named_aggs: Arc<NamedAggMap>,
    named_queries: Arc<NamedQueryMap>,
}

impl<T: Send + Sync + 'static> QueryTransformingSearchDao<T> {
    pub fn new(
        delegate: Arc<dyn SearchDao<T>>,
        aliases: AliasMap,
        field_sets: FieldSetMap,
        named_aggs: NamedAggMap,
        named_queries: NamedQueryMap,
    ) -> Self {
        Self {
            delegate,
            aliases: Arc::new(aliases),
            field_sets: Arc::new(field_sets),
            named_aggs: Arc::new(named_aggs),
            named_queries: Arc::new(named_queries),
        }
    }

    pub fn from_config(delegate: Arc<dyn SearchDao<T>>, config: &TransformConfig) -> Self {
        Self::new(
            delegate,
            config.aliases.clone(),
            config.field_sets.clone(),
            config.named_aggs.clone(),
            config.named_queries.clone(),
        )
    }

    /// Text expansion, then alias substitution, then named expansion
    pub fn transform_query(&self, query: Query, time_zone: Option<&str>) -> Result<Query> {
        let query = LuceneQueryTransformer.transform(query)?;
        let query = FieldAliasQueryTransformer::new(self.aliases.clone()).transform(query)?;
        NamedAggQueryTransformer::new(
            self.named_queries.clone(),
            self.named_aggs.clone(),
            time_zone.map(str::to_string),
        )
        .transform(query)
    }

    pub fn transform_fields(&self, fields: &[Field], field_set: Option<&str>) -> Vec<Field> {
        let mut all: Vec<Field> = fields.to_vec();
        if let Some(extra) = field_set.and_then(|name| self.field_sets.get(name)) {
            all.extend(extra.iter().cloned());
        }

        all.into_iter()
            .map(|field| {
                let alias = field.name.as_ref().and_then(|name| self.aliases.get(name));
                match alias {
                    Some(alias) => Field {
                        name: alias.name.clone(),
                        expr: alias.expr.clone(),
                        label: field.label.or_else(|| alias.label.clone()),
                        settings: if field.settings.is_empty() {
                            alias.settings.clone()
                        } else {
                            field.settings
                        },
                    },
                    None => field,
                }
            })
            .collect()
    }

    pub fn transform_sorts(&self, sorts: &[DocSort]) -> Vec<DocSort> {
        sorts
            .iter()
            .map(|sort| {
                let field = self
                    .aliases
                    .get(&sort.field)
                    .and_then(|alias| alias.expr.clone().or_else(|| alias.name.clone()))
                    .unwrap_or_else(|| sort.field.clone());
                DocSort {
                    field,
                    direction: sort.direction,
                }
            })
            .collect()
    }

    pub fn transform_aggs(&self, aggs: &[Agg]) -> Result<Vec<Agg>> {
        let aliases = FieldAliasAggTransformer::new(self.aliases.clone());
        let named = NamedAggTransformer::new(self.named_aggs.clone());
        aggs.iter()
            .map(|agg| named.transform(aliases.transform(agg.clone())?))
            .collect()
    }

    pub fn transform_request(&self, request: &SearchRequest) -> Result<SearchRequest> {
        let time_zone = request.time_zone();
        let query = match &request.query {
            Some(q) => Some(self.transform_query(q.clone(), time_zone)?),
            None => None,
        };
        let field_set = match &request.field_set {
            Some(name) if self.field_sets.contains_key(name) => None,
            other => other.clone(),
        };

        Ok(SearchRequest {
            offset: request.offset,
            limit: request.limit,
            query,
            fields: self.transform_fields(&request.fields, request.field_set.as_deref()),
            field_set,
            sorts: self.transform_sorts(&request.sorts),
            aggs: self.transform_aggs(&request.aggs)?,
            params: request.params.clone(),
        })
    }

    /// Map delegate aggregation results back onto the caller's requested aggs.
    /// Results with no matching request entry are dropped.
    fn transform_agg_results(
        &self,
        requested: &[Agg],
        mut results: BTreeMap<String, AggResult>,
    ) -> BTreeMap<String, AggResult> {
        let mut restored = BTreeMap::new();
        for agg in requested {
            let Some(mut result) = results.remove(&agg.key) else {
                continue;
            };
            if let AggKind::Named { name } = &agg.kind {
                if let Some(named) = self.named_aggs.get(name) {
                    match &named.kind {
                        AggKind::Filters { filters } => {
                            for bucket in result.buckets.iter_mut().flatten() {
                                bucket.query = filters.get(&bucket.key.to_string()).cloned();
                            }
                        }
                        kind => {
                            if let Some(field) = kind.field() {
                                result.field = Some(field.to_string());
                            }
                        }
                    }
                }
            }
            restored.insert(agg.key.clone(), result);
        }
        restored
    }

    fn transform_result(
        &self,
        request: &SearchRequest,
        mut result: SearchResult<T>,
    ) -> SearchResult<T> {
        result.fields = request.fields.clone();
        result.aggs = self.transform_agg_results(&request.aggs, std::mem::take(&mut result.aggs));
        result
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> SearchDao<T> for QueryTransformingSearchDao<T> {
    async fn create(&self, entity: T) -> Result<T> {
        self.delegate.create(entity).await
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool> {
        self.delegate.delete_by_id(id).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        self.delegate.find_by_id(id).await
    }

    async fn save(&self, id: &str, entity: T) -> Result<T> {
        self.delegate.save(id, entity).await
    }

    async fn search(&self, request: SearchRequest) -> Result<SearchResult<T>> {
        metrics::counter!("quarry_rewrites_total", "op" => "search").increment(1);
        let transformed = self.transform_request(&request)?;
        tracing::debug!(
            query = transformed.query.as_ref().map(Query::query_type),
            fields = transformed.fields.len(),
            sorts = transformed.sorts.len(),
            aggs = transformed.aggs.len(),
            "rewrote search request"
        );
        let result = self.delegate.search(transformed).await?;
        Ok(self.transform_result(&request, result))
    }

    async fn count(&self, query: Query) -> Result<u64> {
        metrics::counter!("quarry_rewrites_total", "op" => "count").increment(1);
        let query = self.transform_query(query, None)?;
        tracing::debug!(query = query.query_type(), "rewrote count query");
        self.delegate.count(query).await
    }

    async fn find_one(&self, query: Query) -> Result<Option<T>> {
        metrics::counter!("quarry_rewrites_total", "op" => "find_one").increment(1);
        let query = self.transform_query(query, None)?;
        tracing::debug!(query = query.query_type(), "rewrote find_one query");
        self.delegate.find_one(query).await
    }
}
