use super::{AggTransformer, QueryTransformer};
use crate::model::{
    Agg, AggKind, DateRangeQuery, Field, PhraseQuery, PrefixQuery, Query, RangeQuery, RegexQuery,
    TermQuery, TermsQuery, WildcardQuery,
};
use crate::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Alias name → backend field
pub type AliasMap = BTreeMap<String, Field>;

fn resolve(aliases: &AliasMap, field: String) -> String {
    match aliases.get(&field).and_then(|alias| alias.name.clone()) {
        Some(name) => name,
        None => field,
    }
}

/// Rewrites every query field that has a named alias
#[derive(Debug, Clone, Default)]
pub struct FieldAliasQueryTransformer {
    aliases: Arc<AliasMap>,
}

impl FieldAliasQueryTransformer {
    pub fn new(aliases: Arc<AliasMap>) -> Self {
        Self { aliases }
    }

    fn field(&self, field: String) -> String {
        resolve(&self.aliases, field)
    }
}

impl QueryTransformer for FieldAliasQueryTransformer {
    fn transform_term(&self, q: TermQuery) -> Result<Query> {
        Ok(Query::Term(TermQuery {
            field: self.field(q.field),
            ..q
        }))
    }

    fn transform_terms(&self, q: TermsQuery) -> Result<Query> {
        Ok(Query::Terms(TermsQuery {
            field: self.field(q.field),
            ..q
        }))
    }

    fn transform_phrase(&self, q: PhraseQuery) -> Result<Query> {
        Ok(Query::Phrase(PhraseQuery {
            field: self.field(q.field),
            ..q
        }))
    }

    fn transform_prefix(&self, q: PrefixQuery) -> Result<Query> {
        Ok(Query::Prefix(PrefixQuery {
            field: self.field(q.field),
            ..q
        }))
    }

    fn transform_wildcard(&self, q: WildcardQuery) -> Result<Query> {
        Ok(Query::Wildcard(WildcardQuery {
            field: self.field(q.field),
            ..q
        }))
    }

    fn transform_regex(&self, q: RegexQuery) -> Result<Query> {
        Ok(Query::Regex(RegexQuery {
            field: self.field(q.field),
            ..q
        }))
    }

    fn transform_range(&self, q: RangeQuery) -> Result<Query> {
        Ok(Query::Range(RangeQuery {
            field: self.field(q.field),
            ..q
        }))
    }

    fn transform_date_range(&self, q: DateRangeQuery) -> Result<Query> {
        Ok(Query::DateRange(DateRangeQuery {
            field: self.field(q.field),
            ..q
        }))
    }
}

/// Rewrites aggregation fields and filter queries through the alias table
#[derive(Debug, Clone, Default)]
pub struct FieldAliasAggTransformer {
    queries: FieldAliasQueryTransformer,
}

impl FieldAliasAggTransformer {
    pub fn new(aliases: Arc<AliasMap>) -> Self {
        Self {
            queries: FieldAliasQueryTransformer::new(aliases),
        }
    }
}

impl AggTransformer for FieldAliasAggTransformer {
    fn transform_agg(&self, mut agg: Agg) -> Result<Agg> {
        agg.kind = match agg.kind {
            AggKind::Filters { filters } => AggKind::Filters {
                filters: filters
                    .into_iter()
                    .map(|(key, q)| self.queries.transform(q).map(|q| (key, q)))
                    .collect::<Result<_>>()?,
            },
            AggKind::Named { name } => AggKind::Named { name },
            mut kind @ (AggKind::Terms { .. }
            | AggKind::Histogram { .. }
            | AggKind::DateHistogram { .. }
            | AggKind::Range { .. }
            | AggKind::DateRange { .. }
            | AggKind::Stats { .. }
            | AggKind::Missing { .. }
            | AggKind::GeoBounds { .. }
            | AggKind::GeoCentroid { .. }
            | AggKind::GeoHash { .. }
            | AggKind::GeoDistance { .. }) => {
                if let Some(field) = kind.field_mut() {
                    *field = self.queries.field(std::mem::take(field));
                }
                kind
            }
        };
        Ok(agg)
    }
}
