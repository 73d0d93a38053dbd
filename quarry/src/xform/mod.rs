//! Request rewriting: alias substitution, named aggregation expansion and
//! embedded text query parsing.
//!
//! Transformers consume the tree and return a rewritten one. Every hook
//! defaults to the identity, so an implementation only overrides the
//! variants it cares about.

pub mod alias;
pub mod lucene;
pub mod named;

pub use alias::{FieldAliasAggTransformer, FieldAliasQueryTransformer};
pub use lucene::LuceneQueryTransformer;
pub use named::{NamedAggQueryTransformer, NamedAggTransformer};

use crate::model::{
    Agg, DateRangeQuery, LuceneQuery, NamedQuery, PhraseQuery, PrefixQuery, Query, RangeQuery,
    RegexQuery, TermQuery, TermsQuery, WildcardQuery,
};
use crate::Result;

pub trait QueryTransformer: Send + Sync {
    fn transform(&self, query: Query) -> Result<Query> {
        match query {
            Query::And { of } => Ok(Query::And {
                of: self.transform_all(of)?,
            }),
            Query::Or { of } => Ok(Query::Or {
                of: self.transform_all(of)?,
            }),
            Query::Not { of } => Ok(Query::Not {
                of: self.transform_all(of)?,
            }),
            Query::Term(q) => self.transform_term(q),
            Query::Terms(q) => self.transform_terms(q),
            Query::Phrase(q) => self.transform_phrase(q),
            Query::Prefix(q) => self.transform_prefix(q),
            Query::Wildcard(q) => self.transform_wildcard(q),
            Query::Regex(q) => self.transform_regex(q),
            Query::Range(q) => self.transform_range(q),
            Query::DateRange(q) => self.transform_date_range(q),
            Query::Lucene(q) => self.transform_lucene(q),
            Query::Named(q) => self.transform_named(q),
            Query::MatchAll => Ok(Query::MatchAll),
        }
    }

    fn transform_all(&self, queries: Vec<Query>) -> Result<Vec<Query>> {
        queries.into_iter().map(|q| self.transform(q)).collect()
    }

    fn transform_term(&self, q: TermQuery) -> Result<Query> {
        Ok(Query::Term(q))
    }

    fn transform_terms(&self, q: TermsQuery) -> Result<Query> {
        Ok(Query::Terms(q))
    }

    fn transform_phrase(&self, q: PhraseQuery) -> Result<Query> {
        Ok(Query::Phrase(q))
    }

    fn transform_prefix(&self, q: PrefixQuery) -> Result<Query> {
        Ok(Query::Prefix(q))
    }

    fn transform_wildcard(&self, q: WildcardQuery) -> Result<Query> {
        Ok(Query::Wildcard(q))
    }

    fn transform_regex(&self, q: RegexQuery) -> Result<Query> {
        Ok(Query::Regex(q))
    }

    fn transform_range(&self, q: RangeQuery) -> Result<Query> {
        Ok(Query::Range(q))
    }

    fn transform_date_range(&self, q: DateRangeQuery) -> Result<Query> {
        Ok(Query::DateRange(q))
    }

    fn transform_lucene(&self, q: LuceneQuery) -> Result<Query> {
        Ok(Query::Lucene(q))
    }

    fn transform_named(&self, q: NamedQuery) -> Result<Query> {
        Ok(Query::Named(q))
    }
}

pub trait AggTransformer: Send + Sync {
    /// Rewrite `agg`, then its sub-aggregations
    fn transform(&self, agg: Agg) -> Result<Agg> {
        let mut agg = self.transform_agg(agg)?;
        agg.aggs = agg
            .aggs
            .into_iter()
            .map(|sub| self.transform(sub))
            .collect::<Result<Vec<_>>>()?;
        Ok(agg)
    }

    fn transform_agg(&self, agg: Agg) -> Result<Agg> {
        Ok(agg)
    }
}
