use super::QueryTransformer;
use crate::model::{LuceneQuery, Query};
use crate::parser::LuceneParser;
use crate::Result;

/// Replaces embedded text queries with their parsed tree
#[derive(Debug, Clone, Copy, Default)]
pub struct LuceneQueryTransformer;

impl QueryTransformer for LuceneQueryTransformer {
    fn transform_lucene(&self, q: LuceneQuery) -> Result<Query> {
        let parsed = LuceneParser::parse(&q.query, q.default_field.as_deref())?;
        tracing::trace!(query = %q.query, parsed = parsed.query_type(), "expanded lucene query");
        Ok(parsed)
    }
}
