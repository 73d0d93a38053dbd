//! Backend-agnostic request and result types.

pub mod agg;
pub mod query;
pub mod request;
pub mod result;

pub use agg::{Agg, AggKind, BucketOrder, DateRangeEntry, GeoPoint, RangeEntry};
pub use query::{
    DateRangeQuery, LuceneQuery, NamedQuery, PhraseQuery, PrefixQuery, Query, RangeQuery,
    RegexQuery, TermQuery, TermsQuery, WildcardQuery,
};
pub use request::{Direction, DocSort, Field, SearchRequest};
pub use result::{AggResult, Bucket, SearchResult, Stats};
