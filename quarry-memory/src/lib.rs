//! In-memory execution of quarry requests.
//!
//! [`PredicateCompiler`] turns a query tree into a record test,
//! [`AggregationEngine`] buckets the matching records and [`MapBackedSearchDao`]
//! ties both together behind the `SearchDao` contract.

pub mod aggs;
pub mod comparator;
pub mod geo;
pub mod predicate;
pub mod store;

pub use aggs::AggregationEngine;
pub use comparator::{compare, sort_order};
pub use predicate::{Clock, Predicate, PredicateCompiler, SystemClock};
pub use store::MapBackedSearchDao;
