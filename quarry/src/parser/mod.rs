//! Lucene-style text query parsing.

pub mod lucene;
pub mod tokenizer;

pub use lucene::{LuceneParser, DEFAULT_FIELD};
