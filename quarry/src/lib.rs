//! Backend-agnostic query and aggregation model.
//!
//! Callers describe searches as a [`model::Query`] tree plus [`model::Agg`]
//! specifications; a [`dao::SearchDao`] executes them. The
//! [`dao::QueryTransformingSearchDao`] decorator rewrites public field names,
//! named aggregations and embedded text queries before delegating.

pub mod config;
pub mod dao;
pub mod datemath;
pub mod error;
pub mod model;
pub mod parser;
pub mod path;
pub mod telemetry;
pub mod value;
pub mod xform;

pub use error::{Error, Result};
pub use value::Value;
