//! Compiles a [`Query`] tree into a boolean test over one record.
//!
//! Multi-valued fields match existentially: a leaf matches when at least one
//! extracted value satisfies it. Range bounds are checked independently, so
//! `gte` and `lt` may be satisfied by different values of the same field.

use crate::comparator::compare;
use chrono::{DateTime, Utc};
use quarry::datemath::{time_zone_or_utc, DateMathParser, Zone};
use quarry::model::{DateRangeQuery, Query, RangeQuery};
use quarry::path::{extract, PathEvaluator};
use quarry::value::coerce;
use quarry::{Error, Result, Value};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;
use std::sync::Arc;

pub type Predicate<R> = Box<dyn Fn(&R) -> bool + Send + Sync>;

/// Source of the instant `now` resolves to in date math
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A fixed instant is a clock that never moves
impl Clock for DateTime<Utc> {
    fn now(&self) -> DateTime<Utc> {
        *self
    }
}

/// Term equality between one record value and a query literal
pub fn term_matches(value: &Value, term: &Value) -> bool {
    match value {
        Value::Null => term.is_null(),
        Value::Bool(_) | Value::Int(_) | Value::Long(_) | Value::Float(_) | Value::Double(_) => {
            coerce::coerce_like(term, value).as_ref() == Some(value)
        }
        _ => !term.is_null() && value.to_string() == term.to_string(),
    }
}

/// Escape `text` for literal use inside a regex, keeping `*` and `?` as globs
fn glob_to_regex(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out
}

fn full_match_ci(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(&format!("^(?:{})$", pattern))
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::InvalidQuery(format!("Invalid pattern '{}': {}", pattern, e)))
}

#[derive(Debug, Clone, Copy)]
enum Bound {
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Bound {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Bound::Lt => ordering == Ordering::Less,
            Bound::Lte => ordering != Ordering::Greater,
            Bound::Gt => ordering == Ordering::Greater,
            Bound::Gte => ordering != Ordering::Less,
        }
    }

    /// Upper-inclusive and lower-exclusive bounds round date math up
    fn rounds_up(self) -> bool {
        matches!(self, Bound::Lte | Bound::Gt)
    }
}

pub struct PredicateCompiler<R> {
    evaluator: Arc<dyn PathEvaluator<R>>,
    clock: Arc<dyn Clock>,
}

impl<R> Clone for PredicateCompiler<R> {
    fn clone(&self) -> Self {
        Self {
            evaluator: self.evaluator.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<R: 'static> PredicateCompiler<R> {
    pub fn new(evaluator: Arc<dyn PathEvaluator<R>>) -> Self {
        Self::with_clock(evaluator, Arc::new(SystemClock))
    }

    pub fn with_clock(evaluator: Arc<dyn PathEvaluator<R>>, clock: Arc<dyn Clock>) -> Self {
        Self { evaluator, clock }
    }

    pub fn evaluator(&self) -> &Arc<dyn PathEvaluator<R>> {
        &self.evaluator
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Compile `query`. `now` is captured once here for every date bound.
    pub fn compile(&self, query: &Query) -> Result<Predicate<R>> {
        let now = self.clock.now();
        self.compile_at(query, now)
    }

    fn compile_all(&self, queries: &[Query], now: DateTime<Utc>) -> Result<Vec<Predicate<R>>> {
        queries.iter().map(|q| self.compile_at(q, now)).collect()
    }

    fn compile_at(&self, query: &Query, now: DateTime<Utc>) -> Result<Predicate<R>> {
        match query {
            Query::And { of } => {
                let preds = self.compile_all(of, now)?;
                Ok(Box::new(move |r: &R| preds.iter().all(|p| p(r))))
            }
            Query::Or { of } => {
                let preds = self.compile_all(of, now)?;
                Ok(Box::new(move |r: &R| preds.iter().any(|p| p(r))))
            }
            Query::Not { of } => {
                let preds = self.compile_all(of, now)?;
                Ok(Box::new(move |r: &R| !preds.iter().any(|p| p(r))))
            }
            Query::MatchAll => Ok(Box::new(|_: &R| true)),
            Query::Term(q) => {
                let term = q.value.clone();
                Ok(self.any_value(&q.field, move |v| term_matches(v, &term)))
            }
            Query::Terms(q) => {
                let terms = q.values.clone();
                Ok(self.any_value(&q.field, move |v| terms.iter().any(|t| term_matches(v, t))))
            }
            Query::Phrase(q) => {
                let re = full_match_ci(&regex::escape(&q.tokens.join(" ")))?;
                Ok(self.any_pattern(&q.field, re))
            }
            Query::Prefix(q) => {
                let re = full_match_ci(&format!("{}.*", regex::escape(&q.value)))?;
                Ok(self.any_pattern(&q.field, re))
            }
            Query::Wildcard(q) if q.value == "*" => {
                Ok(self.any_value(&q.field, |v| !v.is_null()))
            }
            Query::Wildcard(q) => {
                let re = full_match_ci(&format!(".*{}.*", glob_to_regex(&q.value)))?;
                Ok(self.any_pattern(&q.field, re))
            }
            Query::Regex(q) => {
                let re = full_match_ci(&q.value)?;
                Ok(self.any_pattern(&q.field, re))
            }
            Query::Range(q) => self.range(q),
            Query::DateRange(q) => self.date_range(q, now),
            Query::Lucene(_) | Query::Named(_) => Err(Error::Unsupported(format!(
                "{} query must be expanded before execution",
                query.query_type()
            ))),
        }
    }

    fn any_value<F>(&self, field: &str, test: F) -> Predicate<R>
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let evaluator = self.evaluator.clone();
        let field = field.to_string();
        Box::new(move |r: &R| extract(evaluator.as_ref(), r, &field).iter().any(&test))
    }

    fn any_pattern(&self, field: &str, re: Regex) -> Predicate<R> {
        self.any_value(field, move |v| !v.is_null() && re.is_match(&v.to_string()))
    }

    fn bounds(&self, field: &str, bounds: Vec<(Bound, Value)>) -> Predicate<R> {
        let evaluator = self.evaluator.clone();
        let field = field.to_string();
        Box::new(move |r: &R| {
            let values = extract(evaluator.as_ref(), r, &field);
            bounds
                .iter()
                .all(|(bound, limit)| values.iter().any(|v| bound.accepts(compare(v, limit))))
        })
    }

    fn range(&self, q: &RangeQuery) -> Result<Predicate<R>> {
        let bounds = [
            (Bound::Lt, &q.lt),
            (Bound::Lte, &q.lte),
            (Bound::Gt, &q.gt),
            (Bound::Gte, &q.gte),
        ]
        .into_iter()
        .filter_map(|(bound, limit)| limit.clone().map(|l| (bound, l)))
        .collect();
        Ok(self.bounds(&q.field, bounds))
    }

    fn date_range(&self, q: &DateRangeQuery, now: DateTime<Utc>) -> Result<Predicate<R>> {
        let tz = time_zone_or_utc(q.time_zone.as_deref());
        let resolve = |bound: Bound, limit: &Value| -> Value {
            let Value::Str(expr) = limit else {
                return limit.clone();
            };
            match DateMathParser::parse(expr, now, bound.rounds_up(), &tz) {
                Ok(instant) => Value::Long(instant.timestamp_millis()),
                Err(e) => {
                    tracing::warn!(field = %q.field, expr = %expr, error = %e, "date math failed, comparing raw literal");
                    limit.clone()
                }
            }
        };

        let bounds: Vec<(Bound, Value)> = [
            (Bound::Lt, &q.lt),
            (Bound::Lte, &q.lte),
            (Bound::Gt, &q.gt),
            (Bound::Gte, &q.gte),
        ]
        .into_iter()
        .filter_map(|(bound, limit)| limit.as_ref().map(|l| (bound, resolve(bound, l))))
        .collect();

        let evaluator = self.evaluator.clone();
        let field = q.field.clone();
        Ok(Box::new(move |r: &R| {
            let values: Vec<Value> = extract(evaluator.as_ref(), r, &field)
                .into_iter()
                .map(|v| date_value(v, &tz))
                .collect();
            bounds
                .iter()
                .all(|(bound, limit)| values.iter().any(|v| bound.accepts(compare(v, limit))))
        }))
    }
}

/// Record strings that parse as date literals compare as epoch millis
pub(crate) fn date_value(value: Value, tz: &Zone) -> Value {
    if let Value::Str(s) = &value {
        if !s.starts_with("now") {
            if let Ok(instant) = DateMathParser::parse(s, DateTime::<Utc>::MIN_UTC, false, tz) {
                return Value::Long(instant.timestamp_millis());
            }
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use quarry::path::JsonPathEvaluator;
    use serde_json::{json, Value as Json};

    fn compiler() -> PredicateCompiler<Json> {
        PredicateCompiler::new(Arc::new(JsonPathEvaluator))
    }

    fn matches(query: &Query, record: &Json) -> bool {
        compiler().compile(query).unwrap()(record)
    }

    #[test]
    fn test_term_is_existential() {
        let record = json!({"tags": ["red", "green"]});
        assert!(matches(&Query::term("tags", "green"), &record));
        assert!(!matches(&Query::term("tags", "blue"), &record));
        assert!(!matches(&Query::term("missing", "red"), &record));
    }

    #[test]
    fn test_term_coerces_to_record_type() {
        assert!(matches(&Query::term("age", "21"), &json!({"age": 21})));
        assert!(matches(&Query::term("name", 21i64), &json!({"name": "21"})));
        assert!(matches(&Query::term("on", "true"), &json!({"on": true})));
        assert!(!matches(&Query::term("age", "abc"), &json!({"age": 21})));
    }

    #[test]
    fn test_terms_any_of() {
        let q = Query::terms("status", vec!["active", "idle"]);
        assert!(matches(&q, &json!({"status": "idle"})));
        assert!(!matches(&q, &json!({"status": "gone"})));
    }

    #[test]
    fn test_text_patterns_ignore_case() {
        let record = json!({"name": "Ada Lovelace"});
        assert!(matches(&Query::prefix("name", "ada"), &record));
        assert!(!matches(&Query::prefix("name", "love"), &record));
        assert!(matches(&Query::wildcard("name", "love*"), &record));
        assert!(matches(&Query::wildcard("name", "l?velace"), &record));
        assert!(matches(&Query::regex("name", "ada .*"), &record));
        assert!(!matches(&Query::regex("name", "ada"), &record));
        assert!(matches(
            &Query::phrase("name", vec!["ADA".to_string(), "lovelace".to_string()]),
            &record
        ));
        assert!(!matches(&Query::phrase("name", vec!["ada".to_string()]), &record));
    }

    #[test]
    fn test_wildcard_question_mark_is_one_character() {
        let q = Query::wildcard("name", "a?c");
        assert!(matches(&q, &json!({"name": "abc"})));
        assert!(!matches(&q, &json!({"name": "ac"})));
        assert!(!matches(&q, &json!({"name": "abbc"})));
    }

    #[test]
    fn test_wildcard_star_means_has_value() {
        assert!(matches(&Query::exists("email"), &json!({"email": "a@b"})));
        assert!(!matches(&Query::exists("email"), &json!({"email": null})));
        assert!(!matches(&Query::exists("email"), &json!({})));
    }

    #[test]
    fn test_range_bounds_are_independent() {
        let record = json!({"vals": [1, 10]});
        let q: Query = RangeQuery::new("vals").gte(5).lt(3).into();
        assert!(matches(&q, &record));
        let q: Query = RangeQuery::new("vals").gt(10).into();
        assert!(!matches(&q, &record));
    }

    #[test]
    fn test_integer_values_compare_after_truncating_the_bound() {
        let q: Query = RangeQuery::new("price").gte(9.99).into();
        assert!(matches(&q, &json!({"price": 9})));
        assert!(!matches(&q, &json!({"price": 9.5})));
        assert!(!matches(&q, &json!({"price": 8})));
    }

    #[test]
    fn test_age_scenario() {
        let records = [json!({"age": 17}), json!({"age": 21}), json!({"age": "21"})];
        let pred = compiler()
            .compile(&RangeQuery::new("age").gte(18).into())
            .unwrap();
        let hits: Vec<bool> = records.iter().map(|r| pred(r)).collect();
        assert_eq!(hits, vec![false, true, true]);
    }

    #[test]
    fn test_not_and_or() {
        let record = json!({"a": 1, "b": 2});
        let a = Query::term("a", 1i64);
        let b = Query::term("b", 3i64);
        assert!(matches(&Query::or(vec![a.clone(), b.clone()]), &record));
        assert!(!matches(&Query::and(vec![a.clone(), b.clone()]), &record));
        assert!(!matches(&Query::not(vec![a, b.clone()]), &record));
        assert!(matches(&Query::not(vec![b]), &record));
        assert!(matches(&Query::and(vec![]), &record));
        assert!(!matches(&Query::or(vec![]), &record));
    }

    #[test]
    fn test_date_range_with_fixed_clock() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let compiler: PredicateCompiler<Json> =
            PredicateCompiler::with_clock(Arc::new(JsonPathEvaluator), Arc::new(now));
        let now_ms = now.timestamp_millis();

        let lt_now = compiler
            .compile(&DateRangeQuery::new("ts").lt("now").into())
            .unwrap();
        assert!(!lt_now(&json!({"ts": now_ms})));
        assert!(lt_now(&json!({"ts": now_ms - 1})));

        let midnight = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap().timestamp_millis();
        let lt_day = compiler
            .compile(&DateRangeQuery::new("ts").lt("now/d").into())
            .unwrap();
        assert!(!lt_day(&json!({"ts": midnight})));
        assert!(lt_day(&json!({"ts": midnight - 1})));

        let lte_day = compiler
            .compile(&DateRangeQuery::new("ts").lte("now/d").into())
            .unwrap();
        assert!(lte_day(&json!({"ts": now_ms})));
    }

    #[test]
    fn test_date_range_parses_record_strings() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let compiler: PredicateCompiler<Json> =
            PredicateCompiler::with_clock(Arc::new(JsonPathEvaluator), Arc::new(now));
        let q: Query = DateRangeQuery::new("ts").gte("2024-03-01").lt("now").into();
        let pred = compiler.compile(&q).unwrap();
        assert!(pred(&json!({"ts": "2024-03-05T08:00:00Z"})));
        assert!(!pred(&json!({"ts": "2024-02-28T08:00:00Z"})));
    }

    #[test]
    fn test_date_range_in_named_time_zone() {
        // 21:00 on March 9th in New York
        let ts = Utc.with_ymd_and_hms(2024, 3, 10, 2, 0, 0).unwrap().timestamp_millis();
        let record = json!({"ts": ts});

        let new_york: Query = DateRangeQuery::new("ts")
            .lt("2024-03-10")
            .time_zone("America/New_York")
            .into();
        assert!(matches(&new_york, &record));

        let offset: Query = DateRangeQuery::new("ts").lt("2024-03-10").time_zone("-05:00").into();
        assert!(matches(&offset, &record));

        let utc: Query = DateRangeQuery::new("ts").lt("2024-03-10").into();
        assert!(!matches(&utc, &record));
    }

    #[test]
    fn test_unexpanded_queries_are_unsupported() {
        let err = compiler().compile(&Query::lucene("a:b", None)).err().unwrap();
        assert!(matches!(err, Error::Unsupported(_)));
        let err = compiler().compile(&Query::named("x", "y")).err().unwrap();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn test_invalid_regex() {
        let err = compiler().compile(&Query::regex("a", "(")).err().unwrap();
        assert!(matches!(err, Error::InvalidQuery(_)));
    }
}
