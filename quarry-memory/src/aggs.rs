//! In-memory aggregation over an already filtered record set.
//!
//! Every bucketing aggregation counts a record at most once per bucket, even
//! when several of its values fall into the same bucket. Sub-aggregations run
//! over each bucket's records.

use crate::comparator::sort_order;
use crate::geo;
use crate::predicate::{date_value, PredicateCompiler};
use chrono::{DateTime, Utc};
use quarry::datemath::{time_zone_or_utc, DateMathParser, Interval, Zone};
use quarry::model::{
    Agg, AggKind, AggResult, BucketOrder, Bucket, DateRangeEntry, GeoPoint, Query, RangeEntry,
    Stats,
};
use quarry::path::{extract, extract_value};
use quarry::value::coerce;
use quarry::{Error, Result, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;

/// A bucket under construction together with the records it holds
struct Group<'a, R> {
    bucket: Bucket,
    records: Vec<&'a R>,
}

impl<'a, R> Group<'a, R> {
    fn new(key: Value) -> Self {
        Self {
            bucket: Bucket::new(key, 0),
            records: Vec::new(),
        }
    }

    fn bounded(key: Value, from: Option<Value>, to: Option<Value>) -> Self {
        let mut group = Self::new(key);
        group.bucket.from = from;
        group.bucket.to = to;
        group
    }
}

pub struct AggregationEngine<R> {
    compiler: PredicateCompiler<R>,
}

impl<R> Clone for AggregationEngine<R> {
    fn clone(&self) -> Self {
        Self {
            compiler: self.compiler.clone(),
        }
    }
}

impl<R: 'static> AggregationEngine<R> {
    pub fn new(compiler: PredicateCompiler<R>) -> Self {
        Self { compiler }
    }

    /// Compute every aggregation in `aggs` over `records`, keyed by `Agg::key`
    pub fn compute(&self, aggs: &[Agg], records: &[&R]) -> Result<BTreeMap<String, AggResult>> {
        let now = self.compiler.now();
        self.compute_at(aggs, records, now)
    }

    fn compute_at(
        &self,
        aggs: &[Agg],
        records: &[&R],
        now: DateTime<Utc>,
    ) -> Result<BTreeMap<String, AggResult>> {
        let mut results = BTreeMap::new();
        for agg in aggs {
            let result = self.aggregate(agg, records, now)?;
            results.insert(agg.key.clone(), result);
        }
        Ok(results)
    }

    fn aggregate(&self, agg: &Agg, records: &[&R], now: DateTime<Utc>) -> Result<AggResult> {
        tracing::trace!(key = %agg.key, kind = agg.kind.name(), records = records.len(), "computing aggregation");
        match &agg.kind {
            AggKind::Terms {
                field,
                size,
                sort,
                missing,
                ..
            } => {
                let mut groups = self.terms(records, field, missing.as_ref());
                sort_groups(&mut groups, sort.unwrap_or(BucketOrder::Count));
                retain_min_doc_count(agg, &mut groups);
                if let Some(size) = size {
                    groups.truncate(*size);
                }
                self.buckets(agg, groups, now)
            }
            AggKind::Histogram {
                field,
                interval,
                offset,
                missing,
            } => {
                let groups =
                    self.histogram(records, field, *interval, offset.unwrap_or(0.0), missing.as_ref())?;
                self.buckets(agg, groups, now)
            }
            AggKind::DateHistogram {
                field,
                interval,
                format,
                time_zone,
                missing,
            } => {
                let interval = Interval::parse(interval)?;
                let tz = time_zone_or_utc(time_zone.as_deref());
                let groups = self.date_histogram(
                    records,
                    field,
                    interval,
                    &tz,
                    format.as_deref(),
                    missing.as_ref(),
                )?;
                self.buckets(agg, groups, now)
            }
            AggKind::Range { field, ranges } => {
                let groups = ranges
                    .iter()
                    .map(|entry| self.numeric_range(records, field, entry))
                    .collect();
                self.buckets(agg, groups, now)
            }
            AggKind::DateRange {
                field,
                format,
                time_zone,
                ranges,
            } => {
                let tz = time_zone_or_utc(time_zone.as_deref());
                let groups = ranges
                    .iter()
                    .map(|entry| self.date_range(records, field, entry, now, &tz, format.as_deref()))
                    .collect::<Result<Vec<_>>>()?;
                self.buckets(agg, groups, now)
            }
            AggKind::Filters { filters } => {
                let groups = filters
                    .iter()
                    .map(|(key, query)| self.filter(records, key, query))
                    .collect::<Result<Vec<_>>>()?;
                self.buckets(agg, groups, now)
            }
            AggKind::Stats { field, .. } => {
                let numbers = records
                    .iter()
                    .flat_map(|r| self.values(r, field))
                    .filter_map(|v| coerce::to_double(&v));
                Ok(AggResult::with_stats(&agg.key, Stats::from_values(numbers)))
            }
            AggKind::Missing { field } => {
                let mut group = Group::new(Value::from("missing"));
                group.records = records
                    .iter()
                    .copied()
                    .filter(|r| self.values(r, field).iter().all(Value::is_null))
                    .collect();
                let count = group.records.len() as u64;
                let mut result = self.buckets(agg, vec![group], now)?;
                result.value = Some(Value::Long(count as i64));
                Ok(result)
            }
            AggKind::GeoBounds { field } => {
                let points = self.points(records, field);
                Ok(AggResult::with_value(&agg.key, bounds(&points)))
            }
            AggKind::GeoCentroid { field } => {
                let points = self.points(records, field);
                Ok(AggResult::with_value(&agg.key, centroid(&points)))
            }
            AggKind::GeoHash {
                field,
                precision,
                size,
            } => {
                let mut groups = self.geohash(records, field, *precision)?;
                sort_groups(&mut groups, BucketOrder::Count);
                retain_min_doc_count(agg, &mut groups);
                if let Some(size) = size {
                    groups.truncate(*size);
                }
                self.buckets(agg, groups, now)
            }
            AggKind::GeoDistance {
                field,
                origin,
                unit,
                ranges,
            } => {
                let meters = geo::unit_meters(unit.as_deref())?;
                let groups = ranges
                    .iter()
                    .map(|entry| self.distance_range(records, field, *origin, meters, entry))
                    .collect();
                self.buckets(agg, groups, now)
            }
            AggKind::Named { name } => Err(Error::Unsupported(format!(
                "Named aggregation '{}' must be resolved before execution",
                name
            ))),
        }
    }

    fn values(&self, record: &R, field: &str) -> Vec<Value> {
        extract(self.compiler.evaluator().as_ref(), record, field)
    }

    /// Field values, or the `missing` substitute when the field has none
    fn values_or(&self, record: &R, field: &str, missing: Option<&Value>) -> Vec<Value> {
        let values: Vec<Value> = self
            .values(record, field)
            .into_iter()
            .filter(|v| !v.is_null())
            .collect();
        match missing {
            Some(substitute) if values.is_empty() => vec![substitute.clone()],
            _ => values,
        }
    }

    fn points(&self, records: &[&R], field: &str) -> Vec<GeoPoint> {
        records
            .iter()
            .flat_map(|r| geo::points(&extract_value(self.compiler.evaluator().as_ref(), *r, field)))
            .collect()
    }

    /// Finish groups into buckets: apply `min_doc_count`, then sub-aggregations
    fn buckets<'a>(
        &self,
        agg: &Agg,
        mut groups: Vec<Group<'a, R>>,
        now: DateTime<Utc>,
    ) -> Result<AggResult> {
        retain_min_doc_count(agg, &mut groups);
        let mut buckets = Vec::with_capacity(groups.len());
        for group in groups {
            let mut bucket = group.bucket;
            bucket.count = group.records.len() as u64;
            if !agg.aggs.is_empty() {
                bucket.aggs = self.compute_at(&agg.aggs, &group.records, now)?;
            }
            buckets.push(bucket);
        }
        Ok(AggResult::with_buckets(&agg.key, buckets))
    }

    fn terms<'a>(&self, records: &[&'a R], field: &str, missing: Option<&Value>) -> Vec<Group<'a, R>> {
        let mut groups: Vec<Group<'a, R>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for &record in records {
            let mut seen = HashSet::new();
            for value in self.values_or(record, field, missing) {
                let text = value.to_string();
                if !seen.insert(text.clone()) {
                    continue;
                }
                let slot = match index.get(&text) {
                    Some(slot) => *slot,
                    None => {
                        groups.push(Group::new(value));
                        index.insert(text, groups.len() - 1);
                        groups.len() - 1
                    }
                };
                groups[slot].records.push(record);
            }
        }
        groups
    }

    fn histogram<'a>(
        &self,
        records: &[&'a R],
        field: &str,
        interval: f64,
        offset: f64,
        missing: Option<&Value>,
    ) -> Result<Vec<Group<'a, R>>> {
        if !interval.is_finite() || interval <= 0.0 {
            return Err(Error::InvalidQuery(format!(
                "Histogram interval must be positive, got {}",
                interval
            )));
        }

        let mut slots: BTreeMap<i64, Vec<&'a R>> = BTreeMap::new();
        for &record in records {
            let mut seen = HashSet::new();
            for value in self.values_or(record, field, missing) {
                let Some(n) = coerce::to_double(&value).filter(|n| n.is_finite()) else {
                    continue;
                };
                let slot = ((n - offset) / interval).floor() as i64;
                if seen.insert(slot) {
                    slots.entry(slot).or_default().push(record);
                }
            }
        }

        Ok(slots
            .into_iter()
            .map(|(slot, records)| {
                let start = slot as f64 * interval + offset;
                let mut group = Group::bounded(
                    Value::Double(start),
                    Some(Value::Double(start)),
                    Some(Value::Double(start + interval)),
                );
                group.records = records;
                group
            })
            .collect())
    }

    fn date_histogram<'a>(
        &self,
        records: &[&'a R],
        field: &str,
        interval: Interval,
        tz: &Zone,
        format: Option<&str>,
        missing: Option<&Value>,
    ) -> Result<Vec<Group<'a, R>>> {
        let mut slots: BTreeMap<i64, Vec<&'a R>> = BTreeMap::new();
        for &record in records {
            let mut seen = HashSet::new();
            for value in self.values_or(record, field, missing) {
                let Some(instant) = date_millis(value, tz).and_then(DateTime::<Utc>::from_timestamp_millis)
                else {
                    continue;
                };
                let start = match interval.bucket_start(instant, tz) {
                    Ok(start) => start.timestamp_millis(),
                    Err(e) => {
                        tracing::trace!(field, error = %e, "value outside bucketable range");
                        continue;
                    }
                };
                if seen.insert(start) {
                    slots.entry(start).or_default().push(record);
                }
            }
        }

        let mut groups = Vec::with_capacity(slots.len());
        for (start_ms, records) in slots {
            let start = DateTime::<Utc>::from_timestamp_millis(start_ms)
                .ok_or_else(|| Error::DateMath(format!("Bucket start {} out of range", start_ms)))?;
            let end = interval
                .unit
                .add(tz.localize(start), interval.count, tz)?
                .with_timezone(&Utc);
            let mut group = Group::bounded(
                Value::Long(start_ms),
                Some(format_instant(start, tz, format)),
                Some(format_instant(end, tz, format)),
            );
            group.records = records;
            groups.push(group);
        }
        Ok(groups)
    }

    fn numeric_range<'a>(&self, records: &[&'a R], field: &str, entry: &RangeEntry) -> Group<'a, R> {
        let mut group = Group::bounded(
            Value::Str(entry.bucket_key()),
            entry.from.map(Value::Double),
            entry.to.map(Value::Double),
        );
        group.records = records
            .iter()
            .copied()
            .filter(|r| {
                self.values(r, field)
                    .iter()
                    .filter_map(coerce::to_double)
                    .any(|n| in_range(n, entry.from, entry.to))
            })
            .collect();
        group
    }

    fn date_range<'a>(
        &self,
        records: &[&'a R],
        field: &str,
        entry: &DateRangeEntry,
        now: DateTime<Utc>,
        tz: &Zone,
        format: Option<&str>,
    ) -> Result<Group<'a, R>> {
        let from = entry.from.as_ref().map(|b| resolve_date(b, now, tz)).transpose()?;
        let to = entry.to.as_ref().map(|b| resolve_date(b, now, tz)).transpose()?;

        let echo = |bound: Option<DateTime<Utc>>| bound.map(|instant| format_instant(instant, tz, format));
        let mut group = Group::bounded(Value::Str(entry.bucket_key()), echo(from), echo(to));

        let from_ms = from.map(|instant| instant.timestamp_millis());
        let to_ms = to.map(|instant| instant.timestamp_millis());
        group.records = records
            .iter()
            .copied()
            .filter(|r| {
                self.values(r, field)
                    .into_iter()
                    .filter_map(|v| date_millis(v, tz))
                    .any(|ms| from_ms.map_or(true, |f| ms >= f) && to_ms.map_or(true, |t| ms < t))
            })
            .collect();
        Ok(group)
    }

    fn filter<'a>(&self, records: &[&'a R], key: &str, query: &Query) -> Result<Group<'a, R>> {
        let predicate = self.compiler.compile(query)?;
        let mut group = Group::new(Value::from(key));
        group.bucket.query = Some(query.clone());
        group.records = records.iter().copied().filter(|r| predicate(*r)).collect();
        Ok(group)
    }

    fn geohash<'a>(&self, records: &[&'a R], field: &str, precision: usize) -> Result<Vec<Group<'a, R>>> {
        let mut groups: Vec<Group<'a, R>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for &record in records {
            let raw = extract_value(self.compiler.evaluator().as_ref(), record, field);
            let mut seen = HashSet::new();
            for point in geo::points(&raw) {
                let hash = geo::geohash(point, precision)?;
                if !seen.insert(hash.clone()) {
                    continue;
                }
                let slot = match index.get(&hash) {
                    Some(slot) => *slot,
                    None => {
                        groups.push(Group::new(Value::Str(hash.clone())));
                        index.insert(hash, groups.len() - 1);
                        groups.len() - 1
                    }
                };
                groups[slot].records.push(record);
            }
        }
        Ok(groups)
    }

    fn distance_range<'a>(
        &self,
        records: &[&'a R],
        field: &str,
        origin: GeoPoint,
        unit_meters: f64,
        entry: &RangeEntry,
    ) -> Group<'a, R> {
        let mut group = Group::bounded(
            Value::Str(entry.bucket_key()),
            entry.from.map(Value::Double),
            entry.to.map(Value::Double),
        );
        group.records = records
            .iter()
            .copied()
            .filter(|r| {
                let raw = extract_value(self.compiler.evaluator().as_ref(), *r, field);
                geo::points(&raw)
                    .into_iter()
                    .map(|p| geo::distance_m(origin, p) / unit_meters)
                    .any(|d| in_range(d, entry.from, entry.to))
            })
            .collect();
        group
    }
}

fn retain_min_doc_count<R>(agg: &Agg, groups: &mut Vec<Group<'_, R>>) {
    if let Some(min) = agg.min_doc_count {
        groups.retain(|g| g.records.len() as u64 >= min);
    }
}

fn sort_groups<R>(groups: &mut [Group<'_, R>], order: BucketOrder) {
    match order {
        BucketOrder::Count => groups.sort_by(|a, b| {
            b.records
                .len()
                .cmp(&a.records.len())
                .then_with(|| sort_order(&a.bucket.key, &b.bucket.key))
        }),
        BucketOrder::Key => groups.sort_by(|a, b| sort_order(&a.bucket.key, &b.bucket.key)),
    }
}

/// `from` inclusive, `to` exclusive
fn in_range(n: f64, from: Option<f64>, to: Option<f64>) -> bool {
    from.map_or(true, |f| n >= f) && to.map_or(true, |t| n < t)
}

/// Epoch millis of a record value holding a date
fn date_millis(value: Value, tz: &Zone) -> Option<i64> {
    match date_value(value, tz) {
        Value::Int(n) => Some(i64::from(n)),
        Value::Long(n) => Some(n),
        other @ (Value::Float(_) | Value::Double(_)) => coerce::to_long(&other),
        _ => None,
    }
}

fn resolve_date(bound: &Value, now: DateTime<Utc>, tz: &Zone) -> Result<DateTime<Utc>> {
    let millis = match bound {
        Value::Str(expr) => return DateMathParser::parse(expr, now, false, tz),
        other => coerce::to_long(other),
    };
    millis
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .ok_or_else(|| Error::InvalidQuery(format!("Invalid date range bound {}", bound)))
}

/// Epoch millis, or the instant rendered with a strftime pattern
fn format_instant(instant: DateTime<Utc>, tz: &Zone, format: Option<&str>) -> Value {
    let Some(pattern) = format else {
        return Value::Long(instant.timestamp_millis());
    };
    let mut text = String::new();
    match write!(text, "{}", tz.localize(instant).format(pattern)) {
        Ok(()) => Value::Str(text),
        Err(_) => {
            tracing::warn!(pattern, "invalid date format, returning epoch millis");
            Value::Long(instant.timestamp_millis())
        }
    }
}

fn bounds(points: &[GeoPoint]) -> Value {
    let Some(first) = points.first() else {
        return Value::Null;
    };
    let (mut top, mut bottom, mut left, mut right) = (first.lat, first.lat, first.lon, first.lon);
    for p in &points[1..] {
        top = top.max(p.lat);
        bottom = bottom.min(p.lat);
        left = left.min(p.lon);
        right = right.max(p.lon);
    }
    let mut value = BTreeMap::new();
    value.insert("top_left".to_string(), lat_lon(top, left));
    value.insert("bottom_right".to_string(), lat_lon(bottom, right));
    Value::Map(value)
}

fn centroid(points: &[GeoPoint]) -> Value {
    if points.is_empty() {
        return Value::Null;
    }
    let n = points.len() as f64;
    let lat = points.iter().map(|p| p.lat).sum::<f64>() / n;
    let lon = points.iter().map(|p| p.lon).sum::<f64>() / n;
    let Value::Map(mut value) = lat_lon(lat, lon) else {
        return Value::Null;
    };
    value.insert("count".to_string(), Value::Long(points.len() as i64));
    Value::Map(value)
}

fn lat_lon(lat: f64, lon: f64) -> Value {
    let mut map = BTreeMap::new();
    map.insert("lat".to_string(), Value::Double(lat));
    map.insert("lon".to_string(), Value::Double(lon));
    Value::Map(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use quarry::model::RangeQuery;
    use quarry::path::JsonPathEvaluator;
    use serde_json::{json, Value as Json};
    use std::sync::Arc;

    fn engine() -> AggregationEngine<Json> {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        AggregationEngine::new(PredicateCompiler::with_clock(
            Arc::new(JsonPathEvaluator),
            Arc::new(now),
        ))
    }

    fn run(agg: Agg, records: &[Json]) -> AggResult {
        let refs: Vec<&Json> = records.iter().collect();
        let key = agg.key.clone();
        engine().compute(&[agg], &refs).unwrap().remove(&key).unwrap()
    }

    fn counts(result: &AggResult) -> Vec<(Value, u64)> {
        result
            .buckets
            .as_ref()
            .unwrap()
            .iter()
            .map(|b| (b.key.clone(), b.count))
            .collect()
    }

    fn people() -> Vec<Json> {
        vec![
            json!({"name": "ann", "status": "active", "age": 31, "tags": ["a", "b", "a"]}),
            json!({"name": "bob", "status": "idle", "age": 17, "tags": ["b"]}),
            json!({"name": "cid", "status": "active", "age": 45}),
            json!({"name": "dee", "status": "gone", "age": 22, "tags": []}),
        ]
    }

    #[test]
    fn test_terms_count_order_and_size() {
        let result = run(Agg::terms("by_status", "status"), &people());
        assert_eq!(
            counts(&result),
            vec![
                (Value::from("active"), 2),
                (Value::from("gone"), 1),
                (Value::from("idle"), 1),
            ]
        );

        let mut agg = Agg::terms("by_status", "status");
        if let AggKind::Terms { size, sort, .. } = &mut agg.kind {
            *size = Some(2);
            *sort = Some(BucketOrder::Key);
        }
        let result = run(agg, &people());
        assert_eq!(
            counts(&result),
            vec![(Value::from("active"), 2), (Value::from("gone"), 1)]
        );
    }

    #[test]
    fn test_terms_count_each_record_once_and_missing() {
        let mut agg = Agg::terms("tags", "tags");
        if let AggKind::Terms { missing, .. } = &mut agg.kind {
            *missing = Some(Value::from("none"));
        }
        let result = run(agg, &people());
        assert_eq!(
            counts(&result),
            vec![
                (Value::from("b"), 2),
                (Value::from("none"), 2),
                (Value::from("a"), 1),
            ]
        );
    }

    #[test]
    fn test_histogram_with_offset_and_min_doc_count() {
        let result = run(Agg::histogram("ages", "age", 10.0), &people());
        assert_eq!(
            counts(&result),
            vec![
                (Value::Double(10.0), 1),
                (Value::Double(20.0), 1),
                (Value::Double(30.0), 1),
                (Value::Double(40.0), 1),
            ]
        );

        let mut agg = Agg::histogram("ages", "age", 20.0).with_min_doc_count(2);
        if let AggKind::Histogram { offset, .. } = &mut agg.kind {
            *offset = Some(5.0);
        }
        let result = run(agg, &people());
        assert_eq!(counts(&result), vec![(Value::Double(5.0), 2)]);
    }

    #[test]
    fn test_histogram_rejects_zero_interval() {
        let refs: Vec<&Json> = Vec::new();
        let err = engine()
            .compute(&[Agg::histogram("h", "age", 0.0)], &refs)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));
    }

    #[test]
    fn test_date_histogram_daily_buckets() {
        let records = vec![
            json!({"ts": "2024-03-01T08:00:00Z"}),
            json!({"ts": "2024-03-01T23:59:59Z"}),
            json!({"ts": "2024-03-03T00:00:00Z"}),
        ];
        let day1 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap().timestamp_millis();
        let day3 = Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap().timestamp_millis();
        let result = run(Agg::date_histogram("per_day", "ts", "1d"), &records);
        assert_eq!(counts(&result), vec![(Value::Long(day1), 2), (Value::Long(day3), 1)]);

        let first = &result.buckets.as_ref().unwrap()[0];
        assert_eq!(first.to, Some(Value::Long(day1 + 86_400_000)));
    }

    #[test]
    fn test_date_histogram_format_and_time_zone() {
        let mut agg = Agg::date_histogram("per_month", "ts", "month");
        if let AggKind::DateHistogram { format, time_zone, .. } = &mut agg.kind {
            *format = Some("%Y-%m".to_string());
            *time_zone = Some("+02:00".to_string());
        }
        // 23:30 UTC on Jan 31 is already February at +02:00
        let records = vec![json!({"ts": "2024-01-31T23:30:00Z"})];
        let result = run(agg, &records);
        let bucket = &result.buckets.as_ref().unwrap()[0];
        assert_eq!(bucket.from, Some(Value::from("2024-02")));
        assert_eq!(bucket.to, Some(Value::from("2024-03")));
    }

    #[test]
    fn test_date_histogram_named_time_zone_spans_dst() {
        let mut agg = Agg::date_histogram("per_day", "ts", "day");
        if let AggKind::DateHistogram { time_zone, .. } = &mut agg.kind {
            *time_zone = Some("America/New_York".to_string());
        }
        let records = vec![
            json!({"ts": "2024-03-10T04:30:00Z"}),
            json!({"ts": "2024-03-10T05:30:00Z"}),
        ];
        let result = run(agg, &records);

        let ms = |h| Utc.with_ymd_and_hms(2024, 3, 10, h, 0, 0).unwrap().timestamp_millis();
        let day9 = Utc.with_ymd_and_hms(2024, 3, 9, 5, 0, 0).unwrap().timestamp_millis();
        assert_eq!(counts(&result), vec![(Value::Long(day9), 1), (Value::Long(ms(5)), 1)]);

        // the 10th loses an hour to daylight saving
        let day10 = &result.buckets.as_ref().unwrap()[1];
        assert_eq!(day10.to, Some(Value::Long(ms(5) + 23 * 3_600_000)));
    }

    #[test]
    fn test_numeric_range_bounds() {
        let agg = Agg::range(
            "age_bands",
            "age",
            vec![
                RangeEntry::new(None, Some(18.0)),
                RangeEntry::new(Some(18.0), Some(31.0)),
                RangeEntry::keyed("senior", Some(31.0), None),
            ],
        );
        let result = run(agg, &people());
        assert_eq!(
            counts(&result),
            vec![
                (Value::from("*-18"), 1),
                (Value::from("18-31"), 1),
                (Value::from("senior"), 2),
            ]
        );
        let band = result.bucket(&Value::from("18-31")).unwrap();
        assert_eq!(band.from, Some(Value::Double(18.0)));
        assert_eq!(band.to, Some(Value::Double(31.0)));
    }

    #[test]
    fn test_date_range_resolves_date_math() {
        let records = vec![
            json!({"ts": "2024-03-10T01:00:00Z"}),
            json!({"ts": "2024-03-09T23:00:00Z"}),
        ];
        let agg = Agg::date_range(
            "recent",
            "ts",
            vec![DateRangeEntry {
                key: Some("today".to_string()),
                from: Some(Value::from("now/d")),
                to: None,
            }],
        );
        let result = run(agg, &records);
        assert_eq!(counts(&result), vec![(Value::from("today"), 1)]);
        let midnight = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap().timestamp_millis();
        assert_eq!(
            result.buckets.as_ref().unwrap()[0].from,
            Some(Value::Long(midnight))
        );
    }

    #[test]
    fn test_filters_attach_query_and_sub_aggs() {
        let mut filters = BTreeMap::new();
        filters.insert("active".to_string(), Query::term("status", "active"));
        filters.insert("minors".to_string(), RangeQuery::new("age").lt(18).into());
        let agg = Agg::filters("groups", filters).with_aggs(vec![Agg::stats("age_stats", "age")]);

        let result = run(agg, &people());
        let active = result.bucket(&Value::from("active")).unwrap();
        assert_eq!(active.count, 2);
        assert_eq!(active.query, Some(Query::term("status", "active")));
        let stats = active.aggs["age_stats"].stats.as_ref().unwrap();
        assert_eq!(stats.min, Some(31.0));
        assert_eq!(stats.max, Some(45.0));
        assert_eq!(result.bucket(&Value::from("minors")).unwrap().count, 1);
    }

    #[test]
    fn test_stats_and_missing() {
        let stats = run(Agg::stats("age", "age"), &people()).stats.unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.sum, 115.0);

        let missing = run(Agg::missing("no_tags", "tags"), &people());
        assert_eq!(missing.value, Some(Value::Long(2)));
        assert_eq!(counts(&missing), vec![(Value::from("missing"), 2)]);
    }

    #[test]
    fn test_geo_aggregations() {
        let records = vec![
            json!({"loc": {"lat": 52.52, "lon": 13.40}}),
            json!({"loc": [13.41, 52.50]}),
            json!({"loc": "48.14,11.58"}),
            json!({"name": "no location"}),
        ];

        let bounds = run(
            Agg::new("b", AggKind::GeoBounds { field: "loc".into() }),
            &records,
        );
        let Some(Value::Map(b)) = bounds.value else {
            panic!("expected bounds map");
        };
        assert_eq!(b["top_left"], lat_lon(52.52, 11.58));
        assert_eq!(b["bottom_right"], lat_lon(48.14, 13.41));

        let centroid = run(
            Agg::new("c", AggKind::GeoCentroid { field: "loc".into() }),
            &records,
        );
        let Some(Value::Map(c)) = centroid.value else {
            panic!("expected centroid map");
        };
        assert_eq!(c["count"], Value::Long(3));

        let cells = run(
            Agg::new(
                "cells",
                AggKind::GeoHash {
                    field: "loc".into(),
                    precision: 3,
                    size: None,
                },
            ),
            &records,
        );
        assert_eq!(counts(&cells), vec![(Value::from("u33"), 2), (Value::from("u28"), 1)]);

        let rings = run(
            Agg::new(
                "rings",
                AggKind::GeoDistance {
                    field: "loc".into(),
                    origin: GeoPoint { lat: 52.52, lon: 13.40 },
                    unit: Some("km".into()),
                    ranges: vec![
                        RangeEntry::keyed("near", None, Some(10.0)),
                        RangeEntry::keyed("far", Some(10.0), None),
                    ],
                },
            ),
            &records,
        );
        assert_eq!(
            counts(&rings),
            vec![(Value::from("near"), 2), (Value::from("far"), 1)]
        );
    }

    #[test]
    fn test_named_agg_is_unsupported() {
        let refs: Vec<&Json> = Vec::new();
        let err = engine().compute(&[Agg::named("x", "status")], &refs).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
