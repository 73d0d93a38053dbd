//! Date math expressions: `now-7d/d`, `2024-03-01||+1M`, `2024-03`.
//!
//! Expressions are evaluated in a [`Zone`], either a fixed offset or an IANA
//! region id. Rounding (`/unit`) goes to the start of the unit, or to its last
//! millisecond when rounding up.

use crate::{Error, Result};
use chrono::{
    DateTime, Datelike, Days, FixedOffset, Months, NaiveDate, NaiveDateTime, Offset, TimeDelta,
    TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;

/// Time zone a date expression is evaluated in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Fixed(FixedOffset),
    Named(Tz),
}

impl Zone {
    pub fn utc() -> Zone {
        Zone::Fixed(Utc.fix())
    }

    /// Offset in effect at `instant`
    pub fn offset_at(&self, instant: &DateTime<Utc>) -> FixedOffset {
        match self {
            Zone::Fixed(offset) => *offset,
            Zone::Named(tz) => tz.offset_from_utc_datetime(&instant.naive_utc()).fix(),
        }
    }

    /// Wall-clock view of `instant` in this zone
    pub fn localize(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset_at(&instant))
    }

    /// Instant of a wall-clock time. Ambiguous times take the earlier
    /// instant; times skipped by a DST gap move forward one hour.
    pub fn from_local(&self, naive: NaiveDateTime) -> Result<DateTime<FixedOffset>> {
        let resolved = match self {
            Zone::Fixed(offset) => offset.from_local_datetime(&naive).single(),
            Zone::Named(tz) => tz
                .from_local_datetime(&naive)
                .earliest()
                .or_else(|| {
                    TimeDelta::try_hours(1)
                        .and_then(|hour| naive.checked_add_signed(hour))
                        .and_then(|later| tz.from_local_datetime(&later).earliest())
                })
                .map(|dt| dt.with_timezone(&dt.offset().fix())),
        };
        resolved.ok_or_else(|| Error::DateMath(format!("Invalid local time {}", naive)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
}

impl Unit {
    pub fn from_symbol(c: char) -> Option<Unit> {
        match c {
            'y' => Some(Unit::Year),
            'M' => Some(Unit::Month),
            'w' => Some(Unit::Week),
            'd' => Some(Unit::Day),
            'h' | 'H' => Some(Unit::Hour),
            'm' => Some(Unit::Minute),
            's' => Some(Unit::Second),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Unit::Year => 'y',
            Unit::Month => 'M',
            Unit::Week => 'w',
            Unit::Day => 'd',
            Unit::Hour => 'h',
            Unit::Minute => 'm',
            Unit::Second => 's',
        }
    }

    fn fixed_millis(self) -> Option<i64> {
        match self {
            Unit::Week => Some(7 * 86_400_000),
            Unit::Day => Some(86_400_000),
            Unit::Hour => Some(3_600_000),
            Unit::Minute => Some(60_000),
            Unit::Second => Some(1_000),
            Unit::Year | Unit::Month => None,
        }
    }

    /// Start of the unit containing `dt`, on `zone`'s wall clock
    pub fn floor(self, dt: DateTime<FixedOffset>, zone: &Zone) -> Result<DateTime<FixedOffset>> {
        let dt = zone.localize(dt.with_timezone(&Utc));
        let date = dt.date_naive();
        let naive = match self {
            Unit::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)),
            Unit::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
            Unit::Week => date
                .checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
            Unit::Day => date.and_hms_opt(0, 0, 0),
            Unit::Hour => date.and_hms_opt(dt.hour(), 0, 0),
            Unit::Minute => date.and_hms_opt(dt.hour(), dt.minute(), 0),
            Unit::Second => date.and_hms_opt(dt.hour(), dt.minute(), dt.second()),
        }
        .ok_or_else(|| Error::DateMath(format!("Cannot round {} to {:?}", dt, self)))?;
        if self.fixed_millis().is_some_and(|ms| ms < 86_400_000) {
            // within the hour the offset in effect at `dt` still applies
            return Zone::Fixed(*dt.offset()).from_local(naive);
        }
        zone.from_local(naive)
    }

    /// Last millisecond of the unit containing `dt`
    pub fn ceil(self, dt: DateTime<FixedOffset>, zone: &Zone) -> Result<DateTime<FixedOffset>> {
        let next = self.add(self.floor(dt, zone)?, 1, zone)?;
        Ok(next - TimeDelta::milliseconds(1))
    }

    /// Calendar units move the wall clock; hours and smaller move the instant.
    pub fn add(self, dt: DateTime<FixedOffset>, n: i64, zone: &Zone) -> Result<DateTime<FixedOffset>> {
        let overflow = || Error::DateMath(format!("Date overflow adding {}{}", n, self.symbol()));
        let exact = match self {
            Unit::Hour => TimeDelta::try_hours(n),
            Unit::Minute => TimeDelta::try_minutes(n),
            Unit::Second => TimeDelta::try_seconds(n),
            Unit::Year | Unit::Month | Unit::Week | Unit::Day => None,
        };
        if let Some(delta) = exact {
            let shifted = dt.checked_add_signed(delta).ok_or_else(overflow)?;
            return Ok(zone.localize(shifted.with_timezone(&Utc)));
        }

        let naive = zone.localize(dt.with_timezone(&Utc)).naive_local();
        let shifted = match self {
            Unit::Year => n.checked_mul(12).and_then(|months| shift_months(naive, months)),
            Unit::Month => shift_months(naive, n),
            Unit::Week => TimeDelta::try_weeks(n).and_then(|d| naive.checked_add_signed(d)),
            Unit::Day => TimeDelta::try_days(n).and_then(|d| naive.checked_add_signed(d)),
            Unit::Hour | Unit::Minute | Unit::Second => None,
        };
        zone.from_local(shifted.ok_or_else(overflow)?)
    }
}

fn shift_months(naive: NaiveDateTime, n: i64) -> Option<NaiveDateTime> {
    if n >= 0 {
        naive.checked_add_months(Months::new(u32::try_from(n).ok()?))
    } else {
        naive.checked_sub_months(Months::new(u32::try_from(n.checked_neg()?).ok()?))
    }
}

/// Resolve a time zone id: UTC aliases, fixed offsets (`+05:30`, `-0800`)
/// and IANA region ids (`Europe/Oslo`).
pub fn parse_time_zone(id: &str) -> Option<Zone> {
    let id = id.trim();
    match id {
        "UTC" | "utc" | "Z" | "GMT" | "Etc/UTC" | "Etc/GMT" => return Some(Zone::utc()),
        _ => {}
    }
    match id.chars().next()? {
        '+' | '-' => parse_offset(id).map(Zone::Fixed),
        _ => id.parse::<Tz>().ok().map(Zone::Named),
    }
}

fn parse_offset(id: &str) -> Option<FixedOffset> {
    let (sign, rest) = match id.chars().next()? {
        '+' => (1, &id[1..]),
        '-' => (-1, &id[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        1 | 2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if hours > 18 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Resolve an optional zone id, defaulting to UTC when unset or unknown
pub fn time_zone_or_utc(id: Option<&str>) -> Zone {
    match id {
        Some(id) => parse_time_zone(id).unwrap_or_else(|| {
            tracing::warn!(time_zone = id, "unknown time zone, using UTC");
            Zone::utc()
        }),
        None => Zone::utc(),
    }
}
/// A literal date plus the precision it was written with
fn parse_literal(text: &str, tz: &Zone) -> Result<(DateTime<FixedOffset>, Option<Unit>)> {
    let text = text.trim();
    let invalid = || Error::DateMath(format!("Unrecognized date '{}'", text));

    let is_digits = !text.is_empty()
        && text
            .trim_start_matches('-')
            .chars()
            .all(|c| c.is_ascii_digit());

    if is_digits && text.len() == 4 {
        let year = text.parse::<i32>().map_err(|_| invalid())?;
        let naive = NaiveDate::from_ymd_opt(year, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(invalid)?;
        return Ok((tz.from_local(naive)?, Some(Unit::Year)));
    }
    if is_digits {
        let millis = text.parse::<i64>().map_err(|_| invalid())?;
        let utc = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(invalid)?;
        return Ok((tz.localize(utc), None));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok((dt, None));
    }

    const DATE_TIME_FORMATS: &[(&str, Option<Unit>)] = &[
        ("%Y-%m-%dT%H:%M:%S%.f", None),
        ("%Y-%m-%dT%H:%M:%S", Some(Unit::Second)),
        ("%Y-%m-%d %H:%M:%S", Some(Unit::Second)),
        ("%Y-%m-%dT%H:%M", Some(Unit::Minute)),
        ("%Y-%m-%d %H:%M", Some(Unit::Minute)),
    ];
    for (format, precision) in DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            // "%.f" also accepts whole seconds; keep second precision for those
            let precision = if precision.is_none() && !text.contains('.') {
                Some(Unit::Second)
            } else {
                *precision
            };
            return Ok((tz.from_local(naive)?, precision));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
        return Ok((tz.from_local(naive)?, Some(Unit::Day)));
    }

    if let Some((year, month)) = text.split_once('-') {
        if year.len() == 4 && month.len() == 2 {
            let year = year.parse::<i32>().map_err(|_| invalid())?;
            let month = month.parse::<u32>().map_err(|_| invalid())?;
            let naive = NaiveDate::from_ymd_opt(year, month, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(invalid)?;
            return Ok((tz.from_local(naive)?, Some(Unit::Month)));
        }
    }

    Err(invalid())
}

fn apply_ops(
    mut dt: DateTime<FixedOffset>,
    zone: &Zone,
    ops: &str,
    round_up: bool,
    expr: &str,
) -> Result<DateTime<FixedOffset>> {
    let chars: Vec<char> = ops.chars().collect();
    let unit_at = |i: usize| -> Result<Unit> {
        chars
            .get(i)
            .copied()
            .and_then(Unit::from_symbol)
            .ok_or_else(|| Error::DateMath(format!("Expected a time unit at offset {} in '{}'", i, expr)))
    };

    let mut i = 0;
    while i < chars.len() {
        let op = chars[i];
        i += 1;
        match op {
            '/' => {
                let unit = unit_at(i)?;
                i += 1;
                dt = if round_up { unit.ceil(dt, zone)? } else { unit.floor(dt, zone)? };
            }
            '+' | '-' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let amount = if start == i {
                    1
                } else {
                    chars[start..i]
                        .iter()
                        .collect::<String>()
                        .parse::<i64>()
                        .map_err(|e| Error::DateMath(format!("Bad amount in '{}': {}", expr, e)))?
                };
                let unit = unit_at(i)?;
                i += 1;
                dt = unit.add(dt, if op == '-' { -amount } else { amount }, zone)?;
            }
            other => {
                return Err(Error::DateMath(format!(
                    "Unexpected '{}' in date math expression '{}'",
                    other, expr
                )))
            }
        }
    }
    Ok(dt)
}

pub struct DateMathParser;

impl DateMathParser {
    /// Evaluate `expr` relative to `now` in time zone `tz`.
    pub fn parse(
        expr: &str,
        now: DateTime<Utc>,
        round_up: bool,
        tz: &Zone,
    ) -> Result<DateTime<Utc>> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(Error::DateMath("Empty date expression".to_string()));
        }

        let resolved = if let Some(ops) = trimmed.strip_prefix("now") {
            apply_ops(tz.localize(now), tz, ops, round_up, trimmed)?
        } else if let Some((anchor, ops)) = trimmed.split_once("||") {
            let (anchor, _) = parse_literal(anchor, tz)?;
            apply_ops(anchor, tz, ops, round_up, trimmed)?
        } else {
            let (dt, precision) = parse_literal(trimmed, tz)?;
            match precision {
                Some(unit) if round_up => unit.ceil(dt, tz)?,
                _ => dt,
            }
        };
        Ok(resolved.with_timezone(&Utc))
    }
}

/// Bucketing interval for date histograms: `1d`, `30m`, `month`, `quarter`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub count: i64,
    pub unit: Unit,
}

impl Interval {
    pub fn parse(text: &str) -> Result<Interval> {
        let text = text.trim();
        let named = match text {
            "year" | "1y" => Some((1, Unit::Year)),
            "quarter" | "1q" => Some((3, Unit::Month)),
            "month" => Some((1, Unit::Month)),
            "week" => Some((1, Unit::Week)),
            "day" => Some((1, Unit::Day)),
            "hour" => Some((1, Unit::Hour)),
            "minute" => Some((1, Unit::Minute)),
            "second" => Some((1, Unit::Second)),
            _ => None,
        };
        if let Some((count, unit)) = named {
            return Ok(Interval { count, unit });
        }

        let invalid = || Error::InvalidQuery(format!("Invalid interval '{}'", text));
        let symbol = text.chars().last().ok_or_else(invalid)?;
        let unit = Unit::from_symbol(symbol).ok_or_else(invalid)?;
        let amount = &text[..text.len() - symbol.len_utf8()];
        let count = if amount.is_empty() {
            1
        } else {
            amount.parse::<i64>().map_err(|_| invalid())?
        };
        if count <= 0 {
            return Err(invalid());
        }
        Ok(Interval { count, unit })
    }

    /// The `+N<unit>` date math suffix for one interval step
    pub fn to_date_math(&self) -> String {
        format!("+{}{}", self.count, self.unit.symbol())
    }

    /// Start of the bucket containing `instant`
    pub fn bucket_start(&self, instant: DateTime<Utc>, tz: &Zone) -> Result<DateTime<Utc>> {
        let local_dt = tz.localize(instant);
        if self.count == 1 {
            return Ok(self.unit.floor(local_dt, tz)?.with_timezone(&Utc));
        }

        if let Some(unit_ms) = self.unit.fixed_millis() {
            let len = unit_ms * self.count;
            let offset_ms = i64::from(tz.offset_at(&instant).local_minus_utc()) * 1000;
            // weeks align on Monday 1969-12-29
            let shift = if self.unit == Unit::Week { 3 * 86_400_000 } else { 0 };
            let local_ms = instant.timestamp_millis() + offset_ms + shift;
            let start = local_ms - local_ms.rem_euclid(len) - shift - offset_ms;
            return DateTime::<Utc>::from_timestamp_millis(start)
                .ok_or_else(|| Error::DateMath(format!("Bucket start out of range for {}", instant)));
        }

        let months = if self.unit == Unit::Year { self.count * 12 } else { self.count };
        let floored = Unit::Month.floor(local_dt, tz)?;
        let index = i64::from(floored.year()) * 12 + i64::from(floored.month0());
        let aligned = index - index.rem_euclid(months);
        let year = i32::try_from(aligned.div_euclid(12))
            .map_err(|_| Error::DateMath("Year out of range".to_string()))?;
        let month = u32::try_from(aligned.rem_euclid(12) + 1)
            .map_err(|_| Error::DateMath("Month out of range".to_string()))?;
        let naive = NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| Error::DateMath(format!("Invalid bucket month {}-{}", year, month)))?;
        Ok(tz.from_local(naive)?.with_timezone(&Utc))
    }
}
