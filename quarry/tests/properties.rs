use chrono::{DateTime, Utc};
use proptest::prelude::*;
use quarry::datemath::{parse_time_zone, Interval, Unit, Zone};
use quarry::parser::LuceneParser;
use quarry::Error;

fn zone() -> impl Strategy<Value = Zone> {
    prop_oneof![
        Just("UTC"),
        Just("+05:30"),
        Just("-08:00"),
        Just("America/New_York"),
        Just("Europe/Oslo"),
        Just("Asia/Kolkata"),
    ]
    .prop_map(|id| parse_time_zone(id).unwrap())
}

fn unit() -> impl Strategy<Value = Unit> {
    prop_oneof![
        Just(Unit::Year),
        Just(Unit::Month),
        Just(Unit::Week),
        Just(Unit::Day),
        Just(Unit::Hour),
        Just(Unit::Minute),
        Just(Unit::Second),
    ]
}

// 1970-01-01 .. 2100-01-01
fn instant() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_102_444_800_000).prop_map(|ms| DateTime::<Utc>::from_timestamp_millis(ms).unwrap())
}

fn lucene_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("AND".to_string()),
            Just("OR".to_string()),
            Just("NOT".to_string()),
            Just("(".to_string()),
            Just(")".to_string()),
            Just("-".to_string()),
            Just("_exists_:f".to_string()),
            Just("[1 TO *]".to_string()),
            "[a-z]{1,4}(:[a-z0-9*?]{0,4})?",
            "\"[a-z ]{0,6}\"?",
        ],
        0..12,
    )
    .prop_map(|parts| parts.join(" "))
}

proptest! {
    #[test]
    fn prop_rounding_brackets_the_instant(t in instant(), zone in zone(), unit in unit()) {
        let local = zone.localize(t);
        let floor = unit.floor(local, &zone).unwrap().with_timezone(&Utc);
        let ceil = unit.ceil(local, &zone).unwrap().with_timezone(&Utc);
        prop_assert!(floor <= t, "floor {} after {}", floor, t);
        prop_assert!(t <= ceil, "ceil {} before {}", ceil, t);
    }

    #[test]
    fn prop_bucket_contains_the_instant(
        t in instant(),
        zone in zone(),
        interval in prop_oneof![
            Just("1d"), Just("6h"), Just("90m"), Just("2w"), Just("month"), Just("quarter"), Just("year"),
        ],
    ) {
        let interval = Interval::parse(interval).unwrap();
        let start = interval.bucket_start(t, &zone).unwrap();
        let end = interval
            .unit
            .add(zone.localize(start), interval.count, &zone)
            .unwrap()
            .with_timezone(&Utc);
        prop_assert!(start <= t && t < end, "{} not in [{}, {})", t, start, end);
    }

    #[test]
    fn prop_parser_only_fails_with_parse_errors(text in lucene_text()) {
        match LuceneParser::parse(&text, None) {
            Ok(_) => {}
            Err(Error::Parse(_)) => {}
            Err(other) => prop_assert!(false, "unexpected error {:?} for '{}'", other, text),
        }
    }
}
