use proptest::prelude::*;
use quarry::dao::SearchDao;
use quarry::model::{Query, RangeQuery, SearchRequest};
use quarry::path::JsonPathEvaluator;
use quarry::Value;
use quarry_memory::{compare, MapBackedSearchDao, PredicateCompiler};
use serde_json::{json, Value as Json};
use std::cmp::Ordering;
use std::sync::Arc;

fn compiler() -> PredicateCompiler<Json> {
    PredicateCompiler::new(Arc::new(JsonPathEvaluator))
}

fn matches(query: &Query, record: &Json) -> bool {
    compiler().compile(query).unwrap()(record)
}

fn small_query() -> impl Strategy<Value = Query> {
    prop_oneof![
        (0i64..5).prop_map(|n| Query::term("xs", n)),
        (0i64..5).prop_map(|n| RangeQuery::new("xs").gte(n).into()),
        (0i64..5).prop_map(|n| RangeQuery::new("xs").lt(n).into()),
        Just(Query::exists("xs")),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn prop_term_is_existential(xs in prop::collection::vec(0i64..10, 0..6), v in 0i64..10) {
        let record = json!({ "xs": xs });
        prop_assert_eq!(matches(&Query::term("xs", v), &record), xs.contains(&v));
    }

    #[test]
    fn prop_not_is_de_morgan(
        xs in prop::collection::vec(0i64..5, 0..4),
        a in small_query(),
        b in small_query(),
    ) {
        let record = json!({ "xs": xs });
        let negated = matches(&Query::not(vec![a.clone(), b.clone()]), &record);
        prop_assert_eq!(negated, !matches(&a, &record) && !matches(&b, &record));
    }

    #[test]
    fn prop_range_bounds_are_independent(xs in prop::collection::vec(0i64..10, 0..6)) {
        let record = json!({ "xs": xs });
        let q: Query = RangeQuery::new("xs").gte(2i64).lt(5i64).into();
        let expected = xs.iter().any(|x| *x >= 2) && xs.iter().any(|x| *x < 5);
        prop_assert_eq!(matches(&q, &record), expected);
    }

    #[test]
    fn prop_exists_needs_a_non_null_value(present in any::<bool>(), null in any::<bool>()) {
        let record = match (present, null) {
            (false, _) => json!({}),
            (true, true) => json!({ "f": null }),
            (true, false) => json!({ "f": "x" }),
        };
        prop_assert_eq!(matches(&Query::exists("f"), &record), present && !null);
    }

    #[test]
    fn prop_paging_arithmetic(n in 0usize..20, offset in 0u64..25, limit in 0u64..25) {
        let store = MapBackedSearchDao::json()
            .with_items((0..n).map(|i| (format!("{:03}", i), json!({ "i": i }))));
        let result = runtime()
            .block_on(store.search(SearchRequest::default().paged(offset, limit)))
            .unwrap();

        let (n, offset, limit) = (n as u64, offset, limit);
        let expected = if offset >= n { 0 } else { n.min(offset + limit) - offset };
        prop_assert_eq!(result.total_items, n);
        prop_assert_eq!(result.items_or_empty().len() as u64, expected);
    }

    #[test]
    fn prop_null_compares_below_everything(n in any::<i64>(), s in "[a-z]{0,4}") {
        prop_assert_eq!(compare(&Value::Null, &Value::Long(n)), Ordering::Less);
        prop_assert_eq!(compare(&Value::Null, &Value::Str(s)), Ordering::Less);
        prop_assert_eq!(compare(&Value::Null, &Value::Null), Ordering::Less);
    }
}

#[test]
fn test_age_scenario_pins_string_comparison() {
    let records = [json!({"age": 17}), json!({"age": 21}), json!({"age": "21"})];
    let query: Query = RangeQuery::new("age").gte(18i64).into();
    let hits: Vec<bool> = records.iter().map(|r| matches(&query, r)).collect();
    assert_eq!(hits, vec![false, true, true]);

    // "100" compares as a string against "18"
    assert!(!matches(&query, &json!({"age": "100"})));
}
