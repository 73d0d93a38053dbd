use quarry::model::{Query, RangeQuery};
use quarry::parser::LuceneParser;
use quarry::{Error, Value};

fn parse(text: &str) -> Query {
    LuceneParser::parse(text, None).unwrap()
}

#[test]
fn test_mixed_operators_and_grouping() {
    let query = parse("status:active AND (age:[18 TO *] OR vip:true) -banned:true");
    assert_eq!(
        query,
        Query::and(vec![
            Query::term("status", "active"),
            Query::or(vec![
                RangeQuery::new("age").gte(18i64).into(),
                Query::term("vip", true),
            ]),
            Query::not(vec![Query::term("banned", true)]),
        ])
    );
}

#[test]
fn test_or_binds_weaker_than_juxtaposition() {
    let query = parse("a:1 b:2 OR c:3");
    assert_eq!(
        query,
        Query::or(vec![
            Query::and(vec![Query::term("a", 1i64), Query::term("b", 2i64)]),
            Query::term("c", 3i64),
        ])
    );
}

#[test]
fn test_clause_kinds() {
    assert_eq!(parse("name:jo*"), Query::wildcard("name", "jo*"));
    assert_eq!(parse("_exists_:email"), Query::exists("email"));
    assert_eq!(parse("*"), Query::MatchAll);
    assert_eq!(
        parse("title:\"hello world\""),
        Query::phrase("title", vec!["hello".to_string(), "world".to_string()])
    );
    assert_eq!(
        parse("price:{1.5 TO 10]"),
        RangeQuery::new("price").gt(1.5).lte(10i64).into()
    );
}

#[test]
fn test_default_field() {
    assert_eq!(
        LuceneParser::parse("hello", Some("body")).unwrap(),
        Query::term("body", "hello")
    );
    match parse("hello") {
        Query::Term(term) => {
            assert_eq!(term.field, "_all");
            assert_eq!(term.value, Value::from("hello"));
        }
        other => panic!("Expected term, got {:?}", other),
    }
}

#[test]
fn test_malformed_input() {
    for text in ["", "(a:1", "a:1)", "a:1 AND"] {
        let err = LuceneParser::parse(text, None).unwrap_err();
        assert!(matches!(err, Error::Parse(_)), "{:?} gave {:?}", text, err);
    }
}
