use async_trait::async_trait;
use quarry::config::TransformConfig;
use quarry::dao::{QueryTransformingSearchDao, SearchDao};
use quarry::model::{
    Agg, AggResult, Bucket, DocSort, Field, Query, RangeQuery, SearchRequest, SearchResult,
};
use quarry::{Error, Result, Value};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Delegate that speaks only the storage vocabulary. It records what it was
/// asked and echoes the storage-side fields back.
#[derive(Default)]
struct StorageDao {
    last: Mutex<Option<SearchRequest>>,
    last_query: Mutex<Option<Query>>,
    aggs: BTreeMap<String, AggResult>,
}

impl StorageDao {
    fn last_request(&self) -> SearchRequest {
        self.last.lock().unwrap().clone().expect("no search recorded")
    }
}

#[async_trait]
impl SearchDao<Json> for StorageDao {
    async fn create(&self, _entity: Json) -> Result<Json> {
        Err(Error::NotImplemented("create".to_string()))
    }

    async fn delete_by_id(&self, _id: &str) -> Result<bool> {
        Ok(true)
    }

    async fn find_by_id(&self, _id: &str) -> Result<Option<Json>> {
        Ok(None)
    }

    async fn save(&self, _id: &str, entity: Json) -> Result<Json> {
        Ok(entity)
    }

    async fn search(&self, request: SearchRequest) -> Result<SearchResult<Json>> {
        *self.last_query.lock().unwrap() = request.query.clone();
        *self.last.lock().unwrap() = Some(request.clone());
        Ok(SearchResult {
            aggs: self.aggs.clone(),
            items: Some(Vec::new()),
            rows: None,
            total_items: 7,
            fields: request.fields,
        })
    }
}

fn config() -> TransformConfig {
    TransformConfig::from_yaml_str(
        r#"
aliases:
  a:
    name: real_a
    label: A
  email:
    name: contact.email
field_sets:
  contact:
    - name: email
named_queries:
  adults:
    type: range
    field: person.age
    gte: 18
named_aggs:
  segments:
    key: segments
    type: filters
    filters:
      young:
        type: range
        field: person.age
        lt: 30
      old:
        type: range
        field: person.age
        gte: 30
  by_status:
    key: by_status
    type: terms
    field: status
"#,
    )
    .unwrap()
}

fn decorate(storage: Arc<StorageDao>) -> QueryTransformingSearchDao<Json> {
    QueryTransformingSearchDao::from_config(storage, &config())
}

#[tokio::test]
async fn test_alias_round_trip() {
    let storage = Arc::new(StorageDao::default());
    let dao = decorate(storage.clone());

    let request = SearchRequest::new(Query::term("a", 1i64))
        .with_fields(vec![Field::named("a")])
        .with_sorts(vec![DocSort::desc("a")]);
    let result = dao.search(request).await.unwrap();

    let sent = storage.last_request();
    assert_eq!(sent.query, Some(Query::term("real_a", 1i64)));
    assert_eq!(sent.fields[0].name.as_deref(), Some("real_a"));
    assert_eq!(sent.fields[0].label.as_deref(), Some("A"));
    assert_eq!(sent.sorts, vec![DocSort::desc("real_a")]);

    assert_eq!(result.fields, vec![Field::named("a")]);
    assert_eq!(result.total_items, 7);
}

#[tokio::test]
async fn test_text_query_is_parsed_then_aliased() {
    let storage = Arc::new(StorageDao::default());
    let dao = decorate(storage.clone());

    let query = Query::and(vec![
        Query::lucene("a:1 OR email:*@example.com", None),
        Query::named("adults", Value::Null),
    ]);
    dao.search(SearchRequest::new(query)).await.unwrap();

    assert_eq!(
        storage.last_request().query,
        Some(Query::and(vec![
            Query::or(vec![
                Query::term("real_a", 1i64),
                Query::wildcard("contact.email", "*@example.com"),
            ]),
            RangeQuery::new("person.age").gte(18i64).into(),
        ]))
    );
}

#[tokio::test]
async fn test_field_set_is_expanded_and_cleared() {
    let storage = Arc::new(StorageDao::default());
    let dao = decorate(storage.clone());

    let request = SearchRequest::default()
        .with_fields(vec![Field::named("a")])
        .with_field_set("contact");
    let result = dao.search(request.clone()).await.unwrap();

    let sent = storage.last_request();
    let names: Vec<_> = sent.fields.iter().filter_map(|f| f.name.as_deref()).collect();
    assert_eq!(names, vec!["real_a", "contact.email"]);
    assert!(sent.field_set.is_none());
    assert_eq!(result.fields, request.fields);
}

#[tokio::test]
async fn test_named_aggs_are_expanded_and_restored() {
    let mut canned = BTreeMap::new();
    canned.insert(
        "seg".to_string(),
        AggResult::with_buckets("seg", vec![Bucket::new("young", 3), Bucket::new("old", 4)]),
    );
    canned.insert(
        "statuses".to_string(),
        AggResult::with_buckets("statuses", vec![Bucket::new("active", 5)]),
    );
    canned.insert("stray".to_string(), AggResult::with_value("stray", Value::Long(1)));
    let storage = Arc::new(StorageDao {
        aggs: canned,
        ..Default::default()
    });
    let dao = decorate(storage.clone());

    let request = SearchRequest::default().with_aggs(vec![
        Agg::named("seg", "segments"),
        Agg::named("statuses", "by_status"),
    ]);
    let result = dao.search(request).await.unwrap();

    let sent = storage.last_request();
    assert_eq!(sent.aggs[0].key, "seg");
    assert_eq!(sent.aggs[0].kind.name(), "filters");
    assert_eq!(sent.aggs[1].field(), Some("status"));

    assert!(!result.aggs.contains_key("stray"));
    let young = result.aggs["seg"].bucket(&Value::from("young")).unwrap();
    assert_eq!(
        young.query,
        Some(RangeQuery::new("person.age").lt(30i64).into())
    );
    assert_eq!(result.aggs["statuses"].field.as_deref(), Some("status"));
}

#[tokio::test]
async fn test_count_and_find_one_rewrite_queries() {
    let storage = Arc::new(StorageDao::default());
    let dao = decorate(storage.clone());

    assert_eq!(dao.count(Query::named("by_status", "idle")).await.unwrap(), 7);
    assert_eq!(
        storage.last_query.lock().unwrap().clone(),
        Some(Query::term("status", "idle"))
    );

    assert!(dao.find_one(Query::term("email", "x@y")).await.unwrap().is_none());
    assert_eq!(
        storage.last_query.lock().unwrap().clone(),
        Some(Query::term("contact.email", "x@y"))
    );
}

#[tokio::test]
async fn test_unknown_named_query_fails() {
    let dao = decorate(Arc::new(StorageDao::default()));
    let err = dao
        .search(SearchRequest::new(Query::named("nope", "x")))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_crud_passes_through() {
    let dao = decorate(Arc::new(StorageDao::default()));
    assert!(matches!(
        dao.create(Json::Null).await.unwrap_err(),
        Error::NotImplemented(_)
    ));
    assert!(dao.delete_by_id("1").await.unwrap());
    assert!(dao.find_by_id("1").await.unwrap().is_none());
}
