//! Store contract shared by backends and decorators.

mod transforming;

pub use transforming::{FieldSetMap, QueryTransformingSearchDao};

use crate::model::{Query, SearchRequest, SearchResult};
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait SearchDao<T: Send + Sync + 'static>: Send + Sync {
    /// Create an entity with a store-assigned id
    async fn create(&self, entity: T) -> Result<T>;

    /// Remove the entity stored under `id`
    async fn delete_by_id(&self, id: &str) -> Result<bool>;

    async fn find_by_id(&self, id: &str) -> Result<Option<T>>;

    /// Insert or replace the entity stored under `id`
    async fn save(&self, id: &str, entity: T) -> Result<T>;

    async fn search(&self, request: SearchRequest) -> Result<SearchResult<T>>;

    /// Number of entities matching `query`
    async fn count(&self, query: Query) -> Result<u64> {
        let result = self.search(SearchRequest::new(query).paged(0, 0)).await?;
        Ok(result.total_items)
    }

    /// First entity matching `query`
    async fn find_one(&self, query: Query) -> Result<Option<T>> {
        let result = self.search(SearchRequest::new(query).paged(0, 1)).await?;
        Ok(result.items.and_then(|items| items.into_iter().next()))
    }
}
