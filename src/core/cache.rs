//! Storage abstractions backing the rate cache

use async_trait::async_trait;
use std::sync::Arc;

/// A byte-oriented key-value collection. Failures are logged by the
/// implementation and surface as misses, so a broken store never fails a query.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    async fn put(&self, key: &[u8], value: &[u8]);
    async fn remove(&self, key: &[u8]);
    async fn clear(&self);
    async fn keys(&self) -> Vec<Vec<u8>>;
}

pub trait Store: Send + Sync {
    /// Returns the named collection, creating it when `create_if_missing` is
    /// set. `persist` picks the on-disk backend over the in-memory one.
    fn get_collection(
        &self,
        name: &str,
        persist: bool,
        create_if_missing: bool,
    ) -> Option<Arc<dyn KeyValueCollection>>;
}
