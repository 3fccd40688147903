use crate::core::cache::KeyValueCollection;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory collection; used when persistence is off and in tests.
#[derive(Default)]
pub struct MemoryCollection {
    inner: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueCollection for MemoryCollection {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let value = self.inner.read().await.get(key).cloned();
        if value.is_some() {
            debug!("Memory HIT for key: {}", String::from_utf8_lossy(key));
        } else {
            debug!("Memory MISS for key: {}", String::from_utf8_lossy(key));
        }
        value
    }

    async fn put(&self, key: &[u8], value: &[u8]) {
        let mut map = self.inner.write().await;
        debug!("Memory PUT for key: {}", String::from_utf8_lossy(key));
        map.insert(key.to_vec(), value.to_vec());
    }

    async fn remove(&self, key: &[u8]) {
        self.inner.write().await.remove(key);
        debug!("Memory REMOVE for key: {}", String::from_utf8_lossy(key));
    }

    async fn clear(&self) {
        self.inner.write().await.clear();
        debug!("Memory CLEAR");
    }

    async fn keys(&self) -> Vec<Vec<u8>> {
        let mut keys: Vec<Vec<u8>> = self.inner.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_get_put() {
        let collection = MemoryCollection::new();

        // Initially, collection is empty
        assert!(collection.get(b"key1").await.is_none());

        collection.put(b"key1", b"123").await;
        assert_eq!(collection.get(b"key1").await, Some(b"123".to_vec()));

        // Get a non-existent key
        assert!(collection.get(b"key2").await.is_none());
    }

    #[tokio::test]
    async fn test_memory_put_replaces() {
        let collection = MemoryCollection::new();
        collection.put(b"key1", b"old").await;
        collection.put(b"key1", b"new").await;
        assert_eq!(collection.get(b"key1").await, Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_remove_clear_keys() {
        let collection = MemoryCollection::new();
        collection.put(b"b", b"2").await;
        collection.put(b"a", b"1").await;
        assert_eq!(collection.keys().await, vec![b"a".to_vec(), b"b".to_vec()]);

        collection.remove(b"a").await;
        assert!(collection.get(b"a").await.is_none());

        collection.clear().await;
        assert!(collection.keys().await.is_empty());
    }
}
