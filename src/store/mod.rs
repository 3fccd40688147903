pub mod disk;
pub mod memory;
pub mod rates;

use crate::core::cache::{KeyValueCollection, Store};
use disk::DiskCollection;
use fjall::{Keyspace, PartitionCreateOptions};
use memory::MemoryCollection;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, PoisonError, RwLock},
};
use tracing::warn;

/// A thread-safe key-value store that can hold multiple collections.
///
/// Persistent collections live in one fjall keyspace. When the keyspace
/// cannot be opened the store keeps working with in-memory collections
/// only, and persistent lookups return `None`.
pub struct KeyValueStore {
    collections: RwLock<HashMap<String, Arc<dyn KeyValueCollection>>>,
    keyspace: Option<Keyspace>,
}

impl KeyValueStore {
    pub fn open(path: &Path) -> Self {
        let keyspace = std::fs::create_dir_all(path)
            .map_err(|e| e.to_string())
            .and_then(|_| fjall::Config::new(path).open().map_err(|e| e.to_string()));

        let keyspace = match keyspace {
            Ok(keyspace) => Some(keyspace),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not open cache store, continuing without persistence"
                );
                None
            }
        };

        Self {
            collections: RwLock::new(HashMap::new()),
            keyspace,
        }
    }

    fn collection_key(name: &str, persist: bool) -> String {
        if persist {
            format!("disk:{name}")
        } else {
            format!("memory:{name}")
        }
    }
}

impl Store for KeyValueStore {
    fn get_collection(
        &self,
        name: &str,
        persist: bool,
        create_if_missing: bool,
    ) -> Option<Arc<dyn KeyValueCollection>> {
        let key = Self::collection_key(name, persist);

        if let Some(collection) = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Some(Arc::clone(collection));
        }

        if !create_if_missing {
            return None;
        }

        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(collection) = collections.get(&key) {
            return Some(Arc::clone(collection));
        }

        let new_collection: Arc<dyn KeyValueCollection> = if persist {
            let keyspace = self.keyspace.as_ref()?;
            match keyspace.open_partition(name, PartitionCreateOptions::default()) {
                Ok(partition) => Arc::new(DiskCollection::new(keyspace.clone(), partition)),
                Err(e) => {
                    warn!(collection = name, error = %e, "Failed to open cache partition");
                    return None;
                }
            }
        } else {
            Arc::new(MemoryCollection::new())
        };

        collections.insert(key, Arc::clone(&new_collection));
        Some(new_collection)
    }
}
