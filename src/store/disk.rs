use crate::core::cache::KeyValueCollection;
use anyhow::Result;
use async_trait::async_trait;
use fjall::{Keyspace, PartitionHandle, PersistMode};
use tracing::{debug, warn};

/// A collection stored in one fjall partition. Every write replaces the
/// whole value of its key atomically and is flushed to the OS before
/// returning, so entries survive a process restart.
pub struct DiskCollection {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskCollection {
    pub fn new(keyspace: Keyspace, partition: PartitionHandle) -> Self {
        Self {
            keyspace,
            partition,
        }
    }

    fn persist(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::Buffer)?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueCollection for DiskCollection {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.partition.get(key) {
            Ok(Some(value)) => {
                debug!("Disk HIT for key: {}", String::from_utf8_lossy(key));
                Some(value.to_vec())
            }
            Ok(None) => {
                debug!("Disk MISS for key: {}", String::from_utf8_lossy(key));
                None
            }
            Err(e) => {
                warn!("DiskCollection get error: {}", e);
                None
            }
        }
    }

    async fn put(&self, key: &[u8], value: &[u8]) {
        let res: Result<()> = (|| {
            self.partition.insert(key, value)?;
            self.persist()
        })();
        match res {
            Ok(()) => debug!("Disk PUT for key: {}", String::from_utf8_lossy(key)),
            Err(e) => warn!("DiskCollection put error: {}", e),
        }
    }

    async fn remove(&self, key: &[u8]) {
        if let Err(e) = self.partition.remove(key) {
            warn!("DiskCollection remove error: {}", e);
        }
    }

    async fn clear(&self) {
        let res: Result<()> = (|| {
            for key in self.partition.keys() {
                self.partition.remove(key?)?;
            }
            self.persist()
        })();
        match res {
            Ok(()) => debug!("Disk CLEAR"),
            Err(e) => warn!("DiskCollection clear error: {}", e),
        }
    }

    async fn keys(&self) -> Vec<Vec<u8>> {
        self.partition
            .keys()
            .filter_map(|key| match key {
                Ok(key) => Some(key.to_vec()),
                Err(e) => {
                    warn!("DiskCollection keys error: {}", e);
                    None
                }
            })
            .collect()
    }
}
