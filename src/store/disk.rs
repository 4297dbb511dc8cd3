use crate::core::cache::Cache;
use anyhow::Result;
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::debug;

#[derive(Serialize, Deserialize)]
struct CacheEntry<V> {
    value: V,
    stored_at: SystemTime,
}

/// Timestamp of a stored entry, read without decoding the value.
#[derive(Deserialize)]
struct EntryAge {
    stored_at: SystemTime,
}

/// Cache persisted in a fjall partition, entries encoded as JSON.
pub struct DiskCache<K, V> {
    keyspace: Keyspace,
    partition: PartitionHandle,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> DiskCache<K, V>
where
    K: Serialize + Debug + Send + Sync,
    V: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(db_path: &Path, name: &str) -> Result<Self> {
        std::fs::create_dir_all(db_path)?;

        let keyspace = fjall::Config::new(db_path).open()?;
        let partition = keyspace.open_partition(name, PartitionCreateOptions::default())?;
        Ok(Self {
            keyspace,
            partition,
            _marker: PhantomData,
        })
    }

    fn read(&self, key: &K, ttl: Duration) -> Result<Option<V>> {
        let key_bytes = serde_json::to_vec(key)?;
        let Some(bytes) = self.partition.get(&key_bytes)? else {
            debug!("Cache MISS for key: {:?}", key);
            return Ok(None);
        };

        let entry: CacheEntry<V> = serde_json::from_slice(&bytes)?;
        let expired = entry
            .stored_at
            .elapsed()
            .map_or(true, |age| age >= ttl);
        if expired {
            debug!("Cache entry expired for key: {:?}", key);
            self.partition.remove(&key_bytes)?;
            return Ok(None);
        }
        debug!("Cache HIT for key: {:?}", key);
        Ok(Some(entry.value))
    }

    fn write(&self, key: &K, value: V) -> Result<()> {
        let entry = CacheEntry {
            value,
            stored_at: SystemTime::now(),
        };
        self.partition
            .insert(serde_json::to_vec(key)?, serde_json::to_vec(&entry)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Cache PUT for key: {:?}", key);
        Ok(())
    }

    fn purge(&self, ttl: Duration) -> Result<usize> {
        let mut expired = Vec::new();
        for kv in self.partition.iter() {
            let (key, bytes) = kv?;
            let fresh = serde_json::from_slice::<EntryAge>(&bytes)
                .ok()
                .and_then(|entry| entry.stored_at.elapsed().ok())
                .is_some_and(|age| age < ttl);
            if !fresh {
                expired.push(key);
            }
        }
        let count = expired.len();
        for key in expired {
            self.partition.remove(key)?;
        }
        if count > 0 {
            self.keyspace.persist(PersistMode::SyncAll)?;
        }
        Ok(count)
    }

    fn clear_all(&self) -> Result<()> {
        let keys = self
            .partition
            .iter()
            .map(|kv| kv.map(|(key, _)| key))
            .collect::<Result<Vec<_>, _>>()?;
        for key in keys {
            self.partition.remove(key)?;
        }
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

#[async_trait]
impl<K, V> Cache<K, V> for DiskCache<K, V>
where
    K: Serialize + Debug + Send + Sync + 'static,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &K, ttl: Duration) -> Option<V> {
        match self.read(key, ttl) {
            Ok(value) => value,
            Err(e) => {
                debug!("DiskCache get error: {}", e);
                None
            }
        }
    }

    async fn put(&self, key: K, value: V) {
        if let Err(e) = self.write(&key, value) {
            debug!("DiskCache put error: {}", e);
        }
    }

    async fn remove(&self, key: &K) {
        let res: Result<()> = (|| {
            self.partition.remove(serde_json::to_vec(key)?)?;
            Ok(())
        })();
        if let Err(e) = res {
            debug!("DiskCache remove error: {}", e);
        }
    }

    async fn purge_expired(&self, ttl: Duration) {
        match self.purge(ttl) {
            Ok(count) => debug!("Cache PURGE removed {} entries", count),
            Err(e) => debug!("DiskCache purge error: {}", e),
        }
    }

    async fn clear(&self) {
        if let Err(e) = self.clear_all() {
            debug!("DiskCache clear error: {}", e);
        }
        debug!("Cache CLEAR");
    }
}
