pub mod disk;
pub mod memory;

use crate::core::cache::Cache;
use crate::core::config::AppConfig;
use disk::DiskCache;
use memory::MemoryCache;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use tracing::debug;

/// Opens the named cache collection for string keys.
///
/// With `persist_cache` enabled the collection lives under `<data_path>/cache`
/// so entries outlive a single command. Falls back to memory if the disk
/// store cannot be opened.
pub fn open_cache<V>(config: &AppConfig, name: &str) -> Arc<dyn Cache<String, V>>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    if config.persist_cache {
        let disk = config
            .default_data_path()
            .and_then(|path| DiskCache::<String, V>::new(&path.join("cache"), name));
        match disk {
            Ok(cache) => return Arc::new(cache),
            Err(e) => debug!("Falling back to memory cache for {}: {}", name, e),
        }
    }
    Arc::new(MemoryCache::<String, V>::new())
}
