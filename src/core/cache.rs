use async_trait::async_trait;
use std::time::Duration;

/// Key-value cache with freshness checked at read time.
#[async_trait]
pub trait Cache<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Send + Sync,
{
    /// Returns the value stored under `key` if it was written less than `ttl` ago.
    async fn get(&self, key: &K, ttl: Duration) -> Option<V>;

    async fn put(&self, key: K, value: V);

    async fn remove(&self, key: &K);

    async fn clear(&self);

    /// Drops every entry written `ttl` or longer ago.
    async fn purge_expired(&self, ttl: Duration);
}
