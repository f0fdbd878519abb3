use moka::future::Cache;
use std::time::Duration;

/// In-memory snapshot cache backed by moka.
///
/// Holds provider snapshots as JSON values keyed by `kind:TICKER`.
/// Entries are automatically evicted after TTL.
pub struct SnapshotCache {
    inner: Cache<String, serde_json::Value>,
}

impl SnapshotCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: String, value: serde_json::Value) {
        self.inner.insert(key, value).await;
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}
