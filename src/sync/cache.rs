use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::error::SyncResult;
use crate::model::MergedTable;

/// Default slot the watcher publishes into.
pub const DEFAULT_SNAPSHOT_KEY: &str = "merged_attendance_csv";

/// A string-keyed text store. One mutable slot per key, last write wins.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    async fn set_text(&self, key: &str, value: String) -> SyncResult<()>;

    async fn get_text(&self, key: &str) -> SyncResult<Option<String>>;

    fn backend_name(&self) -> &'static str;
}

/// Serialize `table` and overwrite whatever `key` held before.
pub async fn put(cache: &dyn SnapshotCache, key: &str, table: &MergedTable) -> SyncResult<()> {
    put_encoded(cache, key, table.to_csv()?, table.len()).await
}

/// Store an already encoded table, avoiding a second encode on the publish path.
pub async fn put_encoded(
    cache: &dyn SnapshotCache,
    key: &str,
    csv: String,
    rows: usize,
) -> SyncResult<()> {
    cache.set_text(key, csv).await?;
    log::info!(
        "Saved snapshot to {} cache: key={} rows={}",
        cache.backend_name(),
        key,
        rows
    );
    Ok(())
}

/// Read the table stored under `key`.
///
/// A missing key and an undecodable value are both reported as `Ok(None)`;
/// only an unreachable backend is an error.
pub async fn get(cache: &dyn SnapshotCache, key: &str) -> SyncResult<Option<MergedTable>> {
    let Some(text) = cache.get_text(key).await? else {
        log::debug!("Snapshot cache miss: key={}", key);
        return Ok(None);
    };

    match MergedTable::from_csv(&text) {
        Ok(table) => Ok(Some(table)),
        Err(e) => {
            log::warn!("Discarding undecodable snapshot: key={} error={}", key, e);
            Ok(None)
        }
    }
}

/// Redis-backed slot, shared with other processes.
#[derive(Clone)]
pub struct RedisSnapshotCache {
    conn: ConnectionManager,
}

impl RedisSnapshotCache {
    pub async fn connect(url: &str) -> SyncResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl SnapshotCache for RedisSnapshotCache {
    async fn set_text(&self, key: &str, value: String) -> SyncResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn get_text(&self, key: &str) -> SyncResult<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// In-process slot for single-node deployments and tests.
///
/// No capacity bound and no TTL: the set of keys is tiny and every value is
/// replaced on the next publish.
#[derive(Clone)]
pub struct MemorySnapshotCache {
    slots: Cache<String, Arc<str>>,
}

impl MemorySnapshotCache {
    pub fn new() -> Self {
        Self {
            slots: Cache::builder().name("snapshot-slots").build(),
        }
    }
}

impl Default for MemorySnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotCache for MemorySnapshotCache {
    async fn set_text(&self, key: &str, value: String) -> SyncResult<()> {
        self.slots.insert(key.to_string(), Arc::from(value)).await;
        Ok(())
    }

    async fn get_text(&self, key: &str) -> SyncResult<Option<String>> {
        Ok(self.slots.get(key).await.map(|v| v.to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
