use std::sync::Arc;

use futures::future::try_join;
use tokio::sync::broadcast;
use tracing::{error, instrument};

use super::cache::{self, SnapshotCache};
use super::hub::{Snapshot, SnapshotHub};
use super::reshape::merge_records;
use super::source::RecordSource;
use crate::error::SyncResult;
use crate::model::MergedTable;

/// Explicit handles for one deployment: the store it reads, the cache it
/// writes, and the hub its subscribers listen on.
pub struct Pipeline {
    source: Arc<dyn RecordSource>,
    cache: Arc<dyn SnapshotCache>,
    hub: SnapshotHub,
    snapshot_key: String,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn RecordSource>,
        cache: Arc<dyn SnapshotCache>,
        hub: SnapshotHub,
        snapshot_key: impl Into<String>,
    ) -> Self {
        Self {
            source,
            cache,
            hub,
            snapshot_key: snapshot_key.into(),
        }
    }

    pub fn source(&self) -> Arc<dyn RecordSource> {
        self.source.clone()
    }

    pub fn cache(&self) -> &dyn SnapshotCache {
        self.cache.as_ref()
    }

    pub fn snapshot_key(&self) -> &str {
        &self.snapshot_key
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Snapshot>> {
        self.hub.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    /// Full scan of both collections and a fresh merge. Never incremental.
    pub async fn recompute(&self) -> SyncResult<Option<MergedTable>> {
        let (attendances, users) =
            try_join(self.source.attendances(), self.source.users()).await?;
        Ok(merge_records(&attendances, &users))
    }

    /// Overwrite the cache slot and broadcast. A failed cache write is logged
    /// and does not hold back subscribers.
    #[instrument(skip(self, snapshot), fields(generation = snapshot.generation, rows = snapshot.rows()))]
    pub async fn publish(&self, snapshot: Arc<Snapshot>) {
        if let Err(e) = cache::put_encoded(
            self.cache.as_ref(),
            &self.snapshot_key,
            snapshot.csv.clone(),
            snapshot.rows(),
        )
        .await
        {
            error!(error = %e, key = %self.snapshot_key, "Failed to write snapshot to cache");
        }

        self.hub.publish(snapshot);
    }
}
