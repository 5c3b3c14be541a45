use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::SyncResult;
use crate::model::MergedTable;

/// One published version of the merged table, encoded once and shared by
/// the cache write and every subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub generation: u64,
    pub table: MergedTable,
    pub csv: String,
}

impl Snapshot {
    pub fn encode(generation: u64, table: MergedTable) -> SyncResult<Self> {
        let csv = table.to_csv()?;
        Ok(Self {
            generation,
            table,
            csv,
        })
    }

    pub fn rows(&self) -> usize {
        self.table.len()
    }
}

/// Fan-out of published snapshots to open subscriber connections.
///
/// A subscriber that falls more than `capacity` snapshots behind skips the
/// intermediate ones and resumes from the oldest still buffered.
#[derive(Clone)]
pub struct SnapshotHub {
    tx: broadcast::Sender<Arc<Snapshot>>,
}

impl SnapshotHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        info!("Snapshot hub initialized with capacity {}", capacity);
        Self { tx }
    }

    /// Returns how many subscribers the snapshot was queued for. Having none is fine.
    pub fn publish(&self, snapshot: Arc<Snapshot>) -> usize {
        let generation = snapshot.generation;
        let delivered = self.tx.send(snapshot).unwrap_or(0);
        debug!(generation, subscribers = delivered, "Snapshot broadcast");
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
