use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::feed::ChangeFeed;
use super::hub::Snapshot;
use super::pipeline::Pipeline;
use crate::error::{SyncError, SyncResult};
use crate::model::MergedTable;

/// What one scheduling tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Neither stream reported a change.
    Idle,
    /// A change was seen but the recompute came back empty; the previous
    /// snapshot stays in place.
    Retained,
    Published(Arc<Snapshot>),
}

/// Decide what a recomputed table means for the published state.
///
/// `Some` is the snapshot to publish next; `None` keeps `previous` untouched.
/// An empty recompute never replaces good data.
pub fn reconcile(
    previous: Option<&Snapshot>,
    recomputed: Option<MergedTable>,
) -> SyncResult<Option<Snapshot>> {
    let Some(table) = recomputed.filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let generation = previous.map_or(1, |p| p.generation + 1);
    Snapshot::encode(generation, table).map(Some)
}

/// Mutable state the loop carries between ticks.
struct WatchState {
    feed: ChangeFeed,
    latest: Option<Arc<Snapshot>>,
}

impl WatchState {
    async fn recompute_and_publish(&mut self, pipeline: &Pipeline) -> SyncResult<TickOutcome> {
        let recomputed = pipeline.recompute().await?;
        match reconcile(self.latest.as_deref(), recomputed)? {
            Some(next) => {
                let next = Arc::new(next);
                pipeline.publish(next.clone()).await;
                self.latest = Some(next.clone());
                Ok(TickOutcome::Published(next))
            }
            None => Ok(TickOutcome::Retained),
        }
    }

    async fn tick(&mut self, pipeline: &Pipeline) -> SyncResult<TickOutcome> {
        if !self.feed.poll().await? {
            return Ok(TickOutcome::Idle);
        }
        self.recompute_and_publish(pipeline).await
    }
}

/// The background task that keeps the cache and subscribers current.
///
/// Stream-open and poll failures are not retried: the task ends and the error
/// comes back through [`Watcher::join`] or [`Watcher::stop`].
pub struct Watcher {
    cancel: CancellationToken,
    task: JoinHandle<SyncResult<()>>,
}

impl Watcher {
    /// Opens both change streams, performs the initial full publish, then
    /// spawns the polling loop.
    pub async fn start(pipeline: Arc<Pipeline>, interval: Duration) -> SyncResult<Self> {
        // baseline first so nothing written during the initial publish is missed
        let feed = ChangeFeed::open(pipeline.source()).await?;
        let mut state = WatchState { feed, latest: None };

        match state.recompute_and_publish(&pipeline).await? {
            TickOutcome::Published(snapshot) => {
                info!(rows = snapshot.rows(), "Initial snapshot published")
            }
            _ => warn!("Initial publish skipped: a source collection is empty"),
        }

        let cancel = CancellationToken::new();
        let task = actix_web::rt::spawn(run(pipeline, state, interval, cancel.clone()));
        info!(interval_ms = interval.as_millis() as u64, "Watcher started");

        Ok(Self { cancel, task })
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signal the loop to finish and wait for it.
    pub async fn stop(self) -> SyncResult<()> {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the loop to end on its own.
    pub async fn join(self) -> SyncResult<()> {
        self.task
            .await
            .map_err(|e| SyncError::Watcher(e.to_string()))?
    }
}

async fn run(
    pipeline: Arc<Pipeline>,
    mut state: WatchState,
    interval: Duration,
    cancel: CancellationToken,
) -> SyncResult<()> {
    loop {
        match state.tick(&pipeline).await {
            Ok(TickOutcome::Published(snapshot)) => {
                debug!(generation = snapshot.generation, "Published after change")
            }
            Ok(TickOutcome::Retained) => {
                warn!("Change seen but recompute was empty, keeping previous snapshot")
            }
            Ok(TickOutcome::Idle) => {}
            Err(e) => {
                error!(error = %e, "Watcher stopping on upstream failure");
                return Err(e);
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Watcher stopped");
                return Ok(());
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
