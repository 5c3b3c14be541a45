use std::sync::Arc;

use futures::future::try_join;
use tracing::{debug, info};

use super::source::{Collection, Fingerprint, RecordSource};
use crate::error::SyncResult;

/// Best-effort "did anything change" signal for one collection.
#[derive(Debug)]
pub struct ChangeStream {
    collection: Collection,
    last_seen: Fingerprint,
}

impl ChangeStream {
    /// Takes the baseline. Failure here means the store is unreachable and is
    /// returned to the caller untouched.
    pub async fn open(source: &dyn RecordSource, collection: Collection) -> SyncResult<Self> {
        let last_seen = source.fingerprint(collection).await?;
        debug!(%collection, ?last_seen, "Change stream opened");
        Ok(Self {
            collection,
            last_seen,
        })
    }

    /// Reports whether the collection moved since the previous call.
    pub async fn try_next(&mut self, source: &dyn RecordSource) -> SyncResult<bool> {
        let current = source.fingerprint(self.collection).await?;
        if current == self.last_seen {
            return Ok(false);
        }

        debug!(collection = %self.collection, ?current, "Change detected");
        self.last_seen = current;
        Ok(true)
    }
}

/// Both change streams the watcher polls.
pub struct ChangeFeed {
    source: Arc<dyn RecordSource>,
    attendances: ChangeStream,
    users: ChangeStream,
}

impl ChangeFeed {
    pub async fn open(source: Arc<dyn RecordSource>) -> SyncResult<Self> {
        let attendances = ChangeStream::open(source.as_ref(), Collection::Attendances).await?;
        let users = ChangeStream::open(source.as_ref(), Collection::Users).await?;
        info!("Change feed open on attendances and users");
        Ok(Self {
            source,
            attendances,
            users,
        })
    }

    /// Polls both streams; true when either reported a change. Both baselines
    /// advance on every call so one change is reported exactly once.
    pub async fn poll(&mut self) -> SyncResult<bool> {
        let source = self.source.as_ref();
        let (attendances, users) = try_join(
            self.attendances.try_next(source),
            self.users.try_next(source),
        )
        .await?;
        Ok(attendances || users)
    }
}
