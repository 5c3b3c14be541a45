use thiserror::Error;

/// Batch- and connection-level failures of the sync pipeline.
///
/// Per-row and per-field problems (dangling user references, malformed break
/// timestamps) never show up here; they are absorbed into sentinel values.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("source store unavailable: {0}")]
    Upstream(#[from] sqlx::Error),

    #[error("cache backend unavailable: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("failed to encode merged table: {0}")]
    Encode(#[from] csv::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("watcher task failed: {0}")]
    Watcher(String),
}

pub type SyncResult<T> = Result<T, SyncError>;
