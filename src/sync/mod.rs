//! Merge pipeline: store adapter, reshape, cache, change feed and fan-out.

pub mod cache;
pub mod feed;
pub mod hub;
pub mod maintenance;
pub mod pipeline;
pub mod reshape;
pub mod source;
pub mod watcher;

pub use cache::{MemorySnapshotCache, RedisSnapshotCache, SnapshotCache};
pub use hub::{Snapshot, SnapshotHub};
pub use pipeline::Pipeline;
pub use source::{MySqlSource, RecordSource};
pub use watcher::Watcher;
