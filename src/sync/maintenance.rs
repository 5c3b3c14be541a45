use std::collections::HashSet;
use std::path::Path;

use futures::future::try_join;
use tracing::{info, warn};

use super::reshape::merge_records;
use super::source::RecordSource;
use crate::error::SyncResult;

/// Delete attendance records whose user reference does not resolve.
///
/// Returns the number of records removed. An empty user collection is treated
/// as a likely outage rather than "every attendance is orphaned", so nothing
/// is deleted.
pub async fn prune_orphan_attendance(source: &dyn RecordSource) -> SyncResult<u64> {
    let (attendances, users) = try_join(source.attendances(), source.users()).await?;

    if users.is_empty() {
        warn!(
            attendances = attendances.len(),
            "Users collection is empty, skipping orphan cleanup"
        );
        return Ok(0);
    }

    let known: HashSet<&str> = users.iter().map(|u| u.id.as_str()).collect();
    let orphans: Vec<String> = attendances
        .iter()
        .filter(|a| !known.contains(a.user_id.as_str()))
        .map(|a| a.id.clone())
        .collect();

    if orphans.is_empty() {
        info!("No orphaned attendance records found");
        return Ok(0);
    }

    let removed = source.delete_attendances(&orphans).await?;
    info!(found = orphans.len(), removed, "Orphaned attendance records deleted");
    Ok(removed)
}

/// Write the merged table to `path` as CSV, replacing any existing file.
///
/// Returns the number of rows written, or `None` when a source collection is
/// empty, in which case no file is created.
pub async fn export_merged_csv(source: &dyn RecordSource, path: &Path) -> SyncResult<Option<usize>> {
    let (attendances, users) = try_join(source.attendances(), source.users()).await?;

    let Some(table) = merge_records(&attendances, &users) else {
        warn!(
            attendances = attendances.len(),
            users = users.len(),
            "Nothing to export, a source collection is empty"
        );
        return Ok(None);
    };

    tokio::fs::write(path, table.to_csv()?).await?;
    info!(rows = table.len(), path = %path.display(), "Merged attendance exported");
    Ok(Some(table.len()))
}
