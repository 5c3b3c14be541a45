use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::MySqlPool;
use strum_macros::{AsRefStr, Display, EnumIter};
use tracing::debug;

use crate::error::SyncResult;
use crate::model::attendance::AttendanceRow;
use crate::model::user::{USER_PROFILE_COLUMNS, UserRow};
use crate::model::{AttendanceRecord, UserRecord};
use crate::utils::db_utils::{build_delete_in_sql, execute_deletes};

/// The two mutation-observable collections the pipeline reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Collection {
    Attendances,
    Users,
}

/// Cheap summary of a collection's state. Any insert, delete or update of a
/// tracked row moves at least one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::FromRow)]
pub struct Fingerprint {
    pub row_count: i64,
    pub last_modified: Option<NaiveDateTime>,
}

/// Read side of the document store, plus the one delete the maintenance
/// operation needs.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Full scan, in a stable order.
    async fn attendances(&self) -> SyncResult<Vec<AttendanceRecord>>;

    /// Full scan of the non-sensitive profile columns.
    async fn users(&self) -> SyncResult<Vec<UserRecord>>;

    async fn fingerprint(&self, collection: Collection) -> SyncResult<Fingerprint>;

    async fn delete_attendances(&self, ids: &[String]) -> SyncResult<u64>;
}

/// MySQL store: documents live in rows, nested fields in JSON columns.
#[derive(Clone)]
pub struct MySqlSource {
    pool: MySqlPool,
}

impl MySqlSource {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordSource for MySqlSource {
    async fn attendances(&self) -> SyncResult<Vec<AttendanceRecord>> {
        let rows = sqlx::query_as::<_, AttendanceRow>(
            r#"
            SELECT id, user_id, date, check_in, check_out, breaks,
                   total_hours, overtime_hours, status
            FROM attendances
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(rows = rows.len(), "Fetched attendances");
        Ok(rows.into_iter().map(AttendanceRecord::from).collect())
    }

    async fn users(&self) -> SyncResult<Vec<UserRecord>> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY id",
            USER_PROFILE_COLUMNS.join(", ")
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        debug!(rows = rows.len(), "Fetched users");
        Ok(rows.into_iter().map(UserRecord::from).collect())
    }

    async fn fingerprint(&self, collection: Collection) -> SyncResult<Fingerprint> {
        // table names come from the enum, never from input
        let sql = format!(
            "SELECT COUNT(*) AS row_count, MAX(updated_at) AS last_modified FROM {}",
            collection.as_ref()
        );
        Ok(sqlx::query_as::<_, Fingerprint>(&sql)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn delete_attendances(&self, ids: &[String]) -> SyncResult<u64> {
        let statements = build_delete_in_sql(Collection::Attendances.as_ref(), "id", ids);
        Ok(execute_deletes(&self.pool, statements).await?)
    }
}
