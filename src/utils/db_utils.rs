use sqlx::MySqlPool;

/// Upper bound on bound parameters per statement, kept well below the MySQL
/// prepared statement limit of 65535.
pub const MAX_BIND_PARAMS: usize = 1_000;

/// ===============================
/// SQL statement container
/// ===============================
#[derive(Debug, PartialEq)]
pub struct SqlDelete {
    pub sql: String,
    pub values: Vec<String>,
}

/// ===============================
/// Build `DELETE ... WHERE col IN (...)` statements, chunked
/// ===============================
pub fn build_delete_in_sql(table: &str, id_column: &str, ids: &[String]) -> Vec<SqlDelete> {
    ids.chunks(MAX_BIND_PARAMS)
        .map(|chunk| {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            SqlDelete {
                sql: format!(
                    "DELETE FROM {} WHERE {} IN ({})",
                    table, id_column, placeholders
                ),
                values: chunk.to_vec(),
            }
        })
        .collect()
}

/// ===============================
/// Execute the deletes, returns total rows affected
/// ===============================
pub async fn execute_deletes(
    pool: &MySqlPool,
    statements: Vec<SqlDelete>,
) -> Result<u64, sqlx::Error> {
    let mut affected = 0;

    for statement in statements {
        let mut query = sqlx::query(&statement.sql);
        for value in statement.values {
            query = query.bind(value);
        }
        affected += query.execute(pool).await?.rows_affected();
    }

    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_placeholder_per_id() {
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let statements = build_delete_in_sql("attendances", "id", &ids);

        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0].sql,
            "DELETE FROM attendances WHERE id IN (?, ?, ?)"
        );
        assert_eq!(statements[0].values, ids);
    }

    #[test]
    fn chunks_large_id_lists() {
        let ids: Vec<String> = (0..MAX_BIND_PARAMS + 5).map(|i| i.to_string()).collect();
        let statements = build_delete_in_sql("attendances", "id", &ids);

        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].values.len(), MAX_BIND_PARAMS);
        assert_eq!(statements[1].values.len(), 5);
    }

    #[test]
    fn nothing_to_delete_builds_nothing() {
        assert!(build_delete_in_sql("attendances", "id", &[]).is_empty());
    }
}
