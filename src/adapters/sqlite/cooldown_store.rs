//! SQLite adapter for CooldownStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::models::{CooldownEntry, CooldownTable, ResourceId};
use crate::domain::ports::{CooldownStore, DatabaseError};

#[derive(Clone)]
pub struct SqliteCooldownStore {
    pool: SqlitePool,
}

impl SqliteCooldownStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CooldownRow {
    resource_id: String,
    last_attempt_at: String,
    consecutive_failures: i64,
}

fn row_to_entry(row: CooldownRow) -> Result<CooldownEntry, DatabaseError> {
    let consecutive_failures = u32::try_from(row.consecutive_failures).map_err(|_| {
        DatabaseError::ConstraintViolation(format!(
            "consecutive_failures out of range for {}: {}",
            row.resource_id, row.consecutive_failures
        ))
    })?;

    Ok(CooldownEntry {
        last_attempt_at: DateTime::parse_from_rfc3339(&row.last_attempt_at)?.with_timezone(&Utc),
        resource_id: ResourceId::from(row.resource_id),
        consecutive_failures,
    })
}

#[async_trait]
impl CooldownStore for SqliteCooldownStore {
    async fn load(&self) -> Result<CooldownTable, DatabaseError> {
        let rows: Vec<CooldownRow> = sqlx::query_as(
            "SELECT resource_id, last_attempt_at, consecutive_failures
             FROM cooldown_entries ORDER BY resource_id",
        )
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .into_iter()
            .map(row_to_entry)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(entries = entries.len(), "loaded cooldown table");
        Ok(CooldownTable::from_entries(entries))
    }

    async fn save(&self, table: &CooldownTable) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cooldown_entries")
            .execute(&mut *tx)
            .await?;

        for entry in table.entries() {
            sqlx::query(
                "INSERT INTO cooldown_entries (resource_id, last_attempt_at, consecutive_failures)
                 VALUES (?, ?, ?)",
            )
            .bind(entry.resource_id.as_str())
            .bind(entry.last_attempt_at.to_rfc3339())
            .bind(i64::from(entry.consecutive_failures))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(entries = table.len(), "saved cooldown table");
        Ok(())
    }
}
