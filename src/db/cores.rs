use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite, SqliteConnection};

use crate::models::*;
use crate::topology::{reconcile, AllocationChange};

use super::row_helpers::map_core_row;
use super::NotFoundError;

pub(super) const SELECT_CORE: &str = r#"
    SELECT id, cable_id, core_index, tube_color, core_color, status, created_at, updated_at
    FROM cable_cores
"#;

/// Bring one core's state in line with a connection change.
///
/// Runs inside the caller's transaction. A missing core is logged and
/// skipped so the connection write itself never fails on it.
pub(super) async fn reconcile_core(
    conn: &mut SqliteConnection,
    core_id: i64,
    change: AllocationChange,
    connection_id: i64,
) -> Result<()> {
    let status: Option<CoreStatus> = sqlx::query_scalar("SELECT status FROM cable_cores WHERE id = ?")
        .bind(core_id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to load core")?;

    let Some(status) = status else {
        tracing::warn!(
            "Connection {} references missing core {}, leaving allocation untouched",
            connection_id, core_id
        );
        return Ok(());
    };

    let still_referenced = match change {
        AllocationChange::Attach => true,
        AllocationChange::Detach => {
            let others: i64 = sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM connections
                WHERE id != ?1
                  AND ((input_type = 'CORE' AND input_id = ?2) OR (output_type = 'CORE' AND output_id = ?2))
                "#,
            )
            .bind(connection_id)
            .bind(core_id)
            .fetch_one(&mut *conn)
            .await
            .context("Failed to load core")?;
            others > 0
        }
    };

    match reconcile(status, change, still_referenced) {
        Some(next) => {
            sqlx::query("UPDATE cable_cores SET status = ?, updated_at = ? WHERE id = ?")
                .bind(next)
                .bind(Utc::now())
                .bind(core_id)
                .execute(&mut *conn)
                .await
                .with_context(|| format!("Failed to set core {} to {:?}", core_id, next))?;
            tracing::debug!("Core {}: {:?} -> {:?} (connection {})", core_id, status, next, connection_id);
        }
        None if status == CoreStatus::Damaged && change == AllocationChange::Attach => {
            tracing::warn!("Connection {} uses core {} which is marked DAMAGED", connection_id, core_id);
        }
        None => {}
    }
    Ok(())
}

/// Core database operations
pub struct CoreRepo;

impl CoreRepo {
    pub async fn list_by_cable(pool: &Pool<Sqlite>, cable_id: i64) -> Result<Vec<CableCore>> {
        let rows = sqlx::query(&format!("{} WHERE cable_id = ? ORDER BY core_index", SELECT_CORE))
            .bind(cable_id)
            .fetch_all(pool)
            .await
            .context("Failed to list cable cores")?;
        Ok(rows.iter().map(map_core_row).collect())
    }

    pub async fn get(pool: &Pool<Sqlite>, id: i64) -> Result<Option<CableCore>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_CORE))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to load core")?;
        Ok(row.as_ref().map(map_core_row))
    }

    /// Manual override of a core's colors or state
    pub async fn update(
        pool: &Pool<Sqlite>,
        cable_id: i64,
        core_id: i64,
        req: &UpdateCableCoreRequest,
    ) -> Result<CableCore> {
        let result = sqlx::query(
            r#"
            UPDATE cable_cores SET tube_color = COALESCE(?, tube_color),
                                   core_color = COALESCE(?, core_color),
                                   status = COALESCE(?, status),
                                   updated_at = ?
            WHERE id = ? AND cable_id = ?
            "#,
        )
        .bind(&req.tube_color)
        .bind(&req.core_color)
        .bind(req.status)
        .bind(Utc::now())
        .bind(core_id)
        .bind(cable_id)
        .execute(pool)
        .await
        .context("Failed to update core")?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Core", &format!("{} in cable {}", core_id, cable_id)).into());
        }

        Self::get(pool, core_id)
            .await?
            .context("Core not found after update")
    }
}
