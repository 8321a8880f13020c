use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, QueryBuilder, Sqlite};

use crate::models::*;
use crate::topology::AllocationChange;

use super::cores::reconcile_core;
use super::nodes::require_node;
use super::row_helpers::map_connection_row;
use super::{NotFoundError, Page};

pub(super) const SELECT_CONNECTION: &str = r#"
    SELECT id, location_node_id, input_type, input_id, output_type, output_id,
           loss_db, notes, created_at, updated_at
    FROM connections
"#;

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ConnectionFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(location) = filter.location_node_id {
        qb.push(" AND location_node_id = ").push_bind(location);
    }
    if let Some(input_type) = filter.input_type {
        qb.push(" AND input_type = ").push_bind(input_type);
    }
    if let Some(input_id) = filter.input_id {
        qb.push(" AND input_id = ").push_bind(input_id);
    }
    if let Some(output_type) = filter.output_type {
        qb.push(" AND output_type = ").push_bind(output_type);
    }
    if let Some(output_id) = filter.output_id {
        qb.push(" AND output_id = ").push_bind(output_id);
    }
}

/// Connection database operations. Creating or deleting a connection
/// reconciles the state of the cores it references in the same transaction.
pub struct ConnectionRepo;

impl ConnectionRepo {
    pub async fn list(pool: &Pool<Sqlite>, filter: &ConnectionFilter, limit: i64, offset: i64) -> Result<Page<Connection>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM connections");
        push_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(pool)
            .await
            .context("Failed to count connections")?;

        let mut query = QueryBuilder::<Sqlite>::new(SELECT_CONNECTION);
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = query
            .build()
            .fetch_all(pool)
            .await
            .context("Failed to list connections")?;

        Ok(Page {
            items: rows.iter().map(map_connection_row).collect(),
            total,
        })
    }

    pub async fn list_by_location(pool: &Pool<Sqlite>, node_id: i64) -> Result<Vec<Connection>> {
        let rows = sqlx::query(&format!("{} WHERE location_node_id = ? ORDER BY id", SELECT_CONNECTION))
            .bind(node_id)
            .fetch_all(pool)
            .await
            .context("Failed to list connections at location")?;
        Ok(rows.iter().map(map_connection_row).collect())
    }

    pub async fn get(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Connection>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_CONNECTION))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to load connection")?;
        Ok(row.as_ref().map(map_connection_row))
    }

    pub async fn create(pool: &Pool<Sqlite>, req: &CreateConnectionRequest) -> Result<Connection> {
        let mut tx = pool.begin().await.context("Failed to start transaction")?;
        if let Some(location) = req.location_node_id {
            require_node(&mut *tx, location, "location_node_id").await?;
        }

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO connections (location_node_id, input_type, input_id, output_type, output_id,
                                     loss_db, notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(req.location_node_id)
        .bind(req.input_type)
        .bind(req.input_id)
        .bind(req.output_type)
        .bind(req.output_id)
        .bind(req.loss_db)
        .bind(&req.notes)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create connection")?;

        let new_id = result.last_insert_rowid();
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_CONNECTION))
            .bind(new_id)
            .fetch_one(&mut *tx)
            .await
            .context("Connection not found after creation")?;
        let connection = map_connection_row(&row);

        for core_id in connection.core_ids() {
            if let Err(e) = reconcile_core(&mut *tx, core_id, AllocationChange::Attach, connection.id).await {
                tracing::warn!("Failed to reconcile core {} for connection {}: {:#}", core_id, connection.id, e);
            }
        }

        tx.commit().await.context("Failed to commit transaction")?;
        tracing::info!(
            "Created connection {} ({:?} {} -> {:?} {})",
            connection.id, connection.input_type, connection.input_id,
            connection.output_type, connection.output_id
        );
        Ok(connection)
    }

    pub async fn delete(pool: &Pool<Sqlite>, id: i64) -> Result<()> {
        let mut tx = pool.begin().await.context("Failed to start transaction")?;

        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_CONNECTION))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to load connection")?;
        let connection = row
            .as_ref()
            .map(map_connection_row)
            .ok_or_else(|| NotFoundError::new("Connection", &id.to_string()))?;

        sqlx::query("DELETE FROM connections WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete connection")?;

        for core_id in connection.core_ids() {
            if let Err(e) = reconcile_core(&mut *tx, core_id, AllocationChange::Detach, connection.id).await {
                tracing::warn!("Failed to reconcile core {} for connection {}: {:#}", core_id, connection.id, e);
            }
        }

        tx.commit().await.context("Failed to commit transaction")?;
        tracing::info!("Deleted connection {}", id);
        Ok(())
    }
}
