use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, QueryBuilder, Sqlite, SqliteConnection};

use crate::models::*;

use super::row_helpers::map_node_row;
use super::{ConflictError, NotFoundError, Page, ValidationError};

pub(super) const SELECT_NODE: &str = r#"
    SELECT id, name, type, latitude, longitude, address, capacity_ports, used_ports,
           model, status, created_at, updated_at
    FROM nodes
"#;

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &NodeFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(node_type) = filter.node_type {
        qb.push(" AND type = ").push_bind(node_type);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
}

/// Fail with a validation error unless node `id` exists
pub(super) async fn require_node(conn: &mut SqliteConnection, id: i64, field: &str) -> Result<()> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM nodes WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to load node")?;
    if found.is_none() {
        return Err(ValidationError::new(format!("{} references unknown node {}", field, id)).into());
    }
    Ok(())
}

/// Node database operations
pub struct NodeRepo;

impl NodeRepo {
    pub async fn list(pool: &Pool<Sqlite>, filter: &NodeFilter, limit: i64, offset: i64) -> Result<Page<Node>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM nodes");
        push_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(pool)
            .await
            .context("Failed to count nodes")?;

        let mut query = QueryBuilder::<Sqlite>::new(SELECT_NODE);
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = query.build().fetch_all(pool).await.context("Failed to list nodes")?;

        Ok(Page {
            items: rows.iter().map(map_node_row).collect(),
            total,
        })
    }

    /// Every node matching the filter, unpaged (map layers)
    pub async fn list_all(pool: &Pool<Sqlite>, filter: &NodeFilter) -> Result<Vec<Node>> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_NODE);
        push_filters(&mut query, filter);
        query.push(" ORDER BY id");
        let rows = query.build().fetch_all(pool).await.context("Failed to list nodes")?;
        Ok(rows.iter().map(map_node_row).collect())
    }

    /// Proximity candidates: nodes whose latitude falls inside the band
    pub async fn list_in_latitude_band(
        pool: &Pool<Sqlite>,
        min_lat: f64,
        max_lat: f64,
        node_type: Option<NodeType>,
    ) -> Result<Vec<Node>> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_NODE);
        query
            .push(" WHERE latitude BETWEEN ")
            .push_bind(min_lat)
            .push(" AND ")
            .push_bind(max_lat);
        if let Some(node_type) = node_type {
            query.push(" AND type = ").push_bind(node_type);
        }
        let rows = query
            .build()
            .fetch_all(pool)
            .await
            .context("Failed to query nearby nodes")?;
        Ok(rows.iter().map(map_node_row).collect())
    }

    pub async fn get(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Node>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_NODE))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to load node")?;
        Ok(row.as_ref().map(map_node_row))
    }

    pub async fn create(pool: &Pool<Sqlite>, req: &CreateNodeRequest) -> Result<Node> {
        let capacity = req.capacity_ports.unwrap_or(DEFAULT_CAPACITY_PORTS);
        if capacity < 0 {
            return Err(ValidationError::new("capacity_ports must not be negative").into());
        }

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO nodes (name, type, latitude, longitude, address, capacity_ports, used_ports,
                               model, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)
            "#,
        )
        .bind(&req.name)
        .bind(req.node_type)
        .bind(req.latitude)
        .bind(req.longitude)
        .bind(&req.address)
        .bind(capacity)
        .bind(&req.model)
        .bind(req.status.unwrap_or_default())
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create node")?;

        let new_id = result.last_insert_rowid();
        Self::get(pool, new_id)
            .await?
            .context("Node not found after creation")
    }

    pub async fn update(pool: &Pool<Sqlite>, id: i64, req: &UpdateNodeRequest) -> Result<Node> {
        let mut tx = pool.begin().await.context("Failed to start transaction")?;

        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_NODE))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to load node")?;
        let mut node = row
            .as_ref()
            .map(map_node_row)
            .ok_or_else(|| NotFoundError::new("Node", &id.to_string()))?;

        node.apply(req);
        node.validate_ports().map_err(ValidationError::new)?;

        sqlx::query(
            r#"
            UPDATE nodes SET name = ?, type = ?, latitude = ?, longitude = ?, address = ?,
                             capacity_ports = ?, used_ports = ?, model = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&node.name)
        .bind(node.node_type)
        .bind(node.latitude)
        .bind(node.longitude)
        .bind(&node.address)
        .bind(node.capacity_ports)
        .bind(node.used_ports)
        .bind(&node.model)
        .bind(node.status)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update node")?;

        tx.commit().await.context("Failed to commit transaction")?;

        Self::get(pool, id)
            .await?
            .context("Node not found after update")
    }

    /// Delete a node that nothing references any more
    pub async fn delete(pool: &Pool<Sqlite>, id: i64) -> Result<()> {
        let mut tx = pool.begin().await.context("Failed to start transaction")?;

        let (cables, connections, customers): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM cables WHERE origin_node_id = ?1 OR dest_node_id = ?1),
                (SELECT COUNT(*) FROM connections WHERE location_node_id = ?1),
                (SELECT COUNT(*) FROM customers WHERE node_id = ?1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to check node references")?;

        if cables + connections + customers > 0 {
            return Err(ConflictError::new(format!(
                "node {} is still referenced by {} cable(s), {} connection(s) and {} customer(s)",
                id, cables, connections, customers
            ))
            .into());
        }

        let result = sqlx::query("DELETE FROM nodes WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete node")?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Node", &id.to_string()).into());
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(())
    }
}
