use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, QueryBuilder, Sqlite, SqliteConnection};

use crate::models::*;
use crate::topology::generate_cores;

use super::nodes::require_node;
use super::row_helpers::map_cable_row;
use super::{ConflictError, NotFoundError, Page, ValidationError};

pub(super) const SELECT_CABLE: &str = r#"
    SELECT id, name, type, core_count, length_meter, origin_node_id, dest_node_id,
           path_coordinates, color_hex, status, created_at, updated_at
    FROM cables
"#;

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &CableFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(cable_type) = filter.cable_type {
        qb.push(" AND type = ").push_bind(cable_type);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(origin) = filter.origin_node_id {
        qb.push(" AND origin_node_id = ").push_bind(origin);
    }
    if let Some(dest) = filter.dest_node_id {
        qb.push(" AND dest_node_id = ").push_bind(dest);
    }
}

async fn require_endpoints(conn: &mut SqliteConnection, origin: Option<i64>, dest: Option<i64>) -> Result<()> {
    if let Some(origin) = origin {
        require_node(conn, origin, "origin_node_id").await?;
    }
    if let Some(dest) = dest {
        require_node(conn, dest, "dest_node_id").await?;
    }
    Ok(())
}

/// Cable database operations
pub struct CableRepo;

impl CableRepo {
    pub async fn list(pool: &Pool<Sqlite>, filter: &CableFilter, limit: i64, offset: i64) -> Result<Page<Cable>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM cables");
        push_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(pool)
            .await
            .context("Failed to count cables")?;

        let mut query = QueryBuilder::<Sqlite>::new(SELECT_CABLE);
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = query.build().fetch_all(pool).await.context("Failed to list cables")?;

        Ok(Page {
            items: rows.iter().map(map_cable_row).collect(),
            total,
        })
    }

    /// Cables with a drawable route (at least two points)
    pub async fn list_routed(pool: &Pool<Sqlite>) -> Result<Vec<Cable>> {
        let rows = sqlx::query(&format!(
            "{} WHERE path_coordinates IS NOT NULL AND path_coordinates != '[]' ORDER BY id",
            SELECT_CABLE
        ))
        .fetch_all(pool)
        .await
        .context("Failed to list cables for map")?;

        Ok(rows
            .iter()
            .map(map_cable_row)
            .filter(Cable::has_path)
            .collect())
    }

    pub async fn get(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Cable>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_CABLE))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to load cable")?;
        Ok(row.as_ref().map(map_cable_row))
    }

    /// Insert a cable together with its full core set
    pub async fn create(pool: &Pool<Sqlite>, req: &CreateCableRequest) -> Result<Cable> {
        let mut tx = pool.begin().await.context("Failed to start transaction")?;
        require_endpoints(&mut *tx, req.origin_node_id, req.dest_node_id).await?;

        let now = Utc::now();
        let path_json = serde_json::to_string(&req.path_coordinates)?;
        let result = sqlx::query(
            r#"
            INSERT INTO cables (name, type, core_count, length_meter, origin_node_id, dest_node_id,
                                path_coordinates, color_hex, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&req.name)
        .bind(req.cable_type)
        .bind(req.core_count)
        .bind(req.length_meter)
        .bind(req.origin_node_id)
        .bind(req.dest_node_id)
        .bind(&path_json)
        .bind(req.color_hex.as_deref().unwrap_or(DEFAULT_CABLE_COLOR))
        .bind(req.status.unwrap_or_default())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create cable")?;

        let cable_id = result.last_insert_rowid();
        let cores = generate_cores(cable_id, req.core_count)?;

        let mut insert = QueryBuilder::<Sqlite>::new(
            "INSERT INTO cable_cores (cable_id, core_index, tube_color, core_color, status, created_at, updated_at) ",
        );
        insert.push_values(cores.iter(), |mut b, core| {
            b.push_bind(core.cable_id)
                .push_bind(core.core_index)
                .push_bind(core.tube_color)
                .push_bind(core.core_color)
                .push_bind(core.status)
                .push_bind(now)
                .push_bind(now);
        });
        insert
            .build()
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to generate {} cores for cable {}", cores.len(), cable_id))?;

        tx.commit().await.context("Failed to commit transaction")?;
        tracing::debug!("Created cable {} with {} cores", cable_id, cores.len());

        Self::get(pool, cable_id)
            .await?
            .context("Cable not found after creation")
    }

    /// Update cable attributes; the core count is fixed at creation
    pub async fn update(pool: &Pool<Sqlite>, id: i64, req: &UpdateCableRequest) -> Result<Cable> {
        let mut tx = pool.begin().await.context("Failed to start transaction")?;

        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_CABLE))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to load cable")?;
        let mut cable = row
            .as_ref()
            .map(map_cable_row)
            .ok_or_else(|| NotFoundError::new("Cable", &id.to_string()))?;

        if let Some(core_count) = req.core_count {
            if core_count != cable.core_count {
                return Err(ValidationError::new(format!(
                    "core_count is fixed at creation ({}) and cannot be changed to {}",
                    cable.core_count, core_count
                ))
                .into());
            }
        }
        require_endpoints(&mut *tx, req.origin_node_id, req.dest_node_id).await?;

        cable.apply(req);
        let path_json = serde_json::to_string(&cable.path_coordinates)?;

        sqlx::query(
            r#"
            UPDATE cables SET name = ?, type = ?, length_meter = ?, origin_node_id = ?, dest_node_id = ?,
                              path_coordinates = ?, color_hex = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&cable.name)
        .bind(cable.cable_type)
        .bind(cable.length_meter)
        .bind(cable.origin_node_id)
        .bind(cable.dest_node_id)
        .bind(&path_json)
        .bind(&cable.color_hex)
        .bind(cable.status)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update cable")?;

        tx.commit().await.context("Failed to commit transaction")?;

        Self::get(pool, id)
            .await?
            .context("Cable not found after update")
    }

    /// Delete a cable and its cores, refused while any core is spliced
    pub async fn delete(pool: &Pool<Sqlite>, id: i64) -> Result<()> {
        let mut tx = pool.begin().await.context("Failed to start transaction")?;

        let spliced: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM connections
            WHERE (input_type = 'CORE' AND input_id IN (SELECT id FROM cable_cores WHERE cable_id = ?1))
               OR (output_type = 'CORE' AND output_id IN (SELECT id FROM cable_cores WHERE cable_id = ?1))
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to check cable splices")?;

        if spliced > 0 {
            return Err(ConflictError::new(format!(
                "cable {} has cores used by {} connection(s)",
                id, spliced
            ))
            .into());
        }

        sqlx::query("DELETE FROM cable_cores WHERE cable_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete cable cores")?;

        let result = sqlx::query("DELETE FROM cables WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete cable")?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Cable", &id.to_string()).into());
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(())
    }
}
