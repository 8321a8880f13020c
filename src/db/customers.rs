use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, QueryBuilder, Sqlite};

use crate::models::*;

use super::nodes::require_node;
use super::row_helpers::map_customer_row;
use super::{NotFoundError, Page};

pub(super) const SELECT_CUSTOMER: &str = r#"
    SELECT id, node_id, name, ont_sn, phone, email, current_status, last_rx_power,
           subscription_type, created_at, updated_at
    FROM customers
"#;

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &CustomerFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(node_id) = filter.node_id {
        qb.push(" AND node_id = ").push_bind(node_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND current_status = ").push_bind(status);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR ont_sn LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

/// Escape LIKE wildcards so the search term matches literally
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Customer database operations
pub struct CustomerRepo;

impl CustomerRepo {
    pub async fn list(pool: &Pool<Sqlite>, filter: &CustomerFilter, limit: i64, offset: i64) -> Result<Page<Customer>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM customers");
        push_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(pool)
            .await
            .context("Failed to count customers")?;

        let mut query = QueryBuilder::<Sqlite>::new(SELECT_CUSTOMER);
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
            .context("Failed to list customers")?;

        Ok(Page {
            items: rows.iter().map(map_customer_row).collect(),
            total,
        })
    }

    pub async fn list_by_status(pool: &Pool<Sqlite>, status: CustomerStatus) -> Result<Vec<Customer>> {
        let rows = sqlx::query(&format!(
            "{} WHERE current_status = ? ORDER BY updated_at DESC, id DESC",
            SELECT_CUSTOMER
        ))
        .bind(status)
        .fetch_all(pool)
        .await
        .context("Failed to list customers by status")?;
        Ok(rows.iter().map(map_customer_row).collect())
    }

    pub async fn get(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Customer>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_CUSTOMER))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to load customer")?;
        Ok(row.as_ref().map(map_customer_row))
    }

    pub async fn create(pool: &Pool<Sqlite>, req: &CreateCustomerRequest) -> Result<Customer> {
        let mut tx = pool.begin().await.context("Failed to start transaction")?;
        if let Some(node_id) = req.node_id {
            require_node(&mut *tx, node_id, "node_id").await?;
        }

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO customers (node_id, name, ont_sn, phone, email, current_status,
                                   subscription_type, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(req.node_id)
        .bind(&req.name)
        .bind(&req.ont_sn)
        .bind(&req.phone)
        .bind(&req.email)
        .bind(req.current_status.unwrap_or_default())
        .bind(&req.subscription_type)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create customer")?;

        tx.commit().await.context("Failed to commit transaction")?;

        let new_id = result.last_insert_rowid();
        Self::get(pool, new_id)
            .await?
            .context("Customer not found after creation")
    }

    pub async fn update(pool: &Pool<Sqlite>, id: i64, req: &UpdateCustomerRequest) -> Result<Customer> {
        let mut tx = pool.begin().await.context("Failed to start transaction")?;

        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_CUSTOMER))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to load customer")?;
        let mut customer = row
            .as_ref()
            .map(map_customer_row)
            .ok_or_else(|| NotFoundError::new("Customer", &id.to_string()))?;

        if let Some(node_id) = req.node_id {
            require_node(&mut *tx, node_id, "node_id").await?;
        }
        customer.apply(req);

        sqlx::query(
            r#"
            UPDATE customers SET node_id = ?, name = ?, ont_sn = ?, phone = ?, email = ?,
                                 current_status = ?, last_rx_power = ?, subscription_type = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(customer.node_id)
        .bind(&customer.name)
        .bind(&customer.ont_sn)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(customer.current_status)
        .bind(customer.last_rx_power)
        .bind(&customer.subscription_type)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update customer")?;

        tx.commit().await.context("Failed to commit transaction")?;

        Self::get(pool, id)
            .await?
            .context("Customer not found after update")
    }

    /// Live status from the monitoring feed; receive power is kept when not reported
    pub async fn update_status(pool: &Pool<Sqlite>, id: i64, req: &UpdateCustomerStatusRequest) -> Result<Customer> {
        let result = sqlx::query(
            r#"
            UPDATE customers SET current_status = ?, last_rx_power = COALESCE(?, last_rx_power), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.status)
        .bind(req.rx_power)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update customer status")?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Customer", &id.to_string()).into());
        }

        Self::get(pool, id)
            .await?
            .context("Customer not found after status update")
    }

    /// Apply a batch of status reports keyed by ONT serial in one transaction.
    /// Unknown serials are skipped; returns the number of customers updated.
    pub async fn bulk_update_status(pool: &Pool<Sqlite>, updates: &[OntStatusUpdate]) -> Result<u64> {
        let mut tx = pool.begin().await.context("Failed to start transaction")?;
        let now = Utc::now();
        let mut updated = 0;

        for update in updates {
            let result = sqlx::query(
                r#"
                UPDATE customers SET current_status = ?, last_rx_power = COALESCE(?, last_rx_power), updated_at = ?
                WHERE ont_sn = ?
                "#,
            )
            .bind(update.status)
            .bind(update.rx_power)
            .bind(now)
            .bind(&update.ont_sn)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to update status for ONT {}", update.ont_sn))?;

            if result.rows_affected() == 0 {
                tracing::debug!("No customer with ONT serial {}", update.ont_sn);
            }
            updated += result.rows_affected();
        }

        tx.commit().await.context("Failed to commit transaction")?;
        tracing::info!("Bulk status update: {} of {} reports applied", updated, updates.len());
        Ok(updated)
    }

    pub async fn delete(pool: &Pool<Sqlite>, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM customers WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to delete customer")?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Customer", &id.to_string()).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("ZTEG_01"), "ZTEG\\_01");
        assert_eq!(escape_like("50%"), "50\\%");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("plain"), "plain");
    }
}
