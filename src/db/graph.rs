//! Snapshot reads feeding the topology engine. Each read runs in a single
//! transaction so the trace or matrix sees one consistent connection table.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashMap;

use crate::models::*;
use crate::topology::{self, splice::referenced_core_ids, HopDetails};

use super::cables::SELECT_CABLE;
use super::connections::SELECT_CONNECTION;
use super::cores::SELECT_CORE;
use super::customers::SELECT_CUSTOMER;
use super::nodes::SELECT_NODE;
use super::row_helpers::{map_cable_row, map_connection_row, map_core_row, map_customer_row, map_node_row};
use super::NotFoundError;

/// Ids bound per `IN (...)` query, well under SQLite's bind-variable limit
const ID_CHUNK: usize = 500;

/// Fetch rows by primary key, keyed by id
async fn fetch_by_ids<T>(
    conn: &mut SqliteConnection,
    select: &str,
    ids: &[i64],
    map: fn(&SqliteRow) -> T,
    id_of: fn(&T) -> i64,
) -> Result<HashMap<i64, T>> {
    let mut found = HashMap::with_capacity(ids.len());

    for chunk in ids.chunks(ID_CHUNK) {
        let mut query = QueryBuilder::<Sqlite>::new(select);
        query.push(" WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in chunk {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows = query
            .build()
            .fetch_all(&mut *conn)
            .await
            .with_context(|| format!("Failed to load {} rows by id", chunk.len()))?;
        found.extend(rows.iter().map(map).map(|item| (id_of(&item), item)));
    }
    Ok(found)
}

async fn all_connections(conn: &mut SqliteConnection) -> Result<Vec<Connection>> {
    let rows = sqlx::query(&format!("{} ORDER BY id", SELECT_CONNECTION))
        .fetch_all(&mut *conn)
        .await
        .context("Failed to load connections")?;
    Ok(rows.iter().map(map_connection_row).collect())
}

async fn cores_for(conn: &mut SqliteConnection, connections: &[Connection]) -> Result<HashMap<i64, CableCore>> {
    fetch_by_ids(conn, SELECT_CORE, &referenced_core_ids(connections), map_core_row, |c| c.id)
        .await
        .context("Failed to load referenced cores")
}

/// Walk from a customer's serving node toward the head-end
pub async fn trace_customer(pool: &Pool<Sqlite>, customer_id: i64, max_hops: usize) -> Result<CustomerTrace> {
    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_CUSTOMER))
        .bind(customer_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to load customer")?;
    let customer = row
        .as_ref()
        .map(map_customer_row)
        .ok_or_else(|| NotFoundError::new("Customer", &customer_id.to_string()))?;

    let connections = all_connections(&mut *tx).await?;
    let node_types: HashMap<i64, NodeType> = sqlx::query_as::<_, (i64, NodeType)>("SELECT id, type FROM nodes")
        .fetch_all(&mut *tx)
        .await
        .context("Failed to load node types")?
        .into_iter()
        .collect();

    let walk = topology::walk(&connections, customer.node_id, &node_types, max_hops);

    let nodes = fetch_by_ids(&mut *tx, SELECT_NODE, &walk.node_ids(), map_node_row, |n| n.id)
        .await
        .context("Failed to load trace nodes")?;
    let cores = fetch_by_ids(&mut *tx, SELECT_CORE, &walk.output_core_ids(), map_core_row, |c| c.id)
        .await
        .context("Failed to load trace cores")?;
    let mut cable_ids: Vec<i64> = cores.values().map(|c| c.cable_id).collect();
    cable_ids.sort_unstable();
    cable_ids.dedup();
    let cables = fetch_by_ids(&mut *tx, SELECT_CABLE, &cable_ids, map_cable_row, |c| c.id)
        .await
        .context("Failed to load trace cables")?;

    tx.commit().await.context("Failed to commit transaction")?;

    let trace = topology::assemble(customer, walk, &HopDetails { nodes, cores, cables });
    tracing::debug!(
        "Traced customer {}: {} hop(s), {:.2} dB, {:?}",
        customer_id, trace.total_hops, trace.total_loss_db, trace.termination
    );
    Ok(trace)
}

/// Splice matrix for the connections at one location
pub async fn splice_matrix(pool: &Pool<Sqlite>, node_id: i64) -> Result<SpliceMatrix> {
    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_NODE))
        .bind(node_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to load location node")?;
    let node = row
        .as_ref()
        .map(map_node_row)
        .ok_or_else(|| NotFoundError::new("Node", &node_id.to_string()))?;

    let rows = sqlx::query(&format!("{} WHERE location_node_id = ? ORDER BY id", SELECT_CONNECTION))
        .bind(node_id)
        .fetch_all(&mut *tx)
        .await
        .context("Failed to load connections at location")?;
    let connections: Vec<Connection> = rows.iter().map(map_connection_row).collect();
    let cores = cores_for(&mut *tx, &connections).await?;

    tx.commit().await.context("Failed to commit transaction")?;
    Ok(topology::build_matrix(Some(node), connections, &cores))
}

/// Splice matrix across every connection in the network
pub async fn network_matrix(pool: &Pool<Sqlite>) -> Result<SpliceMatrix> {
    let mut tx = pool.begin().await.context("Failed to start transaction")?;
    let connections = all_connections(&mut *tx).await?;
    let cores = cores_for(&mut *tx, &connections).await?;
    tx.commit().await.context("Failed to commit transaction")?;
    Ok(topology::build_matrix(None, connections, &cores))
}
