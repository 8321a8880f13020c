use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::models::*;
use crate::AppState;

use super::{created, ApiError, ApiJson, ApiPath, ApiQuery, ApiResponse, PaginatedResponse, PaginationQuery};

/// List connections with optional location/endpoint filters
pub async fn list_connections(
    State(state): State<Arc<AppState>>,
    ApiQuery(page): ApiQuery<PaginationQuery>,
    ApiQuery(filter): ApiQuery<ConnectionFilter>,
) -> Result<Json<PaginatedResponse<Connection>>, ApiError> {
    let (limit, offset) = page.sanitize();
    let connections = state.store.list_connections(&filter, limit, offset).await?;
    Ok(PaginatedResponse::from_page(connections, limit, offset))
}

pub async fn get_connection(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Connection>>, ApiError> {
    let connection = state
        .store
        .get_connection(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Connection"))?;
    Ok(ApiResponse::ok(connection))
}

/// Record a splice; referenced cores are marked USED
pub async fn create_connection(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CreateConnectionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Connection>>), ApiError> {
    if req.loss_db.is_some_and(|loss| loss < 0.0 || !loss.is_finite()) {
        return Err(ApiError::bad_request("loss_db must be a non-negative number"));
    }

    let connection = state.store.create_connection(&req).await?;
    Ok(created("Connection created successfully", connection))
}

/// Remove a splice; cores no longer referenced go back to VACANT
pub async fn delete_connection(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.store.delete_connection(id).await?;
    Ok(ApiResponse::message("Connection deleted successfully"))
}

/// All connections recorded at one location node
pub async fn connections_at_location(
    State(state): State<Arc<AppState>>,
    ApiPath(node_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Vec<Connection>>>, ApiError> {
    if state.store.get_node(node_id).await?.is_none() {
        return Err(ApiError::not_found("Node"));
    }
    let connections = state.store.list_connections_at(node_id).await?;
    Ok(ApiResponse::ok(connections))
}

/// Splice matrix for one closure/ODP
pub async fn splice_matrix(
    State(state): State<Arc<AppState>>,
    ApiPath(node_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<SpliceMatrix>>, ApiError> {
    let matrix = state.store.splice_matrix(node_id).await?;
    if !matrix.consistency.consistent {
        tracing::warn!(
            "Splice matrix at node {} is inconsistent: {:?}",
            node_id,
            matrix.consistency
        );
    }
    Ok(ApiResponse::ok(matrix))
}

/// Network-wide splice matrix
pub async fn network_matrix(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<SpliceMatrix>>, ApiError> {
    let matrix = state.store.network_matrix().await?;
    Ok(ApiResponse::ok(matrix))
}
