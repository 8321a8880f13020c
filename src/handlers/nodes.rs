use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::models::*;
use crate::topology::{NearbyParams, NearbyQuery};
use crate::AppState;

use super::{created, ApiError, ApiJson, ApiPath, ApiQuery, ApiResponse, PaginatedResponse, PaginationQuery};

fn validate_coordinates(lat: f64, lng: f64) -> Result<(), ApiError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(ApiError::bad_request("latitude must be between -90 and 90"));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(ApiError::bad_request("longitude must be between -180 and 180"));
    }
    Ok(())
}

/// List nodes with optional type/status filters
pub async fn list_nodes(
    State(state): State<Arc<AppState>>,
    ApiQuery(page): ApiQuery<PaginationQuery>,
    ApiQuery(filter): ApiQuery<NodeFilter>,
) -> Result<Json<PaginatedResponse<Node>>, ApiError> {
    let (limit, offset) = page.sanitize();
    let nodes = state.store.list_nodes(&filter, limit, offset).await?;
    Ok(PaginatedResponse::from_page(nodes, limit, offset))
}

pub async fn get_node(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Node>>, ApiError> {
    let node = state
        .store
        .get_node(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Node"))?;
    Ok(ApiResponse::ok(node))
}

pub async fn create_node(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CreateNodeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Node>>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    validate_coordinates(req.latitude, req.longitude)?;

    let node = state.store.create_node(&req).await?;
    tracing::info!("Created node {} ({:?} {})", node.id, node.node_type, node.name);
    Ok(created("Node created successfully", node))
}

pub async fn update_node(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateNodeRequest>,
) -> Result<Json<ApiResponse<Node>>, ApiError> {
    if req.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("name must not be empty"));
    }
    validate_coordinates(req.latitude.unwrap_or_default(), req.longitude.unwrap_or_default())?;

    let node = state.store.update_node(id, &req).await?;
    Ok(ApiResponse::with_message("Node updated successfully", node))
}

pub async fn delete_node(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.store.delete_node(id).await?;
    tracing::info!("Deleted node {}", id);
    Ok(ApiResponse::message("Node deleted successfully"))
}

/// Nodes within a radius (meters) of a point, nearest first
pub async fn nearby_nodes(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<NearbyParams>,
) -> Result<Json<ApiResponse<Vec<NearbyNode>>>, ApiError> {
    let query = NearbyQuery::try_from(params).map_err(ApiError::bad_request)?;
    let nodes = state.store.nearby_nodes(&query).await?;
    Ok(ApiResponse::ok(nodes))
}
