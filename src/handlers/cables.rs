use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::models::*;
use crate::AppState;

use super::{created, ApiError, ApiJson, ApiPath, ApiQuery, ApiResponse, PaginatedResponse, PaginationQuery};

fn is_valid_color_hex(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

fn validate_common(
    path: Option<&[[f64; 2]]>,
    color_hex: Option<&str>,
    length_meter: Option<f64>,
) -> Result<(), ApiError> {
    if let Some(path) = path {
        validate_path(path).map_err(ApiError::bad_request)?;
    }
    if let Some(color) = color_hex {
        if !is_valid_color_hex(color) {
            return Err(ApiError::bad_request("color_hex must look like #RRGGBB"));
        }
    }
    if length_meter.is_some_and(|l| l < 0.0) {
        return Err(ApiError::bad_request("length_meter must not be negative"));
    }
    Ok(())
}

/// List cables with optional type/status/endpoint filters
pub async fn list_cables(
    State(state): State<Arc<AppState>>,
    ApiQuery(page): ApiQuery<PaginationQuery>,
    ApiQuery(filter): ApiQuery<CableFilter>,
) -> Result<Json<PaginatedResponse<Cable>>, ApiError> {
    let (limit, offset) = page.sanitize();
    let cables = state.store.list_cables(&filter, limit, offset).await?;
    Ok(PaginatedResponse::from_page(cables, limit, offset))
}

pub async fn get_cable(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Cable>>, ApiError> {
    let cable = state
        .store
        .get_cable(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Cable"))?;
    Ok(ApiResponse::ok(cable))
}

/// Create a cable; its cores are generated in the same transaction
pub async fn create_cable(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CreateCableRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Cable>>), ApiError> {
    if !(1..=MAX_CORE_COUNT).contains(&req.core_count) {
        return Err(ApiError::bad_request(format!(
            "core_count must be between 1 and {}",
            MAX_CORE_COUNT
        )));
    }
    validate_common(Some(req.path_coordinates.as_slice()), req.color_hex.as_deref(), req.length_meter)?;

    let cable = state.store.create_cable(&req).await?;
    tracing::info!("Created cable {} with {} cores", cable.id, cable.core_count);
    Ok(created("Cable created successfully", cable))
}

pub async fn update_cable(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateCableRequest>,
) -> Result<Json<ApiResponse<Cable>>, ApiError> {
    validate_common(req.path_coordinates.as_deref(), req.color_hex.as_deref(), req.length_meter)?;

    let cable = state.store.update_cable(id, &req).await?;
    Ok(ApiResponse::with_message("Cable updated successfully", cable))
}

pub async fn delete_cable(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.store.delete_cable(id).await?;
    tracing::info!("Deleted cable {}", id);
    Ok(ApiResponse::message("Cable deleted successfully"))
}

/// Cores of a cable ordered by index
pub async fn list_cable_cores(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Vec<CableCore>>>, ApiError> {
    if state.store.get_cable(id).await?.is_none() {
        return Err(ApiError::not_found("Cable"));
    }
    let cores = state.store.list_cores(id).await?;
    Ok(ApiResponse::ok(cores))
}

/// Manual color/state override for one core
pub async fn update_cable_core(
    State(state): State<Arc<AppState>>,
    ApiPath((cable_id, core_id)): ApiPath<(i64, i64)>,
    ApiJson(req): ApiJson<UpdateCableCoreRequest>,
) -> Result<Json<ApiResponse<CableCore>>, ApiError> {
    if req.is_empty() {
        return Err(ApiError::bad_request("nothing to update: set tube_color, core_color or status"));
    }

    let core = state.store.update_core(cable_id, core_id, &req).await?;
    tracing::info!("Core {} of cable {} updated (status {:?})", core_id, cable_id, core.status);
    Ok(ApiResponse::with_message("Core updated successfully", core))
}
