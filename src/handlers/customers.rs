use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::models::*;
use crate::AppState;

use super::{created, ApiError, ApiJson, ApiPath, ApiQuery, ApiResponse, PaginatedResponse, PaginationQuery};

/// List customers, optionally filtered by node, status or a name/serial search
pub async fn list_customers(
    State(state): State<Arc<AppState>>,
    ApiQuery(page): ApiQuery<PaginationQuery>,
    ApiQuery(filter): ApiQuery<CustomerFilter>,
) -> Result<Json<PaginatedResponse<Customer>>, ApiError> {
    let (limit, offset) = page.sanitize();
    let customers = state.store.list_customers(&filter, limit, offset).await?;
    Ok(PaginatedResponse::from_page(customers, limit, offset))
}

pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Customer>>, ApiError> {
    let customer = state
        .store
        .get_customer(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer"))?;
    Ok(ApiResponse::ok(customer))
}

pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Customer>>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }

    let customer = state.store.create_customer(&req).await?;
    tracing::info!("Created customer {} ({})", customer.id, customer.name);
    Ok(created("Customer created successfully", customer))
}

pub async fn update_customer(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateCustomerRequest>,
) -> Result<Json<ApiResponse<Customer>>, ApiError> {
    if req.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("name must not be empty"));
    }

    let customer = state.store.update_customer(id, &req).await?;
    Ok(ApiResponse::with_message("Customer updated successfully", customer))
}

pub async fn delete_customer(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.store.delete_customer(id).await?;
    tracing::info!("Deleted customer {}", id);
    Ok(ApiResponse::message("Customer deleted successfully"))
}

/// Customers currently in loss of signal
pub async fn list_los_customers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Customer>>>, ApiError> {
    let customers = state.store.list_los_customers().await?;
    Ok(ApiResponse::ok(customers))
}

/// Live status update for one customer
pub async fn update_customer_status(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateCustomerStatusRequest>,
) -> Result<Json<ApiResponse<Customer>>, ApiError> {
    let customer = state.store.update_customer_status(id, &req).await?;
    Ok(ApiResponse::with_message("Customer status updated", customer))
}

/// Batch status update keyed by ONT serial number
pub async fn bulk_update_status(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<BulkStatusUpdateRequest>,
) -> Result<Json<ApiResponse<BulkStatusUpdateResult>>, ApiError> {
    if req.updates.is_empty() {
        return Err(ApiError::bad_request("updates must not be empty"));
    }
    if req.updates.iter().any(|u| u.ont_sn.trim().is_empty()) {
        return Err(ApiError::bad_request("every update needs an ont_sn"));
    }

    let updated = state.store.bulk_update_customer_status(&req.updates).await?;
    let result = BulkStatusUpdateResult {
        requested: req.updates.len(),
        updated,
    };
    Ok(ApiResponse::ok(result))
}

/// Walk from the customer's premises toward the OLT, summing loss
pub async fn trace_customer(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<CustomerTrace>>, ApiError> {
    let trace = state.store.trace_customer(id, state.config.trace_max_hops).await?;
    if trace.cycle_detected {
        tracing::warn!("Trace for customer {} revisits a connection (cycle in splice data)", id);
    }
    Ok(ApiResponse::ok(trace))
}
