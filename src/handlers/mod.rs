pub mod cables;
pub mod connections;
pub mod customers;
pub mod geojson;
pub mod nodes;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::{ConflictError, NotFoundError, Page, ValidationError};

/// Shared pagination query parameters for list endpoints.
/// Defaults: limit=100, offset=0. Max limit=1000.
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl PaginationQuery {
    /// Non-positive limit falls back to the default, limit is capped at 1000
    /// and offset is clamped to >= 0
    pub fn sanitize(&self) -> (i64, i64) {
        let limit = if self.limit <= 0 {
            default_page_limit()
        } else {
            self.limit.min(1000)
        };
        let offset = self.offset.max(0);
        (limit, offset)
    }
}

fn default_page_limit() -> i64 {
    100
}

/// Standard response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
        })
    }

    pub fn with_message(msg: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(msg.into()),
            data: Some(data),
            error: None,
        })
    }
}

impl ApiResponse<()> {
    /// Success without a payload
    pub fn message(msg: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(msg.into()),
            data: None,
            error: None,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

impl Pagination {
    pub fn new(total: i64, limit: i64, offset: i64) -> Self {
        Self {
            total,
            limit,
            offset,
            has_more: offset.saturating_add(limit) < total,
        }
    }
}

/// Envelope for list endpoints
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> PaginatedResponse<T> {
    pub fn from_page(page: Page<T>, limit: i64, offset: i64) -> Json<Self> {
        Json(Self {
            success: true,
            pagination: Pagination::new(page.total, limit, offset),
            data: page.items,
        })
    }
}

/// API error type
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(resource: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("{} not found", resource),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            message: None,
            data: None,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(nf) = err.downcast_ref::<NotFoundError>() {
            return Self {
                status: StatusCode::NOT_FOUND,
                message: nf.to_string(),
            };
        }
        if let Some(conflict) = err.downcast_ref::<ConflictError>() {
            return Self::conflict(conflict.to_string());
        }
        if let Some(invalid) = err.downcast_ref::<ValidationError>() {
            return Self::bad_request(invalid.to_string());
        }
        tracing::error!("Request failed: {:#}", err);
        Self::internal(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

/// JSON body extractor whose rejections use the API envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejections use the API envelope
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Path extractor whose rejections use the API envelope
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Response helper: return 201 Created with the envelope
pub fn created<T: Serialize>(msg: &str, item: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, ApiResponse::with_message(msg, item))
}

/// Liveness probe
pub async fn healthcheck() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "message": "SPECTRA API is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(limit: i64, offset: i64) -> PaginationQuery {
        PaginationQuery { limit, offset }
    }

    #[test]
    fn test_sanitize_pagination() {
        assert_eq!(page(100, 0).sanitize(), (100, 0));
        assert_eq!(page(0, 0).sanitize(), (100, 0));
        assert_eq!(page(-5, -10).sanitize(), (100, 0));
        assert_eq!(page(5000, 20).sanitize(), (1000, 20));
    }

    #[test]
    fn test_has_more() {
        assert!(Pagination::new(30, 10, 0).has_more);
        assert!(Pagination::new(30, 10, 19).has_more);
        assert!(!Pagination::new(30, 10, 20).has_more);
        assert!(!Pagination::new(30, 10, 45).has_more);
        assert!(!Pagination::new(0, 100, 0).has_more);
        assert!(!Pagination::new(5, 100, i64::MAX).has_more);
        assert!(!Pagination::new(5, i64::MAX, 1).has_more);
    }

    #[test]
    fn test_error_envelope() {
        let err: ApiError = anyhow::Error::new(NotFoundError::new("Node", "9")).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "Node not found: 9");

        let err: ApiError = anyhow::Error::new(ConflictError::new("in use")).into();
        assert_eq!(err.status, StatusCode::CONFLICT);

        let err: ApiError = anyhow::Error::new(ValidationError::new("bad ports"))
            .context("Failed to update node")
            .into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err: ApiError = anyhow::anyhow!("disk I/O error").context("Failed to list nodes").into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Failed to list nodes");
    }
}
