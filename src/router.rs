use axum::{
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Build the application router with all routes
pub fn build(state: Arc<AppState>) -> Router {
    let request_timeout = state.config.request_timeout;

    Router::new()
        .route("/api/health", get(handlers::healthcheck))
        // Node routes
        .route(
            "/api/nodes",
            get(handlers::nodes::list_nodes).post(handlers::nodes::create_node),
        )
        .route("/api/nodes/nearby", get(handlers::nodes::nearby_nodes))
        .route(
            "/api/nodes/:id",
            get(handlers::nodes::get_node)
                .put(handlers::nodes::update_node)
                .delete(handlers::nodes::delete_node),
        )
        // Cable routes
        .route(
            "/api/cables",
            get(handlers::cables::list_cables).post(handlers::cables::create_cable),
        )
        .route(
            "/api/cables/:id",
            get(handlers::cables::get_cable)
                .put(handlers::cables::update_cable)
                .delete(handlers::cables::delete_cable),
        )
        .route("/api/cables/:id/cores", get(handlers::cables::list_cable_cores))
        .route("/api/cables/:id/cores/:core_id", put(handlers::cables::update_cable_core))
        // Connection routes
        .route(
            "/api/connections",
            get(handlers::connections::list_connections).post(handlers::connections::create_connection),
        )
        .route("/api/connections/matrix", get(handlers::connections::network_matrix))
        .route("/api/connections/matrix/:node_id", get(handlers::connections::splice_matrix))
        .route(
            "/api/connections/location/:node_id",
            get(handlers::connections::connections_at_location),
        )
        .route(
            "/api/connections/:id",
            get(handlers::connections::get_connection).delete(handlers::connections::delete_connection),
        )
        // Customer routes
        .route(
            "/api/customers",
            get(handlers::customers::list_customers).post(handlers::customers::create_customer),
        )
        .route("/api/customers/los", get(handlers::customers::list_los_customers))
        .route("/api/customers/status/bulk", post(handlers::customers::bulk_update_status))
        .route(
            "/api/customers/:id",
            get(handlers::customers::get_customer)
                .put(handlers::customers::update_customer)
                .delete(handlers::customers::delete_customer),
        )
        .route("/api/customers/:id/status", patch(handlers::customers::update_customer_status))
        .route("/api/customers/:id/trace", get(handlers::customers::trace_customer))
        // GeoJSON routes
        .route("/api/geojson/nodes", get(handlers::geojson::nodes))
        .route("/api/geojson/cables", get(handlers::geojson::cables))
        // Add state and middleware
        .with_state(state)
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
