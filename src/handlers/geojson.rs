use axum::{extract::State, Json};
use std::sync::Arc;

use crate::models::*;
use crate::AppState;

use super::{ApiError, ApiQuery};

/// Nodes as a GeoJSON FeatureCollection of points
pub async fn nodes(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<NodeFilter>,
) -> Result<Json<FeatureCollection>, ApiError> {
    let nodes = state.store.list_all_nodes(&filter).await?;
    Ok(Json(FeatureCollection::new(
        nodes.iter().map(Node::to_feature).collect(),
    )))
}

/// Cables with a drawn route as LineString features
pub async fn cables(State(state): State<Arc<AppState>>) -> Result<Json<FeatureCollection>, ApiError> {
    let cables = state.store.list_routed_cables().await?;
    Ok(Json(FeatureCollection::new(
        cables.iter().map(Cable::to_feature).collect(),
    )))
}
