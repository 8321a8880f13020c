use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geojson::{Feature, Geometry};
use super::node::OperationalStatus;

/// Physical construction of a cable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CableType {
    /// All-dielectric self-supporting (aerial)
    Adss,
    /// Underground duct
    Duct,
    Drop,
}

pub const MAX_CORE_COUNT: i32 = 288;
pub const DEFAULT_CABLE_COLOR: &str = "#000000";

/// Cable represents a fiber bundle between two nodes (either end may be unterminated)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cable {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub cable_type: CableType,
    pub core_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_meter: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_node_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_node_id: Option<i64>,
    /// Route as `[longitude, latitude]` pairs
    pub path_coordinates: Vec<[f64; 2]>,
    pub color_hex: String,
    pub status: OperationalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cable {
    pub fn apply(&mut self, req: &UpdateCableRequest) {
        if req.name.is_some() {
            self.name = req.name.clone();
        }
        if let Some(cable_type) = req.cable_type {
            self.cable_type = cable_type;
        }
        if req.length_meter.is_some() {
            self.length_meter = req.length_meter;
        }
        if req.origin_node_id.is_some() {
            self.origin_node_id = req.origin_node_id;
        }
        if req.dest_node_id.is_some() {
            self.dest_node_id = req.dest_node_id;
        }
        if let Some(path) = &req.path_coordinates {
            self.path_coordinates = path.clone();
        }
        if let Some(color) = &req.color_hex {
            self.color_hex = color.clone();
        }
        if let Some(status) = req.status {
            self.status = status;
        }
    }

    /// A route needs at least two points to be drawn
    pub fn has_path(&self) -> bool {
        self.path_coordinates.len() >= 2
    }

    pub fn to_feature(&self) -> Feature {
        let mut properties = serde_json::Map::new();
        properties.insert("id".into(), self.id.into());
        properties.insert("type".into(), serde_json::json!(self.cable_type));
        properties.insert("core_count".into(), self.core_count.into());
        properties.insert("status".into(), serde_json::json!(self.status));
        properties.insert("color_hex".into(), self.color_hex.clone().into());
        if let Some(name) = &self.name {
            properties.insert("name".into(), name.clone().into());
        }
        if let Some(length) = self.length_meter {
            properties.insert("length_meter".into(), length.into());
        }
        if let Some(origin) = self.origin_node_id {
            properties.insert("origin_node_id".into(), origin.into());
        }
        if let Some(dest) = self.dest_node_id {
            properties.insert("dest_node_id".into(), dest.into());
        }

        Feature::new(
            Geometry::LineString {
                coordinates: self.path_coordinates.clone(),
            },
            properties,
        )
    }
}

/// Check every path point is a valid `[longitude, latitude]` pair
pub fn validate_path(path: &[[f64; 2]]) -> Result<(), String> {
    for (i, [lng, lat]) in path.iter().enumerate() {
        if !(-180.0..=180.0).contains(lng) || !(-90.0..=90.0).contains(lat) {
            return Err(format!(
                "path_coordinates[{}] is out of range (expected [longitude, latitude])",
                i
            ));
        }
    }
    Ok(())
}

/// CreateCableRequest for creating new cables (cores are generated from core_count)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCableRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub cable_type: CableType,
    pub core_count: i32,
    #[serde(default)]
    pub length_meter: Option<f64>,
    #[serde(default)]
    pub origin_node_id: Option<i64>,
    #[serde(default)]
    pub dest_node_id: Option<i64>,
    #[serde(default)]
    pub path_coordinates: Vec<[f64; 2]>,
    #[serde(default)]
    pub color_hex: Option<String>,
    #[serde(default)]
    pub status: Option<OperationalStatus>,
}

/// UpdateCableRequest carries only the fields to change.
/// `core_count` is accepted only when it matches the existing value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCableRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub cable_type: Option<CableType>,
    #[serde(default)]
    pub core_count: Option<i32>,
    #[serde(default)]
    pub length_meter: Option<f64>,
    #[serde(default)]
    pub origin_node_id: Option<i64>,
    #[serde(default)]
    pub dest_node_id: Option<i64>,
    #[serde(default)]
    pub path_coordinates: Option<Vec<[f64; 2]>>,
    #[serde(default)]
    pub color_hex: Option<String>,
    #[serde(default)]
    pub status: Option<OperationalStatus>,
}

/// Query filters for listing cables
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CableFilter {
    #[serde(default, rename = "type")]
    pub cable_type: Option<CableType>,
    #[serde(default)]
    pub status: Option<OperationalStatus>,
    #[serde(default)]
    pub origin_node_id: Option<i64>,
    #[serde(default)]
    pub dest_node_id: Option<i64>,
}
