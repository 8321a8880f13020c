use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geojson::{Feature, Geometry};

/// Kind of network infrastructure point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    /// Optical line terminal, the head-end a trace walks toward
    Olt,
    /// Optical distribution cabinet
    Odc,
    /// Optical distribution (access) point
    Odp,
    Closure,
    Pole,
    /// Subscriber premises
    Customer,
}

impl NodeType {
    pub fn is_head_end(self) -> bool {
        self == NodeType::Olt
    }
}

/// Operational status shared by nodes and cables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationalStatus {
    #[default]
    Active,
    Maintenance,
    Plan,
    Inactive,
}

pub const DEFAULT_CAPACITY_PORTS: i32 = 8;

/// Node represents a physical location or device in the fiber plant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub capacity_ports: i32,
    pub used_ports: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub status: OperationalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Merge a partial update into this node
    pub fn apply(&mut self, req: &UpdateNodeRequest) {
        if let Some(name) = &req.name {
            self.name = name.clone();
        }
        if let Some(node_type) = req.node_type {
            self.node_type = node_type;
        }
        if let Some(lat) = req.latitude {
            self.latitude = lat;
        }
        if let Some(lng) = req.longitude {
            self.longitude = lng;
        }
        if req.address.is_some() {
            self.address = req.address.clone();
        }
        if let Some(capacity) = req.capacity_ports {
            self.capacity_ports = capacity;
        }
        if let Some(used) = req.used_ports {
            self.used_ports = used;
        }
        if req.model.is_some() {
            self.model = req.model.clone();
        }
        if let Some(status) = req.status {
            self.status = status;
        }
    }

    /// Port counters must satisfy 0 <= used <= capacity
    pub fn validate_ports(&self) -> Result<(), String> {
        if self.capacity_ports < 0 {
            return Err("capacity_ports must not be negative".to_string());
        }
        if self.used_ports < 0 {
            return Err("used_ports must not be negative".to_string());
        }
        if self.used_ports > self.capacity_ports {
            return Err(format!(
                "used_ports ({}) exceeds capacity_ports ({})",
                self.used_ports, self.capacity_ports
            ));
        }
        Ok(())
    }

    pub fn to_feature(&self) -> Feature {
        let mut properties = serde_json::Map::new();
        properties.insert("id".into(), self.id.into());
        properties.insert("name".into(), self.name.clone().into());
        properties.insert("type".into(), serde_json::json!(self.node_type));
        properties.insert("status".into(), serde_json::json!(self.status));
        properties.insert("capacity_ports".into(), self.capacity_ports.into());
        properties.insert("used_ports".into(), self.used_ports.into());
        if let Some(address) = &self.address {
            properties.insert("address".into(), address.clone().into());
        }
        if let Some(model) = &self.model {
            properties.insert("model".into(), model.clone().into());
        }

        Feature::new(
            Geometry::Point {
                coordinates: [self.longitude, self.latitude],
            },
            properties,
        )
    }
}

/// CreateNodeRequest for creating new nodes
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNodeRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub capacity_ports: Option<i32>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub status: Option<OperationalStatus>,
}

/// UpdateNodeRequest carries only the fields to change
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNodeRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub node_type: Option<NodeType>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub capacity_ports: Option<i32>,
    #[serde(default)]
    pub used_ports: Option<i32>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub status: Option<OperationalStatus>,
}

/// Query filters for listing nodes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeFilter {
    #[serde(default, rename = "type")]
    pub node_type: Option<NodeType>,
    #[serde(default)]
    pub status: Option<OperationalStatus>,
}

/// A node returned by the proximity search, with its distance from the query point
#[derive(Debug, Clone, Serialize)]
pub struct NearbyNode {
    #[serde(flatten)]
    pub node: Node,
    pub distance_km: f64,
}
