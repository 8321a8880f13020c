//! Great-circle proximity search.

use serde::Deserialize;

use crate::models::{NearbyNode, Node, NodeType};

pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const MAX_RADIUS_KM: f64 = 100.0;
pub const DEFAULT_RADIUS_METERS: f64 = 1000.0;

/// Haversine distance between two points in kilometers
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// Raw query string of `GET /api/nodes/nearby`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NearbyParams {
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lng: f64,
    /// Radius in meters
    #[serde(default)]
    pub radius: Option<f64>,
    #[serde(default, rename = "type")]
    pub node_type: Option<NodeType>,
}

/// A validated proximity query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: f64,
    pub node_type: Option<NodeType>,
}

impl TryFrom<NearbyParams> for NearbyQuery {
    type Error = String;

    fn try_from(params: NearbyParams) -> Result<Self, Self::Error> {
        // 0,0 is what an absent lat/lng deserializes to
        if params.lat == 0.0 && params.lng == 0.0 {
            return Err("lat and lng are required".to_string());
        }
        if !(-90.0..=90.0).contains(&params.lat) {
            return Err(format!("lat must be between -90 and 90 (got {})", params.lat));
        }
        if !(-180.0..=180.0).contains(&params.lng) {
            return Err(format!("lng must be between -180 and 180 (got {})", params.lng));
        }

        let radius_km = params.radius.unwrap_or(DEFAULT_RADIUS_METERS) / 1000.0;
        if !(radius_km > 0.0 && radius_km <= MAX_RADIUS_KM) {
            return Err(format!(
                "radius must be greater than 0 and at most {} meters",
                MAX_RADIUS_KM * 1000.0
            ));
        }

        Ok(Self {
            lat: params.lat,
            lng: params.lng,
            radius_km,
            node_type: params.node_type,
        })
    }
}

impl NearbyQuery {
    /// Latitude band that contains every point within the radius
    pub fn latitude_band(&self) -> (f64, f64) {
        let delta = (self.radius_km / EARTH_RADIUS_KM).to_degrees();
        ((self.lat - delta).max(-90.0), (self.lat + delta).min(90.0))
    }

    /// Keep candidates inside the radius, nearest first
    pub fn rank(&self, candidates: Vec<Node>) -> Vec<NearbyNode> {
        let mut nearby: Vec<NearbyNode> = candidates
            .into_iter()
            .filter(|node| self.node_type.map_or(true, |t| node.node_type == t))
            .map(|node| NearbyNode {
                distance_km: haversine_km(self.lat, self.lng, node.latitude, node.longitude),
                node,
            })
            .filter(|n| n.distance_km <= self.radius_km)
            .collect();
        nearby.sort_by(|a, b| {
            a.distance_km
                .total_cmp(&b.distance_km)
                .then(a.node.id.cmp(&b.node.id))
        });
        nearby
    }
}
