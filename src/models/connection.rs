use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a connection endpoint refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndpointType {
    /// A cable core (`cable_cores.id`)
    Core,
    /// A subscriber or equipment port (opaque id)
    Port,
}

/// One side of a connection. Two connections chain when the output
/// endpoint of one equals the input endpoint of the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(rename = "type")]
    pub kind: EndpointType,
    pub id: i64,
}

impl Endpoint {
    pub fn core(id: i64) -> Self {
        Self { kind: EndpointType::Core, id }
    }

    pub fn port(id: i64) -> Self {
        Self { kind: EndpointType::Port, id }
    }

    /// The referenced core id, if this endpoint is a core
    pub fn core_id(&self) -> Option<i64> {
        (self.kind == EndpointType::Core).then_some(self.id)
    }
}

/// Connection represents a splice or patch at a location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_node_id: Option<i64>,
    pub input_type: EndpointType,
    pub input_id: i64,
    pub output_type: EndpointType,
    pub output_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_db: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Connection {
    pub fn input(&self) -> Endpoint {
        Endpoint {
            kind: self.input_type,
            id: self.input_id,
        }
    }

    pub fn output(&self) -> Endpoint {
        Endpoint {
            kind: self.output_type,
            id: self.output_id,
        }
    }

    /// Core ids referenced by either endpoint (input first, deduplicated)
    pub fn core_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = [self.input(), self.output()]
            .iter()
            .filter_map(Endpoint::core_id)
            .collect();
        ids.dedup();
        ids
    }

    pub fn is_core_splice(&self) -> bool {
        self.input_type == EndpointType::Core && self.output_type == EndpointType::Core
    }

    /// Loss contribution with unknown loss counted as zero
    pub fn effective_loss(&self) -> f64 {
        self.loss_db.unwrap_or(0.0)
    }
}

/// CreateConnectionRequest for recording a splice
#[derive(Debug, Clone, Deserialize)]
pub struct CreateConnectionRequest {
    #[serde(default)]
    pub location_node_id: Option<i64>,
    pub input_type: EndpointType,
    pub input_id: i64,
    pub output_type: EndpointType,
    pub output_id: i64,
    #[serde(default)]
    pub loss_db: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Query filters for listing connections
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionFilter {
    #[serde(default)]
    pub location_node_id: Option<i64>,
    #[serde(default)]
    pub input_type: Option<EndpointType>,
    #[serde(default)]
    pub input_id: Option<i64>,
    #[serde(default)]
    pub output_type: Option<EndpointType>,
    #[serde(default)]
    pub output_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(input: Endpoint, output: Endpoint) -> Connection {
        Connection {
            id: 1,
            location_node_id: None,
            input_type: input.kind,
            input_id: input.id,
            output_type: output.kind,
            output_id: output.id,
            loss_db: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_core_ids() {
        assert_eq!(connection(Endpoint::core(4), Endpoint::core(9)).core_ids(), vec![4, 9]);
        assert_eq!(connection(Endpoint::port(4), Endpoint::core(9)).core_ids(), vec![9]);
        assert!(connection(Endpoint::port(4), Endpoint::port(9)).core_ids().is_empty());
        // a loopback splice on one core is counted once
        assert_eq!(connection(Endpoint::core(5), Endpoint::core(5)).core_ids(), vec![5]);
    }

    #[test]
    fn test_endpoint_equality_includes_type() {
        assert_ne!(Endpoint::core(3), Endpoint::port(3));
        assert_eq!(Endpoint::core(3), Endpoint::core(3));
    }
}
