use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Live status reported by the monitoring feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerStatus {
    Online,
    #[default]
    Offline,
    /// Loss of signal
    Los,
    PowerOff,
}

/// Receive-power thresholds (dBm)
pub const RX_POWER_GOOD: f64 = -25.0;
pub const RX_POWER_WARNING: f64 = -27.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RxPowerClass {
    Good,
    Warning,
    Critical,
}

impl RxPowerClass {
    pub fn classify(rx_power: f64) -> Self {
        if rx_power >= RX_POWER_GOOD {
            RxPowerClass::Good
        } else if rx_power >= RX_POWER_WARNING {
            RxPowerClass::Warning
        } else {
            RxPowerClass::Critical
        }
    }
}

/// Customer represents a subscriber termination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<i64>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ont_sn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub current_status: CustomerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_rx_power: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn apply(&mut self, req: &UpdateCustomerRequest) {
        if req.node_id.is_some() {
            self.node_id = req.node_id;
        }
        if let Some(name) = &req.name {
            self.name = name.clone();
        }
        if req.ont_sn.is_some() {
            self.ont_sn = req.ont_sn.clone();
        }
        if req.phone.is_some() {
            self.phone = req.phone.clone();
        }
        if req.email.is_some() {
            self.email = req.email.clone();
        }
        if let Some(status) = req.current_status {
            self.current_status = status;
        }
        if req.last_rx_power.is_some() {
            self.last_rx_power = req.last_rx_power;
        }
        if req.subscription_type.is_some() {
            self.subscription_type = req.subscription_type.clone();
        }
    }

    pub fn rx_power_class(&self) -> Option<RxPowerClass> {
        self.last_rx_power.map(RxPowerClass::classify)
    }
}

/// CreateCustomerRequest for registering a subscriber
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCustomerRequest {
    #[serde(default)]
    pub node_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub ont_sn: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub current_status: Option<CustomerStatus>,
    #[serde(default)]
    pub subscription_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCustomerRequest {
    #[serde(default)]
    pub node_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ont_sn: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub current_status: Option<CustomerStatus>,
    #[serde(default)]
    pub last_rx_power: Option<f64>,
    #[serde(default)]
    pub subscription_type: Option<String>,
}

/// Status update pushed by the monitoring feed
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCustomerStatusRequest {
    pub status: CustomerStatus,
    #[serde(default)]
    pub rx_power: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OntStatusUpdate {
    pub ont_sn: String,
    pub status: CustomerStatus,
    #[serde(default)]
    pub rx_power: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkStatusUpdateRequest {
    pub updates: Vec<OntStatusUpdate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkStatusUpdateResult {
    pub requested: usize,
    pub updated: u64,
}

/// Query filters for listing customers
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerFilter {
    #[serde(default)]
    pub node_id: Option<i64>,
    #[serde(default)]
    pub status: Option<CustomerStatus>,
    /// Substring match over name and ONT serial
    #[serde(default)]
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rx_power_classification() {
        assert_eq!(RxPowerClass::classify(-20.0), RxPowerClass::Good);
        assert_eq!(RxPowerClass::classify(-25.0), RxPowerClass::Good);
        assert_eq!(RxPowerClass::classify(-26.5), RxPowerClass::Warning);
        assert_eq!(RxPowerClass::classify(-27.0), RxPowerClass::Warning);
        assert_eq!(RxPowerClass::classify(-27.1), RxPowerClass::Critical);
    }

    #[test]
    fn test_status_wire_values() {
        assert_eq!(serde_json::to_string(&CustomerStatus::PowerOff).unwrap(), "\"POWER_OFF\"");
        assert_eq!(serde_json::to_string(&CustomerStatus::Los).unwrap(), "\"LOS\"");
    }
}
