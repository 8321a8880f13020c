use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Allocation state of a single fiber core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoreStatus {
    #[default]
    Vacant,
    Used,
    Reserved,
    Damaged,
}

/// CableCore represents one fiber strand within a cable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CableCore {
    pub id: i64,
    pub cable_id: i64,
    pub core_index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tube_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_color: Option<String>,
    pub status: CoreStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// UpdateCableCoreRequest for manual color or state overrides
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCableCoreRequest {
    #[serde(default)]
    pub tube_color: Option<String>,
    #[serde(default)]
    pub core_color: Option<String>,
    #[serde(default)]
    pub status: Option<CoreStatus>,
}

impl UpdateCableCoreRequest {
    pub fn is_empty(&self) -> bool {
        self.tube_color.is_none() && self.core_color.is_none() && self.status.is_none()
    }
}
