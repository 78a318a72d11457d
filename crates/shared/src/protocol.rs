use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{domain::VehicleCommandState, error::ApiError};

pub const HEALTHZ_ROUTE: &str = "/healthz";
pub const VEHICLE_STATUS_ROUTE: &str = "/vehicle/status";
pub const VEHICLE_UPDATE_ROUTE: &str = "/vehicle/update";
pub const VEHICLE_EVENTS_ROUTE: &str = "/ws";

/// Port the simulator listens on when a host identifier carries none.
pub const DEFAULT_VEHICLE_PORT: u16 = 8470;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    AttemptingConnect,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleStatus {
    pub state: VehicleCommandState,
    pub updates_received: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAccepted {
    pub updates_received: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum VehicleEvent {
    StateApplied {
        state: VehicleCommandState,
        updates_received: u64,
        applied_at: DateTime<Utc>,
    },
    Error(ApiError),
}
