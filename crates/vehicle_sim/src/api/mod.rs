use std::sync::Arc;

use chrono::Utc;
use shared::{
    domain::{GearDirection, VehicleCommandState},
    error::{ApiError, RangeError},
    protocol::{VehicleEvent, VehicleStatus},
};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Simulated vehicle. Holds the last applied actuation state.
#[derive(Clone)]
pub struct SimVehicle {
    status: Arc<RwLock<VehicleStatus>>,
}

impl Default for SimVehicle {
    fn default() -> Self {
        Self::new()
    }
}

impl SimVehicle {
    /// Gear reads `Unknown` until the first update arrives.
    pub fn new() -> Self {
        Self {
            status: Arc::new(RwLock::new(VehicleStatus {
                state: VehicleCommandState {
                    gear: GearDirection::Unknown,
                    ..VehicleCommandState::default()
                },
                updates_received: 0,
                last_update_at: None,
            })),
        }
    }

    pub async fn status(&self) -> VehicleStatus {
        self.status.read().await.clone()
    }

    pub async fn apply_update(&self, update: VehicleCommandState) -> Result<VehicleEvent, ApiError> {
        validate_update(&update)?;

        let mut guard = self.status.write().await;
        let previous = guard.state;
        let now = Utc::now();
        guard.state = update;
        guard.updates_received += 1;
        guard.last_update_at = Some(now);

        if previous.gear != update.gear {
            info!(from = ?previous.gear, to = ?update.gear, "sim: gear engaged");
        }
        if previous.turn_signal != update.turn_signal {
            info!(
                from = ?previous.turn_signal,
                to = ?update.turn_signal,
                "sim: turn signal"
            );
        }
        debug!(
            throttle = update.throttle,
            brake = update.brake,
            steering = update.steering,
            count = guard.updates_received,
            "sim: update applied"
        );

        Ok(VehicleEvent::StateApplied {
            state: update,
            updates_received: guard.updates_received,
            applied_at: now,
        })
    }
}

pub fn validate_update(update: &VehicleCommandState) -> Result<(), RangeError> {
    match update.first_non_finite() {
        Some((field, value)) => Err(RangeError { field, value }),
        None => Ok(()),
    }
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
