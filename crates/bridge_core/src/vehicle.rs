use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex, PoisonError,
};

use async_trait::async_trait;
use chrono::Utc;
use shared::{
    domain::{GearDirection, TurnSignal, VehicleCommandState},
    protocol::{ConnectionState, VehicleStatus},
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Error)]
pub enum VehicleError {
    #[error("vehicle endpoint is not connected")]
    NotConnected,
    #[error("vehicle transport failed: {0}")]
    Transport(String),
    #[error("vehicle rejected update: {0}")]
    Rejected(String),
}

/// Client side of a simulated vehicle.
///
/// Setters stage values locally; nothing reaches the vehicle until [`update`](Self::update).
#[async_trait]
pub trait VehicleEndpoint: Send + Sync {
    fn subscribe_connection(&self) -> watch::Receiver<ConnectionState>;

    fn connection_state(&self) -> ConnectionState {
        let connection = self.subscribe_connection();
        let state = *connection.borrow();
        state
    }

    fn set_throttle(&self, value: f32);
    fn set_brake(&self, value: f32);
    fn set_steering_angle(&self, value: f32);
    fn set_gear(&self, gear: GearDirection);
    fn set_turn_signal(&self, signal: TurnSignal);

    /// Pushes the staged actuation state. Idempotent.
    async fn update(&self) -> Result<(), VehicleError>;

    async fn status(&self) -> Result<VehicleStatus, VehicleError>;

    async fn apply(&self, state: &VehicleCommandState) -> Result<(), VehicleError> {
        self.set_throttle(state.throttle);
        self.set_brake(state.brake);
        self.set_steering_angle(state.steering);
        self.set_gear(state.gear);
        self.set_turn_signal(state.turn_signal);
        self.update().await
    }
}

/// Locally staged actuation awaiting the next push.
#[derive(Debug, Default)]
pub struct StagedControls {
    staged: Mutex<VehicleCommandState>,
}

impl StagedControls {
    pub fn modify(&self, f: impl FnOnce(&mut VehicleCommandState)) {
        let mut guard = self.staged.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }

    pub fn snapshot(&self) -> VehicleCommandState {
        *self.staged.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Vehicle stand-in for dry runs: always connected, pushes are only logged.
pub struct DetachedVehicle {
    staged: StagedControls,
    connection: watch::Sender<ConnectionState>,
    updates: AtomicU64,
    last_update_at: Mutex<Option<chrono::DateTime<Utc>>>,
}

impl DetachedVehicle {
    pub fn new() -> Self {
        let (connection, _) = watch::channel(ConnectionState::Connected);
        Self {
            staged: StagedControls::default(),
            connection,
            updates: AtomicU64::new(0),
            last_update_at: Mutex::new(None),
        }
    }

    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }
}

impl Default for DetachedVehicle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VehicleEndpoint for DetachedVehicle {
    fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    fn set_throttle(&self, value: f32) {
        self.staged.modify(|s| s.throttle = value);
    }

    fn set_brake(&self, value: f32) {
        self.staged.modify(|s| s.brake = value);
    }

    fn set_steering_angle(&self, value: f32) {
        self.staged.modify(|s| s.steering = value);
    }

    fn set_gear(&self, gear: GearDirection) {
        self.staged.modify(|s| s.gear = gear);
    }

    fn set_turn_signal(&self, signal: TurnSignal) {
        self.staged.modify(|s| s.turn_signal = signal);
    }

    async fn update(&self) -> Result<(), VehicleError> {
        let state = self.staged.snapshot();
        let count = self.updates.fetch_add(1, Ordering::Relaxed) + 1;
        *self
            .last_update_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        debug!(
            count,
            throttle = state.throttle,
            brake = state.brake,
            steering = state.steering,
            gear = ?state.gear,
            turn_signal = ?state.turn_signal,
            "vehicle: detached push"
        );
        Ok(())
    }

    async fn status(&self) -> Result<VehicleStatus, VehicleError> {
        Ok(VehicleStatus {
            state: self.staged.snapshot(),
            updates_received: self.updates(),
            last_update_at: *self
                .last_update_at
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        })
    }
}

#[cfg(test)]
#[path = "tests/vehicle_tests.rs"]
mod tests;
