use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;
use shared::{
    domain::{GearDirection, TurnSignal, VehicleCommandState},
    protocol::{ConnectionState, VehicleStatus},
};
use tokio::sync::watch;

use crate::vehicle::{StagedControls, VehicleEndpoint, VehicleError};

/// Vehicle double that records every push.
pub(crate) struct RecordingVehicle {
    staged: StagedControls,
    connection: watch::Sender<ConnectionState>,
    pushes: Mutex<Vec<VehicleCommandState>>,
    fail: AtomicBool,
}

impl RecordingVehicle {
    pub(crate) fn new(initial: ConnectionState) -> Self {
        let (connection, _) = watch::channel(initial);
        Self {
            staged: StagedControls::default(),
            connection,
            pushes: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub(crate) fn connected() -> Self {
        Self::new(ConnectionState::Connected)
    }

    pub(crate) fn set_connection(&self, state: ConnectionState) {
        self.connection.send_replace(state);
    }

    pub(crate) fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn pushes(&self) -> Vec<VehicleCommandState> {
        self.pushes.lock().expect("pushes").clone()
    }
}

#[async_trait]
impl VehicleEndpoint for RecordingVehicle {
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
        if self.fail.load(Ordering::SeqCst) {
            return Err(VehicleError::Transport("simulated outage".into()));
        }
        self.pushes
            .lock()
            .expect("pushes")
            .push(self.staged.snapshot());
        Ok(())
    }

    async fn status(&self) -> Result<VehicleStatus, VehicleError> {
        let pushes = self.pushes.lock().expect("pushes");
        Ok(VehicleStatus {
            state: pushes.last().copied().unwrap_or_default(),
            updates_received: pushes.len() as u64,
            last_update_at: None,
        })
    }
}
