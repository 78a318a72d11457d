use std::sync::Arc;

use shared::domain::{Arm, GestureEvent, OrientationSample, VehicleCommandState};
use tokio::sync::Mutex;
use tracing::info;

use crate::mapper::ActuationMapper;

/// Owns the commanded state of one vehicle. Clones share the same state.
///
/// Every mapper update and every snapshot runs inside the same lock, so the pump
/// never observes a half-applied update.
#[derive(Clone)]
pub struct CommandSession {
    state: Arc<Mutex<VehicleCommandState>>,
    mapper: ActuationMapper,
}

impl CommandSession {
    pub fn new(mapper: ActuationMapper) -> Self {
        Self::with_state(mapper, VehicleCommandState::default())
    }

    pub fn with_state(mapper: ActuationMapper, initial: VehicleCommandState) -> Self {
        Self {
            state: Arc::new(Mutex::new(initial)),
            mapper,
        }
    }

    pub fn mapper(&self) -> &ActuationMapper {
        &self.mapper
    }

    pub async fn snapshot(&self) -> VehicleCommandState {
        *self.state.lock().await
    }

    pub async fn handle_orientation(
        &self,
        sample: OrientationSample,
        arm: Arm,
    ) -> VehicleCommandState {
        let mut guard = self.state.lock().await;
        *guard = self.mapper.on_orientation(*guard, sample, arm);
        *guard
    }

    pub async fn handle_gesture(&self, event: GestureEvent) -> VehicleCommandState {
        let (previous, next) = {
            let mut guard = self.state.lock().await;
            let previous = *guard;
            *guard = self.mapper.on_gesture(previous, event);
            (previous, *guard)
        };

        if previous.gear != next.gear {
            info!(
                gesture = event.gesture.as_str(),
                arm = event.arm.as_str(),
                from = ?previous.gear,
                to = ?next.gear,
                "session: gear changed"
            );
        }
        if previous.turn_signal != next.turn_signal {
            info!(
                arm = event.arm.as_str(),
                from = ?previous.turn_signal,
                to = ?next.turn_signal,
                "session: turn signal toggled"
            );
        }

        next
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
