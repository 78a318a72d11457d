use std::{collections::HashMap, sync::Arc};

use sensor_integration::{SensorEvent, SensorHub, UnlockType, VibrationType};
use shared::domain::{Arm, DeviceId, GestureEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::session::CommandSession;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub orientation_applied: u64,
    pub orientation_ignored: u64,
    pub gestures_applied: u64,
    pub poses_ignored: u64,
    pub unlock_requests: u64,
}

/// Routes armband events into the command session.
///
/// Orientation is only forwarded for devices that reported `Unlocked` and have
/// not disconnected since. A locked device is asked to unlock and hold.
pub struct SensorDispatcher {
    session: CommandSession,
    hub: Arc<dyn SensorHub>,
    attached: HashMap<DeviceId, Arm>,
    stats: DispatchStats,
}

impl SensorDispatcher {
    pub fn new(session: CommandSession, hub: Arc<dyn SensorHub>) -> Self {
        Self {
            session,
            hub,
            attached: HashMap::new(),
            stats: DispatchStats::default(),
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn is_attached(&self, device: DeviceId) -> bool {
        self.attached.contains_key(&device)
    }

    pub async fn run(mut self, mut events: mpsc::Receiver<SensorEvent>) -> DispatchStats {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        info!(stats = ?self.stats, "dispatch: sensor stream closed");
        self.stats
    }

    pub async fn handle(&mut self, event: SensorEvent) {
        match event {
            SensorEvent::Connected { device, arm } => {
                info!(device = device.0, arm = arm.as_str(), "dispatch: armband connected");
                if let Err(err) = self.hub.vibrate(device, VibrationType::Short).await {
                    debug!(device = device.0, %err, "dispatch: vibrate failed");
                }
            }
            SensorEvent::Disconnected { device, arm } => {
                self.attached.remove(&device);
                info!(device = device.0, arm = arm.as_str(), "dispatch: armband disconnected");
            }
            SensorEvent::Locked { device, arm } => {
                debug!(device = device.0, arm = arm.as_str(), "dispatch: armband locked");
                self.stats.unlock_requests += 1;
                if let Err(err) = self.hub.unlock(device, UnlockType::Hold).await {
                    warn!(device = device.0, %err, "dispatch: unlock request failed");
                }
            }
            SensorEvent::Unlocked { device, arm } => {
                if self.attached.insert(device, arm).is_none() {
                    debug!(
                        device = device.0,
                        arm = arm.as_str(),
                        "dispatch: orientation stream attached"
                    );
                }
            }
            SensorEvent::Orientation {
                device,
                arm,
                sample,
            } => {
                if !self.attached.contains_key(&device) {
                    self.stats.orientation_ignored += 1;
                    return;
                }
                self.session.handle_orientation(sample, arm).await;
                self.stats.orientation_applied += 1;
            }
            SensorEvent::PoseChanged { device, arm, pose } => match pose.as_gesture() {
                Some(gesture) => {
                    self.session
                        .handle_gesture(GestureEvent::new(gesture, arm))
                        .await;
                    self.stats.gestures_applied += 1;
                }
                None => {
                    debug!(device = device.0, arm = arm.as_str(), ?pose, "dispatch: pose ignored");
                    self.stats.poses_ignored += 1;
                }
            },
        }
    }
}

#[cfg(test)]
#[path = "tests/dispatch_tests.rs"]
mod tests;
