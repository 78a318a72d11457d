use async_trait::async_trait;
use shared::domain::{Arm, DeviceId, OrientationSample, Pose};
use tokio::sync::mpsc;

mod scripted;

pub use scripted::{ScriptCommand, ScriptError, ScriptedSensorHub};

/// Capacity of each subscriber queue. Senders wait when a queue is full.
pub const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VibrationType {
    Short,
    Medium,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockType {
    /// Unlock until the next pose, then relock.
    Timed,
    /// Stay unlocked until explicitly locked.
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorEvent {
    Connected {
        device: DeviceId,
        arm: Arm,
    },
    Disconnected {
        device: DeviceId,
        arm: Arm,
    },
    Locked {
        device: DeviceId,
        arm: Arm,
    },
    Unlocked {
        device: DeviceId,
        arm: Arm,
    },
    PoseChanged {
        device: DeviceId,
        arm: Arm,
        pose: Pose,
    },
    Orientation {
        device: DeviceId,
        arm: Arm,
        sample: OrientationSample,
    },
}

impl SensorEvent {
    pub fn device(&self) -> DeviceId {
        match self {
            Self::Connected { device, .. }
            | Self::Disconnected { device, .. }
            | Self::Locked { device, .. }
            | Self::Unlocked { device, .. }
            | Self::PoseChanged { device, .. }
            | Self::Orientation { device, .. } => *device,
        }
    }

    pub fn arm(&self) -> Arm {
        match self {
            Self::Connected { arm, .. }
            | Self::Disconnected { arm, .. }
            | Self::Locked { arm, .. }
            | Self::Unlocked { arm, .. }
            | Self::PoseChanged { arm, .. }
            | Self::Orientation { arm, .. } => *arm,
        }
    }
}

/// Session with an armband hub. Events are delivered to every subscriber without loss.
#[async_trait]
pub trait SensorHub: Send + Sync {
    async fn start_listening(&self) -> anyhow::Result<()>;
    async fn subscribe(&self) -> mpsc::Receiver<SensorEvent>;
    /// Best-effort haptic feedback.
    async fn vibrate(&self, device: DeviceId, kind: VibrationType) -> anyhow::Result<()>;
    async fn unlock(&self, device: DeviceId, kind: UnlockType) -> anyhow::Result<()>;
    async fn shutdown(&self) -> anyhow::Result<()>;
}

#[cfg(test)]
#[path = "tests/scripted_tests.rs"]
mod tests;
