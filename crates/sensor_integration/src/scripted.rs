//! Text-driven armband hub used by the console bridge and by tests.

use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use shared::domain::{Arm, DeviceId, OrientationSample, Pose};
use thiserror::Error;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{SensorEvent, SensorHub, UnlockType, VibrationType, EVENT_CAPACITY};

#[derive(Debug, Error, PartialEq)]
pub enum ScriptError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("'{command}' expects {expected}")]
    MissingArgument {
        command: String,
        expected: &'static str,
    },
    #[error("invalid arm '{0}', expected left or right")]
    InvalidArm(String),
    #[error("invalid pose '{0}'")]
    InvalidPose(String),
    #[error("invalid angle '{0}'")]
    InvalidAngle(String),
    #[error("no armband connected on the {0} arm")]
    NotConnected(&'static str),
    #[error("an armband is already connected on the {0} arm")]
    AlreadyConnected(&'static str),
    #[error("hub is not listening")]
    NotListening,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptCommand {
    Connect(Arm),
    Disconnect(Arm),
    Lock(Arm),
    Unlock(Arm),
    Pose(Arm, Pose),
    Orient(Arm, OrientationSample),
}

impl ScriptCommand {
    /// Parses one script line. Blank lines and `#` comments yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, ScriptError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let mut parts = line.split_whitespace();
        let command = parts.next().ok_or(ScriptError::Empty)?.to_ascii_lowercase();
        let arm = |raw: Option<&str>| -> Result<Arm, ScriptError> {
            let raw = raw.ok_or_else(|| ScriptError::MissingArgument {
                command: command.clone(),
                expected: "an arm",
            })?;
            parse_arm(raw)
        };

        let parsed = match command.as_str() {
            "connect" => Self::Connect(arm(parts.next())?),
            "disconnect" => Self::Disconnect(arm(parts.next())?),
            "lock" => Self::Lock(arm(parts.next())?),
            "unlock" => Self::Unlock(arm(parts.next())?),
            "pose" => {
                let arm = arm(parts.next())?;
                let raw = parts.next().ok_or_else(|| ScriptError::MissingArgument {
                    command: command.clone(),
                    expected: "a pose",
                })?;
                let pose = Pose::parse(raw).ok_or_else(|| ScriptError::InvalidPose(raw.into()))?;
                Self::Pose(arm, pose)
            }
            "orient" => {
                let arm = arm(parts.next())?;
                let mut angle = |expected: &'static str| -> Result<f32, ScriptError> {
                    let raw = parts.next().ok_or_else(|| ScriptError::MissingArgument {
                        command: command.clone(),
                        expected,
                    })?;
                    raw.parse::<f32>()
                        .map_err(|_| ScriptError::InvalidAngle(raw.into()))
                };
                let pitch = angle("pitch and roll in radians")?;
                let roll = angle("pitch and roll in radians")?;
                let yaw = match parts.next() {
                    Some(raw) => raw
                        .parse::<f32>()
                        .map_err(|_| ScriptError::InvalidAngle(raw.into()))?,
                    None => 0.0,
                };
                Self::Orient(arm, OrientationSample { pitch, roll, yaw })
            }
            other => return Err(ScriptError::UnknownCommand(other.to_string())),
        };

        Ok(Some(parsed))
    }
}

fn parse_arm(raw: &str) -> Result<Arm, ScriptError> {
    match raw.to_ascii_lowercase().as_str() {
        "left" | "l" => Ok(Arm::Left),
        "right" | "r" => Ok(Arm::Right),
        _ => Err(ScriptError::InvalidArm(raw.to_string())),
    }
}

#[derive(Default)]
struct HubState {
    listening: bool,
    next_device: u32,
    devices: HashMap<Arm, DeviceId>,
    subscribers: Vec<mpsc::Sender<SensorEvent>>,
    vibrations: Vec<(DeviceId, VibrationType)>,
    unlock_requests: Vec<(DeviceId, UnlockType)>,
    /// Deliveries parked on a full subscriber queue.
    pending: Vec<JoinHandle<()>>,
}

impl HubState {
    fn arm_of(&self, device: DeviceId) -> Option<Arm> {
        self.devices
            .iter()
            .find_map(|(arm, id)| (*id == device).then_some(*arm))
    }

    /// Emits an event raised by the hub itself. A full queue hands delivery to a
    /// background task so a subscriber calling back into the hub cannot block on itself.
    fn emit_detached(&mut self, event: SensorEvent) {
        self.pending.retain(|task| !task.is_finished());
        for subscriber in &self.subscribers {
            match subscriber.try_send(event) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(event)) => {
                    let subscriber = subscriber.clone();
                    self.pending.push(tokio::spawn(async move {
                        let _ = subscriber.send(event).await;
                    }));
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }

    fn device_on(&self, arm: Arm) -> Result<DeviceId, ScriptError> {
        self.devices
            .get(&arm)
            .copied()
            .ok_or(ScriptError::NotConnected(arm.as_str()))
    }
}

/// In-process hub that turns script commands into armband events.
#[derive(Default)]
pub struct ScriptedSensorHub {
    inner: Mutex<HubState>,
}

impl ScriptedSensorHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn feed_line(&self, line: &str) -> Result<(), ScriptError> {
        match ScriptCommand::parse(line)? {
            Some(command) => self.feed(command).await,
            None => Ok(()),
        }
    }

    pub async fn feed(&self, command: ScriptCommand) -> Result<(), ScriptError> {
        let (event, subscribers) = {
            let mut guard = self.inner.lock().await;
            if !guard.listening {
                return Err(ScriptError::NotListening);
            }

            let event = match command {
                ScriptCommand::Connect(arm) => {
                    if guard.devices.contains_key(&arm) {
                        return Err(ScriptError::AlreadyConnected(arm.as_str()));
                    }
                    guard.next_device += 1;
                    let device = DeviceId(guard.next_device);
                    guard.devices.insert(arm, device);
                    SensorEvent::Connected { device, arm }
                }
                ScriptCommand::Disconnect(arm) => {
                    let device = guard.device_on(arm)?;
                    guard.devices.remove(&arm);
                    SensorEvent::Disconnected { device, arm }
                }
                ScriptCommand::Lock(arm) => SensorEvent::Locked {
                    device: guard.device_on(arm)?,
                    arm,
                },
                ScriptCommand::Unlock(arm) => SensorEvent::Unlocked {
                    device: guard.device_on(arm)?,
                    arm,
                },
                ScriptCommand::Pose(arm, pose) => SensorEvent::PoseChanged {
                    device: guard.device_on(arm)?,
                    arm,
                    pose,
                },
                ScriptCommand::Orient(arm, sample) => SensorEvent::Orientation {
                    device: guard.device_on(arm)?,
                    arm,
                    sample,
                },
            };
            (event, guard.subscribers.clone())
        };

        debug!(?event, "sensor: scripted event");
        let mut closed = false;
        for subscriber in subscribers {
            closed |= subscriber.send(event).await.is_err();
        }
        if closed {
            self.prune_closed().await;
        }
        Ok(())
    }

    pub async fn vibrations(&self) -> Vec<(DeviceId, VibrationType)> {
        self.inner.lock().await.vibrations.clone()
    }

    pub async fn unlock_requests(&self) -> Vec<(DeviceId, UnlockType)> {
        self.inner.lock().await.unlock_requests.clone()
    }

    async fn prune_closed(&self) {
        self.inner
            .lock()
            .await
            .subscribers
            .retain(|subscriber| !subscriber.is_closed());
    }
}

#[async_trait]
impl SensorHub for ScriptedSensorHub {
    async fn start_listening(&self) -> anyhow::Result<()> {
        self.inner.lock().await.listening = true;
        info!("sensor: scripted hub listening");
        Ok(())
    }

    async fn subscribe(&self) -> mpsc::Receiver<SensorEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
        self.inner.lock().await.subscribers.push(tx);
        rx
    }

    async fn vibrate(&self, device: DeviceId, kind: VibrationType) -> anyhow::Result<()> {
        let mut guard = self.inner.lock().await;
        if guard.arm_of(device).is_none() {
            return Err(anyhow!("armband {} is not connected", device.0));
        }
        guard.vibrations.push((device, kind));
        debug!(device = device.0, ?kind, "sensor: vibrate");
        Ok(())
    }

    async fn unlock(&self, device: DeviceId, kind: UnlockType) -> anyhow::Result<()> {
        let mut guard = self.inner.lock().await;
        let Some(arm) = guard.arm_of(device) else {
            return Err(anyhow!("armband {} is not connected", device.0));
        };
        guard.unlock_requests.push((device, kind));
        debug!(device = device.0, arm = arm.as_str(), ?kind, "sensor: unlock");
        guard.emit_detached(SensorEvent::Unlocked { device, arm });
        Ok(())
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        let mut guard = self.inner.lock().await;
        if !guard.listening {
            warn!("sensor: shutdown requested on a hub that is not listening");
        }
        guard.listening = false;
        guard.subscribers.clear();
        for task in guard.pending.drain(..) {
            task.abort();
        }
        guard.devices.clear();
        info!("sensor: scripted hub released");
        Ok(())
    }
}
