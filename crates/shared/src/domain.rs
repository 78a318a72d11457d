use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);
    };
}

id_newtype!(DeviceId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arm {
    Left,
    Right,
    Unknown,
}

impl Arm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Unknown => "unknown",
        }
    }
}

/// Orientation angles in radians as reported by the armband.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrientationSample {
    pub pitch: f32,
    pub roll: f32,
    #[serde(default)]
    pub yaw: f32,
}

impl OrientationSample {
    pub fn new(pitch: f32, roll: f32) -> Self {
        Self {
            pitch,
            roll,
            yaw: 0.0,
        }
    }

    pub fn pitch_degrees(&self) -> f32 {
        self.pitch.to_degrees()
    }

    pub fn roll_degrees(&self) -> f32 {
        self.roll.to_degrees()
    }
}

/// Full pose vocabulary of the armband SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pose {
    Rest,
    Fist,
    WaveIn,
    WaveOut,
    FingersSpread,
    DoubleTap,
    Unknown,
}

impl Pose {
    /// Poses that drive the vehicle; everything else is ignored.
    pub fn as_gesture(&self) -> Option<Gesture> {
        match self {
            Self::Fist => Some(Gesture::Fist),
            Self::WaveIn => Some(Gesture::WaveIn),
            Self::WaveOut => Some(Gesture::WaveOut),
            Self::Rest | Self::FingersSpread | Self::DoubleTap | Self::Unknown => None,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "rest" => Some(Self::Rest),
            "fist" => Some(Self::Fist),
            "wave-in" | "wavein" => Some(Self::WaveIn),
            "wave-out" | "waveout" => Some(Self::WaveOut),
            "fingers-spread" | "fingersspread" => Some(Self::FingersSpread),
            "double-tap" | "doubletap" => Some(Self::DoubleTap),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Gesture {
    WaveIn,
    WaveOut,
    Fist,
}

impl Gesture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WaveIn => "wave-in",
            Self::WaveOut => "wave-out",
            Self::Fist => "fist",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureEvent {
    pub gesture: Gesture,
    pub arm: Arm,
}

impl GestureEvent {
    pub fn new(gesture: Gesture, arm: Arm) -> Self {
        Self { gesture, arm }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GearDirection {
    #[default]
    Neutral,
    Forward,
    Backward,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnSignal {
    #[default]
    Off,
    Left,
    Right,
}

/// Actuation commanded for one vehicle. Throttle and brake are never both nonzero
/// when produced by the mapper.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleCommandState {
    pub throttle: f32,
    pub brake: f32,
    pub steering: f32,
    pub gear: GearDirection,
    pub turn_signal: TurnSignal,
}

impl VehicleCommandState {
    /// Name of the first actuation field that is NaN or infinite.
    pub fn first_non_finite(&self) -> Option<(&'static str, f32)> {
        [
            ("throttle", self.throttle),
            ("brake", self.brake),
            ("steering", self.steering),
        ]
        .into_iter()
        .find(|(_, value)| !value.is_finite())
    }
}
