//! Gesture and orientation to actuation mapping.
//!
//! Every handler is a pure function of the current [`VehicleCommandState`] and one
//! input. The right arm's pitch drives throttle and brake, the left arm's roll
//! drives steering, wave gestures step the gear and a fist toggles the turn
//! signal on the side of the arm that made it.

use serde::Deserialize;
use shared::domain::{
    Arm, GearDirection, Gesture, GestureEvent, OrientationSample, TurnSignal, VehicleCommandState,
};
use tracing::debug;

pub const DEFAULT_PITCH_FACTOR: f32 = 0.7;
pub const DEFAULT_ROLL_FACTOR: f32 = 0.65;

/// What a right-arm sample with exactly zero pitch does to throttle and brake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroPitchPolicy {
    /// Keep both at their previous values.
    #[default]
    Hold,
    /// Zero both.
    Release,
}

impl ZeroPitchPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hold" => Some(Self::Hold),
            "release" => Some(Self::Release),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePolicy {
    /// Scaled values are written as computed, even past the nominal range.
    #[default]
    Passthrough,
    /// Throttle and brake are clamped to [0, 1], steering to [-1, 1].
    Clamp,
}

impl RangePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "passthrough" => Some(Self::Passthrough),
            "clamp" => Some(Self::Clamp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapperConfig {
    pub pitch_factor: f32,
    pub roll_factor: f32,
    pub zero_pitch: ZeroPitchPolicy,
    pub range: RangePolicy,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            pitch_factor: DEFAULT_PITCH_FACTOR,
            roll_factor: DEFAULT_ROLL_FACTOR,
            zero_pitch: ZeroPitchPolicy::default(),
            range: RangePolicy::default(),
        }
    }
}

/// `(factor * degrees) / 100`, the percentage scaling applied to both axes.
pub fn scale_degrees(degrees: f32, factor: f32) -> f32 {
    (factor * degrees) / 100.0
}

/// Gear after a wave gesture. `Unknown` steps like `Neutral` and is never produced.
pub fn next_gear(current: GearDirection, gesture: Gesture) -> GearDirection {
    match (gesture, current) {
        (Gesture::WaveIn, GearDirection::Neutral | GearDirection::Unknown) => GearDirection::Forward,
        (Gesture::WaveIn, GearDirection::Backward) => GearDirection::Neutral,
        (Gesture::WaveOut, GearDirection::Neutral | GearDirection::Unknown) => {
            GearDirection::Backward
        }
        (Gesture::WaveOut, GearDirection::Forward) => GearDirection::Neutral,
        (_, current) => current,
    }
}

/// Signal after a fist on `arm`: `Off` turns on that side, anything else turns off.
pub fn toggle_turn_signal(current: TurnSignal, arm: Arm) -> TurnSignal {
    let side = match arm {
        Arm::Left => TurnSignal::Left,
        Arm::Right => TurnSignal::Right,
        Arm::Unknown => return current,
    };
    if current == TurnSignal::Off {
        side
    } else {
        TurnSignal::Off
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ActuationMapper {
    config: MapperConfig,
}

impl ActuationMapper {
    pub fn new(config: MapperConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn on_orientation(
        &self,
        state: VehicleCommandState,
        sample: OrientationSample,
        arm: Arm,
    ) -> VehicleCommandState {
        match arm {
            Arm::Right => self.apply_pitch(state, sample.pitch),
            Arm::Left => self.apply_roll(state, sample.roll),
            Arm::Unknown => state,
        }
    }

    pub fn on_gesture(
        &self,
        state: VehicleCommandState,
        event: GestureEvent,
    ) -> VehicleCommandState {
        let mut next = state;
        match event.gesture {
            Gesture::WaveIn | Gesture::WaveOut => {
                next.gear = next_gear(state.gear, event.gesture);
            }
            Gesture::Fist => {
                next.turn_signal = toggle_turn_signal(state.turn_signal, event.arm);
            }
        }
        next
    }

    fn apply_pitch(&self, state: VehicleCommandState, pitch: f32) -> VehicleCommandState {
        let pitch_deg = pitch.to_degrees();
        let magnitude = scale_degrees(pitch_deg.abs(), self.config.pitch_factor);
        if !magnitude.is_finite() {
            debug!(pitch, "mapper: ignoring pitch without a finite actuation");
            return state;
        }

        let mut next = state;
        if pitch_deg > 0.0 {
            next.throttle = self.unit(magnitude);
            next.brake = 0.0;
        } else if pitch_deg < 0.0 {
            next.brake = self.unit(magnitude);
            next.throttle = 0.0;
        } else if self.config.zero_pitch == ZeroPitchPolicy::Release {
            next.throttle = 0.0;
            next.brake = 0.0;
        }
        next
    }

    fn apply_roll(&self, state: VehicleCommandState, roll: f32) -> VehicleCommandState {
        let steering = -scale_degrees(roll.to_degrees(), self.config.roll_factor);
        if !steering.is_finite() {
            debug!(roll, "mapper: ignoring roll without a finite actuation");
            return state;
        }

        VehicleCommandState {
            steering: match self.config.range {
                RangePolicy::Passthrough => steering,
                RangePolicy::Clamp => steering.clamp(-1.0, 1.0),
            },
            ..state
        }
    }

    fn unit(&self, value: f32) -> f32 {
        match self.config.range {
            RangePolicy::Passthrough => value,
            RangePolicy::Clamp => value.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
#[path = "tests/mapper_tests.rs"]
mod tests;
