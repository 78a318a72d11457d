use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use bridge_core::{
    mapper::{DEFAULT_PITCH_FACTOR, DEFAULT_ROLL_FACTOR},
    MapperConfig, RangePolicy, ZeroPitchPolicy,
};
use serde::Deserialize;

pub const SETTINGS_FILE: &str = "bridge.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub remote_host: String,
    pub debug_mode: bool,
    pub pump_period_ms: u64,
    /// `None` waits for the vehicle indefinitely.
    pub connect_timeout_ms: Option<u64>,
    pub zero_pitch_policy: ZeroPitchPolicy,
    pub range_policy: RangePolicy,
    pub pitch_factor: f32,
    pub roll_factor: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remote_host: "localhost".into(),
            debug_mode: false,
            pump_period_ms: 20,
            connect_timeout_ms: Some(10_000),
            zero_pitch_policy: ZeroPitchPolicy::default(),
            range_policy: RangePolicy::default(),
            pitch_factor: DEFAULT_PITCH_FACTOR,
            roll_factor: DEFAULT_ROLL_FACTOR,
        }
    }
}

impl Settings {
    pub fn mapper_config(&self) -> MapperConfig {
        MapperConfig {
            pitch_factor: self.pitch_factor,
            roll_factor: self.roll_factor,
            zero_pitch: self.zero_pitch_policy,
            range: self.range_policy,
        }
    }

    pub fn pump_period(&self) -> Duration {
        Duration::from_millis(self.pump_period_ms)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// A timeout of `0` means wait forever.
    pub fn set_connect_timeout_ms(&mut self, ms: u64) {
        self.connect_timeout_ms = (ms > 0).then_some(ms);
    }

    pub fn log_filter(&self) -> &'static str {
        if self.debug_mode {
            "debug"
        } else {
            "info"
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    remote_host: Option<String>,
    debug_mode: Option<bool>,
    pump_period_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    zero_pitch_policy: Option<ZeroPitchPolicy>,
    range_policy: Option<RangePolicy>,
    pitch_factor: Option<f32>,
    roll_factor: Option<f32>,
}

/// Defaults, then the settings file, then the environment. An explicit `path`
/// must exist; the default `bridge.toml` is optional.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
            apply_toml(&mut settings, &raw)
                .with_context(|| format!("invalid settings file '{}'", path.display()))?;
        }
        None => {
            if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
                apply_toml(&mut settings, &raw)
                    .with_context(|| format!("invalid settings file '{SETTINGS_FILE}'"))?;
            }
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

pub fn apply_toml(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file: FileSettings = toml::from_str(raw)?;

    if let Some(v) = file.remote_host {
        settings.remote_host = v;
    }
    if let Some(v) = file.debug_mode {
        settings.debug_mode = v;
    }
    if let Some(v) = file.pump_period_ms {
        settings.pump_period_ms = v;
    }
    if let Some(v) = file.connect_timeout_ms {
        settings.set_connect_timeout_ms(v);
    }
    if let Some(v) = file.zero_pitch_policy {
        settings.zero_pitch_policy = v;
    }
    if let Some(v) = file.range_policy {
        settings.range_policy = v;
    }
    if let Some(v) = file.pitch_factor {
        settings.pitch_factor = v;
    }
    if let Some(v) = file.roll_factor {
        settings.roll_factor = v;
    }
    Ok(())
}

pub fn apply_env(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("REMOTE_HOST") {
        settings.remote_host = v;
    }
    if let Some(v) = lookup("APP__REMOTE_HOST") {
        settings.remote_host = v;
    }

    for key in ["DEBUG_MODE", "APP__DEBUG_MODE"] {
        if let Some(v) = lookup(key) {
            settings.debug_mode = parse_bool(&v).with_context(|| format!("{key}={v}"))?;
        }
    }

    if let Some(v) = lookup("APP__PUMP_PERIOD_MS") {
        settings.pump_period_ms = v
            .parse()
            .with_context(|| format!("APP__PUMP_PERIOD_MS={v}"))?;
    }
    if let Some(v) = lookup("APP__CONNECT_TIMEOUT_MS") {
        let ms = v
            .parse()
            .with_context(|| format!("APP__CONNECT_TIMEOUT_MS={v}"))?;
        settings.set_connect_timeout_ms(ms);
    }

    if let Some(v) = lookup("APP__ZERO_PITCH_POLICY") {
        settings.zero_pitch_policy = ZeroPitchPolicy::parse(&v)
            .with_context(|| format!("unknown zero pitch policy '{v}'"))?;
    }
    if let Some(v) = lookup("APP__RANGE_POLICY") {
        settings.range_policy =
            RangePolicy::parse(&v).with_context(|| format!("unknown range policy '{v}'"))?;
    }

    Ok(())
}

fn parse_bool(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{other}'"),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
