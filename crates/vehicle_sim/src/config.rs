use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;
use shared::protocol::DEFAULT_VEHICLE_PORT;

pub const SETTINGS_FILE: &str = "vehicle_sim.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{DEFAULT_VEHICLE_PORT}"),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    apply_file(&mut settings, Path::new(SETTINGS_FILE));
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

/// Missing or unparsable files leave `settings` untouched.
pub fn apply_file(settings: &mut Settings, path: &Path) {
    if let Ok(raw) = fs::read_to_string(path) {
        apply_toml(settings, &raw);
    }
}

pub fn apply_toml(settings: &mut Settings, raw: &str) {
    if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) {
        if let Some(v) = file_cfg.get("bind_addr") {
            settings.bind_addr = v.clone();
        }
    }
}

pub fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("SIM_BIND") {
        settings.bind_addr = v;
    }
    if let Some(v) = lookup("APP__BIND_ADDR") {
        settings.bind_addr = v;
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
