//! Gameplay tunables.
//!
//! Read from `crimson.toml` in the cwd (override with `--config`); every
//! field has a default so the file is optional and may be partial. Balance
//! changes belong here, not in the engine constants.

use bevy::prelude::Resource;
use serde::Deserialize;
use std::fs;

#[derive(Debug, Deserialize, Clone, Copy, Resource)]
pub struct Config {
    /// Milliseconds between enemy spawns at match start. Shrinks by 20 per
    /// spawn down to the 500 ms floor.
    #[serde(default = "default_spawn_interval")]
    pub spawn_interval_start_ms: f32,
    /// Fall speed in px/s at match start. Grows by 0.8 per spawn.
    #[serde(default = "default_fall_speed")]
    pub fall_speed_start: f32,
    /// Match timer in seconds.
    #[serde(default = "default_timer")]
    pub timer_start: f32,
    /// Distance in px between the bottom of the stage and the kill line.
    #[serde(default = "default_danger_margin")]
    pub danger_margin: f32,
    /// Backing-loop tempo in beats per minute.
    #[serde(default = "default_tempo")]
    pub tempo_bpm: f32,
}

fn default_spawn_interval() -> f32 { 2000.0 }
fn default_fall_speed() -> f32 { 60.0 }
fn default_timer() -> f32 { 30.0 }
fn default_danger_margin() -> f32 { 80.0 }
fn default_tempo() -> f32 { 130.0 }

impl Default for Config {
    fn default() -> Self {
        Self {
            spawn_interval_start_ms: default_spawn_interval(),
            fall_speed_start: default_fall_speed(),
            timer_start: default_timer(),
            danger_margin: default_danger_margin(),
            tempo_bpm: default_tempo(),
        }
    }
}

impl Config {
    /// Load from a TOML file; fall back to defaults on any error.
    pub fn load(path: Option<&str>) -> Self {
        let p = path.unwrap_or("crimson.toml");
        match fs::read_to_string(p) {
            Ok(text) => match toml::from_str(&text) {
                Ok(config) => config,
                Err(err) => {
                    log::warn!("{p} is malformed ({err}), using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}
