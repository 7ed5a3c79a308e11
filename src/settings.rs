//! Player settings service.
//!
//! Persists a flat JSON blob (`crimson_settings.json`) holding the music and
//! effects volumes plus the two visual toggles. Corrupt or missing data falls
//! back to defaults and is never propagated as an error. Interested parties
//! register change listeners on the store instead of polling a global.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use bevy::prelude::Resource;

/// Default on-disk location, relative to the cwd.
pub const SETTINGS_FILE: &str = "crimson_settings.json";

/// The persisted settings blob.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsData {
    /// Backing-loop volume, 0.0..=1.0.
    pub music_vol: f32,
    /// One-shot effects volume, 0.0..=1.0.
    pub sfx_vol: f32,
    /// Scanline overlay on the stage.
    pub crt_enabled: bool,
    /// Screen shake on hits.
    pub shake_enabled: bool,
}

impl Default for SettingsData {
    fn default() -> Self {
        Self {
            music_vol: 0.4,
            sfx_vol: 0.5,
            crt_enabled: true,
            shake_enabled: true,
        }
    }
}

/// Which setting a change notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Music,
    Sfx,
    Crt,
    Shake,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not write settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

type Listener = Box<dyn FnMut(SettingKind, &SettingsData) + Send + Sync>;

/// Owns the settings blob, its file, and the observer list.
#[derive(Resource)]
pub struct SettingsStore {
    path: PathBuf,
    data: SettingsData,
    listeners: Vec<Listener>,
}

impl SettingsStore {
    /// Load from `path`, resetting to defaults if the file is missing or
    /// corrupted.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(data) => data,
                Err(err) => {
                    log::warn!("settings corrupted ({err}), resetting to defaults");
                    SettingsData::default()
                }
            },
            Err(_) => SettingsData::default(),
        };
        Self {
            path,
            data,
            listeners: Vec::new(),
        }
    }

    /// Current settings snapshot.
    pub fn data(&self) -> SettingsData {
        self.data
    }

    /// Register a change listener. Fired once per setter call, after the
    /// value is persisted.
    pub fn on_change(
        &mut self,
        listener: impl FnMut(SettingKind, &SettingsData) + Send + Sync + 'static,
    ) {
        self.listeners.push(Box::new(listener));
    }

    pub fn set_music_vol(&mut self, vol: f32) {
        self.data.music_vol = vol.clamp(0.0, 1.0);
        self.commit(SettingKind::Music);
    }

    pub fn set_sfx_vol(&mut self, vol: f32) {
        self.data.sfx_vol = vol.clamp(0.0, 1.0);
        self.commit(SettingKind::Sfx);
    }

    pub fn set_crt_enabled(&mut self, on: bool) {
        self.data.crt_enabled = on;
        self.commit(SettingKind::Crt);
    }

    pub fn set_shake_enabled(&mut self, on: bool) {
        self.data.shake_enabled = on;
        self.commit(SettingKind::Shake);
    }

    fn commit(&mut self, kind: SettingKind) {
        if let Err(err) = self.save() {
            log::warn!("could not persist settings: {err}");
        }
        let data = self.data;
        for listener in &mut self.listeners {
            listener(kind, &data);
        }
    }

    fn save(&self) -> Result<(), SettingsError> {
        fs::write(&self.path, serde_json::to_string(&self.data)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("crimson_test_{name}_{}.json", std::process::id()))
    }

    #[test]
    fn missing_file_gives_defaults() {
        let store = SettingsStore::load(scratch_path("missing"));
        assert_eq!(store.data(), SettingsData::default());
    }

    #[test]
    fn corrupt_file_resets_to_defaults() {
        let path = scratch_path("corrupt");
        fs::write(&path, "{not json at all").unwrap();
        let store = SettingsStore::load(&path);
        assert_eq!(store.data(), SettingsData::default());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn setters_persist_and_reload() {
        let path = scratch_path("roundtrip");
        let mut store = SettingsStore::load(&path);
        store.set_music_vol(0.9);
        store.set_crt_enabled(false);

        let reloaded = SettingsStore::load(&path);
        assert_eq!(reloaded.data().music_vol, 0.9);
        assert!(!reloaded.data().crt_enabled);
        assert!(reloaded.data().shake_enabled);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn volumes_are_clamped() {
        let path = scratch_path("clamp");
        let mut store = SettingsStore::load(&path);
        store.set_sfx_vol(3.0);
        assert_eq!(store.data().sfx_vol, 1.0);
        store.set_sfx_vol(-1.0);
        assert_eq!(store.data().sfx_vol, 0.0);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn listeners_fire_once_per_change() {
        let path = scratch_path("listeners");
        let mut store = SettingsStore::load(&path);
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = Arc::clone(&hits);
        store.on_change(move |kind, data| {
            assert_eq!(kind, SettingKind::Sfx);
            assert_eq!(data.sfx_vol, 0.25);
            hits2.fetch_add(1, Ordering::SeqCst);
        });
        store.set_sfx_vol(0.25);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        fs::remove_file(&path).ok();
    }
}
