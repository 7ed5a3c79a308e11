//! Procedural audio: one-shot effects and the sequenced backing loop.
//!
//! The subsystem has exactly one expected failure mode — no output device —
//! and it is caught once, here. Everything downstream then degrades to a
//! silent no-op and the game is otherwise unaffected.

pub mod music;
pub mod sfx;

pub use music::MusicSequencer;
pub use sfx::SfxEngine;

use std::sync::atomic::Ordering;

use rodio::{OutputStream, OutputStreamHandle};

use crate::settings::{SettingKind, SettingsStore};

/// Owns the output stream plus both engines. Lives as a Bevy `NonSend`
/// resource because `OutputStream` is not `Send`.
pub struct AudioBus {
    _stream: Option<OutputStream>,
    pub sfx: SfxEngine,
    pub music: MusicSequencer,
}

impl AudioBus {
    /// Open the default output device and wire both engines to the settings
    /// store. Construction never fails; without a device the bus is inert.
    pub fn new(settings: &mut SettingsStore, tempo_bpm: f32, seed: Option<u64>) -> Self {
        let (stream, handle): (Option<OutputStream>, Option<OutputStreamHandle>) =
            match OutputStream::try_default() {
                Ok((stream, handle)) => (Some(stream), Some(handle)),
                Err(err) => {
                    log::warn!("no audio device ({err}); running silent");
                    (None, None)
                }
            };

        let data = settings.data();
        let sfx = SfxEngine::new(handle.clone(), data.sfx_vol);
        let music = MusicSequencer::new(handle.as_ref(), tempo_bpm, data.music_vol, seed);

        // Live volume hookup: the store notifies, the engines read their
        // shared cells. Effects volume steps; the music mixer ramps toward
        // its target so a slider drag never clicks.
        let sfx_vol = sfx.volume_handle();
        let music_vol = music.volume_handle();
        settings.on_change(move |kind, data| match kind {
            SettingKind::Sfx => sfx_vol.store(data.sfx_vol, Ordering::Relaxed),
            SettingKind::Music => music_vol.store(data.music_vol, Ordering::Relaxed),
            SettingKind::Crt | SettingKind::Shake => {}
        });

        Self {
            _stream: stream,
            sfx,
            music,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsStore;

    #[test]
    fn settings_changes_reach_the_volume_cells() {
        let path = std::env::temp_dir().join(format!(
            "crimson_test_audiobus_{}.json",
            std::process::id()
        ));
        let mut settings = SettingsStore::load(&path);
        // Device may or may not exist in CI; the bus must construct either way.
        let bus = AudioBus::new(&mut settings, 130.0, Some(1));

        settings.set_sfx_vol(0.1);
        settings.set_music_vol(0.2);
        assert_eq!(bus.sfx.volume_handle().load(Ordering::Relaxed), 0.1);
        assert_eq!(bus.music.volume_handle().load(Ordering::Relaxed), 0.2);
        std::fs::remove_file(&path).ok();
    }
}
