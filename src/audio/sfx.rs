//! One-shot sound effects.
//!
//! Every effect is a short finite [`rodio::Source`] played on a detached
//! sink: the sink frees itself once the source runs dry, so callers fire and
//! forget. With no output device every call returns silently.

use std::f32::consts::TAU;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use atomic_float::AtomicF32;
use rodio::{OutputStreamHandle, Sink, Source};

const SAMPLE_RATE: u32 = 44_100;
/// Exponential decays aim here instead of zero (a true zero never arrives).
const ENV_FLOOR: f32 = 0.01;

#[derive(Debug, Clone, Copy)]
enum Waveform {
    Sine,
    Square,
    Sawtooth,
}

#[inline]
fn wave_sample(wave: Waveform, phase: f32) -> f32 {
    match wave {
        Waveform::Sine => (phase * TAU).sin(),
        Waveform::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        Waveform::Sawtooth => 2.0 * phase - 1.0,
    }
}

/// Fixed-pitch tone with an exponential volume decay.
struct Tone {
    wave: Waveform,
    freq: f32,
    peak: f32,
    total: usize,
    generated: usize,
    phase: f32,
    volume: Arc<AtomicF32>,
}

impl Tone {
    fn new(wave: Waveform, freq: f32, duration: f32, peak: f32, volume: Arc<AtomicF32>) -> Self {
        Self {
            wave,
            freq,
            peak,
            total: (duration * SAMPLE_RATE as f32) as usize,
            generated: 0,
            phase: 0.0,
            volume,
        }
    }
}

impl Iterator for Tone {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.generated >= self.total {
            return None;
        }
        let frac = self.generated as f32 / self.total as f32;
        let env = self.peak * (ENV_FLOOR / self.peak).powf(frac);
        let sample = wave_sample(self.wave, self.phase) * env;
        self.phase += self.freq / SAMPLE_RATE as f32;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        self.generated += 1;
        Some(sample * self.volume.load(Ordering::Relaxed))
    }
}

impl Source for Tone {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total - self.generated)
    }
    fn channels(&self) -> u16 {
        1
    }
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total as f32 / SAMPLE_RATE as f32,
        ))
    }
}

/// The laser: a square wave sweeping 600 → 100 Hz with a linear fade-out.
struct ShotSweep {
    total: usize,
    generated: usize,
    phase: f32,
    volume: Arc<AtomicF32>,
}

impl ShotSweep {
    const DURATION: f32 = 0.3;
    const FREQ_START: f32 = 600.0;
    const FREQ_END: f32 = 100.0;
    const PEAK: f32 = 0.3;

    fn new(volume: Arc<AtomicF32>) -> Self {
        Self {
            total: (Self::DURATION * SAMPLE_RATE as f32) as usize,
            generated: 0,
            phase: 0.0,
            volume,
        }
    }
}

impl Iterator for ShotSweep {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.generated >= self.total {
            return None;
        }
        let frac = self.generated as f32 / self.total as f32;
        let freq = Self::FREQ_START * (Self::FREQ_END / Self::FREQ_START).powf(frac);
        let env = Self::PEAK * (1.0 - frac);
        let sample = wave_sample(Waveform::Square, self.phase) * env;
        self.phase += freq / SAMPLE_RATE as f32;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        self.generated += 1;
        Some(sample * self.volume.load(Ordering::Relaxed))
    }
}

impl Source for ShotSweep {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total - self.generated)
    }
    fn channels(&self) -> u16 {
        1
    }
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total as f32 / SAMPLE_RATE as f32,
        ))
    }
}

/// Fire-and-forget effects engine.
pub struct SfxEngine {
    handle: Option<OutputStreamHandle>,
    volume: Arc<AtomicF32>,
}

impl SfxEngine {
    pub fn new(handle: Option<OutputStreamHandle>, volume: f32) -> Self {
        Self {
            handle,
            volume: Arc::new(AtomicF32::new(volume)),
        }
    }

    /// Shared volume cell; stores apply to effects already playing.
    pub fn volume_handle(&self) -> Arc<AtomicF32> {
        Arc::clone(&self.volume)
    }

    /// Per-character feedback: a short sine blip with a random pitch inside
    /// a 200 Hz band so fast typing doesn't sound like a single held tone.
    pub fn play_keystroke(&self) {
        let freq = 800.0 + rand::random::<f32>() * 200.0;
        self.play(Tone::new(
            Waveform::Sine,
            freq,
            0.05,
            0.2,
            Arc::clone(&self.volume),
        ));
    }

    /// Wrong word: two stacked low sawtooth tones.
    pub fn play_miss(&self) {
        self.play(Tone::new(
            Waveform::Sawtooth,
            150.0,
            0.3,
            0.3,
            Arc::clone(&self.volume),
        ));
        self.play(Tone::new(
            Waveform::Sawtooth,
            100.0,
            0.3,
            0.3,
            Arc::clone(&self.volume),
        ));
    }

    /// Descending zap synchronized with the laser visual.
    pub fn play_shot_fired(&self) {
        self.play(ShotSweep::new(Arc::clone(&self.volume)));
    }

    /// Low square burst synchronized with the explosion visual.
    pub fn play_destroy(&self) {
        self.play(Tone::new(
            Waveform::Square,
            100.0,
            0.3,
            0.5,
            Arc::clone(&self.volume),
        ));
    }

    fn play(&self, source: impl Source<Item = f32> + Send + 'static) {
        let Some(handle) = &self.handle else {
            return;
        };
        if let Ok(sink) = Sink::try_new(handle) {
            sink.append(source);
            sink.detach();
        }
    }
}

// ---------- tests ----------
#[cfg(test)]
mod tests {
    use super::*;

    fn unit_volume() -> Arc<AtomicF32> {
        Arc::new(AtomicF32::new(1.0))
    }

    #[test]
    fn tone_runs_for_its_duration_then_ends() {
        let samples: Vec<f32> =
            Tone::new(Waveform::Square, 100.0, 0.3, 0.5, unit_volume()).collect();
        assert_eq!(samples.len(), (0.3 * 44_100.0) as usize);
    }

    #[test]
    fn tone_envelope_decays_toward_the_floor() {
        let samples: Vec<f32> =
            Tone::new(Waveform::Square, 100.0, 0.3, 0.5, unit_volume()).collect();
        // Square wave: |sample| equals the envelope exactly.
        assert!((samples[0].abs() - 0.5).abs() < 1e-4);
        let tail = samples.len() - 10;
        assert!(samples[tail..].iter().all(|s| s.abs() < 0.011));
        assert!(samples.iter().all(|s| s.abs() <= 0.5));
    }

    #[test]
    fn shot_sweep_fades_linearly_to_silence() {
        let samples: Vec<f32> = ShotSweep::new(unit_volume()).collect();
        assert_eq!(samples.len(), (0.3 * 44_100.0) as usize);
        assert!((samples[0].abs() - 0.3).abs() < 1e-4);
        assert!(samples.last().unwrap().abs() < 1e-3);
    }

    #[test]
    fn volume_cell_scales_playback_live() {
        let volume = unit_volume();
        let mut tone = Tone::new(Waveform::Square, 100.0, 0.1, 0.5, Arc::clone(&volume));
        let loud = tone.next().unwrap().abs();
        volume.store(0.0, Ordering::Relaxed);
        let muted = tone.next().unwrap().abs();
        assert!(loud > 0.0);
        assert_eq!(muted, 0.0);
    }

    #[test]
    fn engine_without_device_is_silent_and_safe() {
        let sfx = SfxEngine::new(None, 0.5);
        sfx.play_keystroke();
        sfx.play_miss();
        sfx.play_shot_fired();
        sfx.play_destroy();
    }
}
