//! crimsondefense — typing-defense arcade core.
//!
//! Words fall toward the kill line; type the exact word and fire to destroy
//! the most dangerous copy of it before the system is breached. The library
//! holds everything testable headless: the match engine (timer, spawns,
//! combo/accuracy scoring), the procedural synthesizer and the lookahead
//! music sequencer, plus config and persisted settings. `src/main.rs` is the
//! thin Bevy shell that feeds keystrokes in and renders engine state out.
//!
//! # Example
//! ```
//! use crimsondefense::{Config, MatchEngine, Phase};
//! let mut engine = MatchEngine::new(Config::default());
//! engine.start_match();
//! engine.update(0.016);
//! assert_eq!(engine.phase, Phase::Playing);
//! ```

pub mod audio;
pub mod config;
pub mod match_engine;
pub mod settings;
pub mod stage;
pub mod start_screen;
pub mod story;
pub mod ui;
pub mod words;

// Main exports
pub use audio::{AudioBus, MusicSequencer, SfxEngine};
pub use config::Config;
pub use match_engine::{Enemy, GameOverReason, MatchEngine, MatchEvent, Phase};
pub use settings::{SettingKind, SettingsData, SettingsStore, SETTINGS_FILE};
pub use start_screen::AppState;
pub use ui::UiState;
