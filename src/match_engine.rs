//! Match engine — the playable core.
//!
//! Owns the match timer, spawn cadence, enemy collection, input buffer and
//! combo/accuracy scoring. All APIs are safe no-ops outside the phase they
//! apply to, because the shell calls them opportunistically every frame.
//! The engine never touches audio or rendering directly; it queues
//! [`MatchEvent`]s that the shell drains once per frame and routes to the
//! synthesizer and the stage.

use bevy::prelude::Resource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::Config;
use crate::words;

/// Vertical spawn position, in px above the stage top.
const SPAWN_Y: f32 = -50.0;
/// How much the spawn interval shrinks per spawn, in ms.
const SPAWN_ACCEL_MS: f32 = 20.0;
/// Hard floor for the spawn interval, in ms.
const SPAWN_INTERVAL_FLOOR_MS: f32 = 500.0;
/// Fall speed gain per spawn, in px/s.
const FALL_ACCEL: f32 = 0.8;
/// Timer penalty for a missed shot, in seconds.
const MISS_PENALTY_SECS: f32 = 3.0;
/// Per-letter timer bonus for a hit, capped at [`TIME_BONUS_CAP_SECS`].
const TIME_BONUS_PER_LETTER: f32 = 0.4;
const TIME_BONUS_CAP_SECS: f32 = 5.0;

/// Phase of the current match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Playing,
    Paused,
    GameOver,
}

/// Why the match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOverReason {
    TimeExpired,
    Breach,
}

impl GameOverReason {
    /// Status-line message for the game-over banner.
    pub fn message(self) -> &'static str {
        match self {
            GameOverReason::TimeExpired => "TIME EXPIRED",
            GameOverReason::Breach => "SYSTEM BREACHED",
        }
    }
}

/// A falling word.
#[derive(Debug, Clone)]
pub struct Enemy {
    /// Stable key the stage uses to pair entities with engine state.
    pub id: u64,
    pub word: &'static str,
    /// Spawn column as a fraction of stage width (0.10..0.90).
    pub x_frac: f32,
    /// Pixels from stage top; grows toward the kill line.
    pub y: f32,
    /// UI hint: the current input is a prefix of this word. Never scored.
    pub locked: bool,
}

/// Discrete things that happened during an engine call, for the shell to
/// route to sounds, transients and the status line.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    MatchStarted,
    /// Input buffer grew (not a deletion); keystroke feedback tone.
    Keystroke,
    EnemySpawned {
        id: u64,
    },
    /// A submission hit. Carries everything the laser/explosion and status
    /// line need, since the enemy itself is already gone.
    EnemyDestroyed {
        id: u64,
        x_frac: f32,
        y: f32,
        points: u64,
        combo: u32,
    },
    /// A submission missed every live enemy.
    Miss,
    Paused,
    Resumed,
    GameOver {
        reason: GameOverReason,
    },
}

/// The match state machine. `Idle → Playing → (Paused ⇄ Playing) → GameOver`;
/// `start_match` re-enters Playing from anywhere, discarding prior state.
#[derive(Resource)]
pub struct MatchEngine {
    pub phase: Phase,
    pub score: u64,
    pub time_left: f32,
    pub combo: u32,
    pub max_combo: u32,
    pub shots_fired: u32,
    pub shots_hit: u32,
    pub enemies: Vec<Enemy>,
    pub input_buffer: String,
    pub over_reason: Option<GameOverReason>,
    spawn_timer_ms: f32,
    spawn_interval_ms: f32,
    fall_speed: f32,
    danger_line: f32,
    next_enemy_id: u64,
    config: Config,
    rng: StdRng,
    events: Vec<MatchEvent>,
}

impl MatchEngine {
    pub fn new(config: Config) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Construct with an explicit RNG so word draws and spawn columns are
    /// reproducible under test.
    pub fn with_rng(config: Config, rng: StdRng) -> Self {
        Self {
            phase: Phase::Idle,
            score: 0,
            time_left: config.timer_start,
            combo: 1,
            max_combo: 1,
            shots_fired: 0,
            shots_hit: 0,
            enemies: Vec::new(),
            input_buffer: String::new(),
            over_reason: None,
            spawn_timer_ms: 0.0,
            spawn_interval_ms: config.spawn_interval_start_ms,
            fall_speed: config.fall_speed_start,
            danger_line: 520.0,
            next_enemy_id: 0,
            config,
            rng,
            events: Vec::new(),
        }
    }

    /// Reset every field to its starting value and enter `Playing`.
    pub fn start_match(&mut self) {
        self.phase = Phase::Playing;
        self.score = 0;
        self.time_left = self.config.timer_start;
        self.combo = 1;
        self.max_combo = 1;
        self.shots_fired = 0;
        self.shots_hit = 0;
        self.enemies.clear();
        self.input_buffer.clear();
        self.over_reason = None;
        self.spawn_timer_ms = 0.0;
        self.spawn_interval_ms = self.config.spawn_interval_start_ms;
        self.fall_speed = self.config.fall_speed_start;
        self.events.clear();
        self.events.push(MatchEvent::MatchStarted);
        log::info!("match started");
    }

    /// Advance the simulation by `dt` seconds. No-op outside `Playing`.
    pub fn update(&mut self, dt: f32) {
        if self.phase != Phase::Playing {
            return;
        }

        self.time_left -= dt;
        if self.time_left <= 0.0 {
            self.end_match(GameOverReason::TimeExpired);
            return;
        }

        self.spawn_timer_ms += dt * 1000.0;
        if self.spawn_timer_ms > self.spawn_interval_ms {
            self.spawn_enemy();
            self.spawn_timer_ms = 0.0;
            self.spawn_interval_ms =
                (self.spawn_interval_ms - SPAWN_ACCEL_MS).max(SPAWN_INTERVAL_FLOOR_MS);
            self.fall_speed += FALL_ACCEL;
        }

        let mut breached = false;
        for enemy in &mut self.enemies {
            enemy.y += self.fall_speed * dt;
            enemy.locked =
                !self.input_buffer.is_empty() && is_ci_prefix(&self.input_buffer, enemy.word);
            if enemy.y > self.danger_line {
                breached = true;
            }
        }
        if breached {
            self.end_match(GameOverReason::Breach);
        }
    }

    /// Replace the input buffer with the trimmed text. Emits a keystroke
    /// event unless the buffer shrank or stayed the same length, which is
    /// how a backspace/delete shows up from the text-input adapter.
    pub fn on_input_changed(&mut self, raw: &str) {
        if self.phase != Phase::Playing {
            return;
        }
        let trimmed = raw.trim();
        if trimmed.chars().count() > self.input_buffer.chars().count() {
            self.events.push(MatchEvent::Keystroke);
        }
        self.input_buffer.clear();
        self.input_buffer.push_str(trimmed);
    }

    /// Fire at the enemy spelling the buffered word. No-op unless `Playing`
    /// with a non-empty buffer.
    ///
    /// Among duplicate words the enemy with the greatest `y` (closest to the
    /// kill line) is destroyed.
    pub fn submit(&mut self) {
        if self.phase != Phase::Playing || self.input_buffer.is_empty() {
            return;
        }

        self.shots_fired += 1;

        let mut target: Option<usize> = None;
        let mut deepest = f32::MIN;
        for (i, enemy) in self.enemies.iter().enumerate() {
            if enemy.word.eq_ignore_ascii_case(&self.input_buffer) && enemy.y > deepest {
                deepest = enemy.y;
                target = Some(i);
            }
        }

        match target {
            Some(i) => {
                let enemy = self.enemies.remove(i);
                self.shots_hit += 1;

                let points = enemy.word.len() as u64 * 100 * self.combo as u64;
                self.combo += 1;
                self.max_combo = self.max_combo.max(self.combo);
                self.score += points;
                self.time_left +=
                    (enemy.word.len() as f32 * TIME_BONUS_PER_LETTER).min(TIME_BONUS_CAP_SECS);

                self.input_buffer.clear();
                self.events.push(MatchEvent::EnemyDestroyed {
                    id: enemy.id,
                    x_frac: enemy.x_frac,
                    y: enemy.y,
                    points,
                    combo: self.combo,
                });
            }
            None => {
                // Penalty may push the timer negative; the next update call
                // turns that into a time-expired game over.
                self.time_left -= MISS_PENALTY_SECS;
                self.combo = 1;
                self.events.push(MatchEvent::Miss);
            }
        }
    }

    /// Playing ⇄ Paused. No-op in `Idle`/`GameOver`. Modal gating (settings
    /// open, story running) is the shell's responsibility.
    pub fn toggle_pause(&mut self) {
        match self.phase {
            Phase::Playing => {
                self.phase = Phase::Paused;
                self.events.push(MatchEvent::Paused);
            }
            Phase::Paused => {
                self.phase = Phase::Playing;
                self.events.push(MatchEvent::Resumed);
            }
            Phase::Idle | Phase::GameOver => {}
        }
    }

    /// Hit percentage, rounded; 100 before the first shot.
    pub fn accuracy(&self) -> u32 {
        if self.shots_fired == 0 {
            100
        } else {
            (self.shots_hit as f32 / self.shots_fired as f32 * 100.0).round() as u32
        }
    }

    /// The kill line in stage pixels. The shell keeps this in sync with the
    /// window: stage height minus the configured danger margin.
    pub fn set_danger_line(&mut self, y: f32) {
        self.danger_line = y;
    }

    pub fn spawn_interval_ms(&self) -> f32 {
        self.spawn_interval_ms
    }

    pub fn fall_speed(&self) -> f32 {
        self.fall_speed
    }

    /// Take everything that happened since the last drain.
    pub fn drain_events(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.events)
    }

    fn spawn_enemy(&mut self) {
        let id = self.next_enemy_id;
        self.next_enemy_id += 1;
        self.enemies.push(Enemy {
            id,
            word: words::draw(&mut self.rng),
            x_frac: 0.10 + self.rng.gen::<f32>() * 0.80,
            y: SPAWN_Y,
            locked: false,
        });
        self.events.push(MatchEvent::EnemySpawned { id });
    }

    fn end_match(&mut self, reason: GameOverReason) {
        self.phase = Phase::GameOver;
        self.over_reason = Some(reason);
        self.events.push(MatchEvent::GameOver { reason });
        log::info!(
            "game over ({}): score {}, accuracy {}%, max combo x{}",
            reason.message(),
            self.score,
            self.accuracy(),
            self.max_combo
        );
    }
}

/// Case-insensitive ASCII prefix test. `word` is always ASCII (the arsenal),
/// so byte slicing is safe.
fn is_ci_prefix(prefix: &str, word: &str) -> bool {
    word.len() >= prefix.len() && word[..prefix.len()].eq_ignore_ascii_case(prefix)
}

// ---------- tests ----------
#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> MatchEngine {
        let mut e = MatchEngine::with_rng(Config::default(), StdRng::seed_from_u64(42));
        e.set_danger_line(520.0);
        e.start_match();
        e.drain_events();
        e
    }

    fn push_enemy(e: &mut MatchEngine, word: &'static str, y: f32) -> u64 {
        let id = e.next_enemy_id;
        e.next_enemy_id += 1;
        e.enemies.push(Enemy {
            id,
            word,
            x_frac: 0.5,
            y,
            locked: false,
        });
        id
    }

    #[test]
    fn hit_scores_with_current_combo_then_increments() {
        let mut e = engine();
        push_enemy(&mut e, "KERNEL", 100.0);
        e.combo = 3;
        e.max_combo = 3;
        e.on_input_changed("kernel");
        e.submit();

        assert_eq!(e.score, 1800); // 6 letters * 100 * combo 3
        assert_eq!(e.combo, 4);
        assert_eq!(e.max_combo, 4);
        assert_eq!(e.shots_hit, 1);
        assert!(e.input_buffer.is_empty());
    }

    #[test]
    fn max_combo_tracks_combo_through_hits_and_misses() {
        let mut e = engine();
        for _ in 0..5 {
            push_enemy(&mut e, "VIRUS", 10.0);
            e.on_input_changed("virus");
            e.submit();
            assert!(e.max_combo >= e.combo);
            assert!(e.shots_hit <= e.shots_fired);
        }
        assert_eq!(e.combo, 6);
        assert_eq!(e.max_combo, 6);

        e.on_input_changed("nothing");
        e.submit();
        assert_eq!(e.combo, 1);
        assert_eq!(e.max_combo, 6);
    }

    #[test]
    fn miss_resets_combo_and_costs_three_seconds() {
        let mut e = engine();
        e.combo = 9;
        let before = e.time_left;
        e.on_input_changed("garbage");
        e.submit();

        assert_eq!(e.combo, 1);
        assert_eq!(e.time_left, before - 3.0);
        // Buffer survives a miss so the player can correct it.
        assert_eq!(e.input_buffer, "garbage");
        assert_eq!(e.drain_events(), vec![MatchEvent::Keystroke, MatchEvent::Miss]);
    }

    #[test]
    fn hit_time_bonus_caps_at_five_seconds() {
        let mut e = engine();
        push_enemy(&mut e, "KERNEL", 10.0);
        let before = e.time_left;
        e.on_input_changed("kernel");
        e.submit();
        assert!((e.time_left - (before + 2.4)).abs() < 1e-4); // 6 * 0.4

        push_enemy(&mut e, "DEFRAGMENTATION", 10.0); // 15 letters, uncapped would be 6.0
        let before = e.time_left;
        e.on_input_changed("defragmentation");
        e.submit();
        assert!((e.time_left - (before + 5.0)).abs() < 1e-4);
    }

    #[test]
    fn duplicate_words_destroy_the_deepest() {
        let mut e = engine();
        let shallow = push_enemy(&mut e, "ERROR", 100.0);
        let deep = push_enemy(&mut e, "ERROR", 300.0);
        e.on_input_changed("error");
        e.submit();

        assert_eq!(e.enemies.len(), 1);
        assert_eq!(e.enemies[0].id, shallow);
        let destroyed = e
            .drain_events()
            .into_iter()
            .find_map(|ev| match ev {
                MatchEvent::EnemyDestroyed { id, .. } => Some(id),
                _ => None,
            })
            .unwrap();
        assert_eq!(destroyed, deep);
    }

    #[test]
    fn empty_or_whitespace_submission_is_a_no_op() {
        let mut e = engine();
        e.submit();
        e.on_input_changed("   ");
        e.submit();
        assert_eq!(e.shots_fired, 0);
        assert_eq!(e.time_left, Config::default().timer_start);
    }

    #[test]
    fn accuracy_is_derived_and_rounded() {
        let mut e = engine();
        assert_eq!(e.accuracy(), 100);

        for _ in 0..3 {
            push_enemy(&mut e, "PROXY", 10.0);
            e.on_input_changed("proxy");
            e.submit();
        }
        e.on_input_changed("wrong");
        e.submit();
        assert_eq!(e.shots_fired, 4);
        assert_eq!(e.accuracy(), 75);
    }

    #[test]
    fn spawn_interval_never_drops_below_the_floor() {
        let mut e = engine();
        e.time_left = 100_000.0;
        e.set_danger_line(f32::MAX);
        for _ in 0..500 {
            e.update(0.9);
            assert!(e.spawn_interval_ms() >= 500.0);
        }
        assert_eq!(e.spawn_interval_ms(), 500.0);
        assert!(e.fall_speed() > Config::default().fall_speed_start);
    }

    #[test]
    fn prefix_lock_is_cosmetic_and_case_insensitive() {
        let mut e = engine();
        e.set_danger_line(f32::MAX);
        push_enemy(&mut e, "SYSTEM", 10.0);
        push_enemy(&mut e, "SIGNAL", 10.0);

        e.on_input_changed("sys");
        e.update(0.016);
        assert!(e.enemies[0].locked);
        assert!(!e.enemies[1].locked);
        assert_eq!(e.score, 0);

        // Deletion clears the keystroke signal but still refreshes locks.
        e.on_input_changed("s");
        e.update(0.016);
        assert!(e.enemies[0].locked && e.enemies[1].locked);

        e.on_input_changed("");
        e.update(0.016);
        assert!(e.enemies.iter().all(|enemy| !enemy.locked));
    }

    #[test]
    fn keystroke_fires_only_when_the_buffer_grows() {
        let mut e = engine();
        e.on_input_changed("sy");
        e.on_input_changed("sys");
        e.on_input_changed("sy"); // backspace
        e.on_input_changed("sy"); // no change
        let keystrokes = e
            .drain_events()
            .into_iter()
            .filter(|ev| *ev == MatchEvent::Keystroke)
            .count();
        assert_eq!(keystrokes, 2);
    }

    #[test]
    fn pause_is_a_strict_barrier_and_resume_is_clean() {
        let mut e = engine();
        e.update(1.0);
        let frozen = e.time_left;

        e.toggle_pause();
        assert_eq!(e.phase, Phase::Paused);
        e.update(5.0);
        e.submit();
        assert_eq!(e.time_left, frozen);

        e.toggle_pause();
        assert_eq!(e.phase, Phase::Playing);
        e.update(1.0);
        assert!((e.time_left - (frozen - 1.0)).abs() < 1e-4);
    }

    #[test]
    fn update_outside_playing_is_a_no_op() {
        let mut e = MatchEngine::with_rng(Config::default(), StdRng::seed_from_u64(1));
        assert_eq!(e.phase, Phase::Idle);
        e.update(10.0);
        assert_eq!(e.time_left, Config::default().timer_start);
        assert!(e.drain_events().is_empty());

        e.start_match();
        e.time_left = 0.5;
        e.update(1.0);
        assert_eq!(e.phase, Phase::GameOver);
        let final_time = e.time_left;
        e.update(10.0);
        assert_eq!(e.time_left, final_time);
    }

    #[test]
    fn running_out_of_time_ends_the_match() {
        let mut e = engine();
        e.set_danger_line(f32::MAX);
        for _ in 0..31 {
            e.update(1.0);
        }
        assert_eq!(e.phase, Phase::GameOver);
        assert_eq!(e.over_reason, Some(GameOverReason::TimeExpired));
        assert_eq!(e.score, 0);
    }

    #[test]
    fn enemy_crossing_the_kill_line_ends_the_match() {
        let mut e = engine();
        push_enemy(&mut e, "VIRUS", 519.0);
        e.update(0.1); // 519 + 60 * 0.1 = 525 > 520
        assert_eq!(e.phase, Phase::GameOver);
        assert_eq!(e.over_reason, Some(GameOverReason::Breach));
    }

    #[test]
    fn start_match_discards_a_finished_match() {
        let mut e = engine();
        push_enemy(&mut e, "VIRUS", 10.0);
        e.on_input_changed("virus");
        e.submit();
        e.time_left = 0.1;
        e.update(1.0);
        assert_eq!(e.phase, Phase::GameOver);

        e.start_match();
        assert_eq!(e.phase, Phase::Playing);
        assert_eq!(e.score, 0);
        assert_eq!(e.combo, 1);
        assert_eq!(e.max_combo, 1);
        assert!(e.enemies.is_empty());
        assert!(e.over_reason.is_none());
        assert_eq!(e.time_left, Config::default().timer_start);
    }
}
