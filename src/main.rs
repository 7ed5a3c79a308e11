use bevy::input::keyboard::{Key, KeyboardInput};
use bevy::input::ButtonState;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crimsondefense::audio::AudioBus;
use crimsondefense::config::Config;
use crimsondefense::match_engine::{MatchEngine, MatchEvent, Phase};
use crimsondefense::settings::{SettingsStore, SETTINGS_FILE};
use crimsondefense::stage::{self, ShakeState};
use crimsondefense::start_screen::{self, AppState};
use crimsondefense::story;
use crimsondefense::ui::{self, UiState};

/// Synthwave typing defense.
#[derive(Parser, Debug)]
#[command(name = "crimsondefense", version, about)]
struct Args {
    /// Path to the gameplay config TOML (defaults to crimson.toml).
    #[arg(long)]
    config: Option<String>,
    /// Seed for word draws and the music pattern, for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = Config::load(args.config.as_deref());
    let mut settings = SettingsStore::load(SETTINGS_FILE);
    let audio = AudioBus::new(&mut settings, config.tempo_bpm, args.seed);
    let engine = match args.seed {
        Some(seed) => MatchEngine::with_rng(config, StdRng::seed_from_u64(seed)),
        None => MatchEngine::new(config),
    };

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Crimson Defense".into(),
                resolution: (1200.0, 800.0).into(),
                ..default()
            }),
            ..default()
        }))
        .init_state::<AppState>()
        .insert_resource(config)
        .insert_resource(settings)
        .insert_resource(engine)
        .init_resource::<UiState>()
        .init_resource::<ShakeState>()
        .insert_non_send_resource(audio)
        .add_systems(Startup, setup_camera)
        .add_systems(OnEnter(AppState::StartScreen), start_screen::setup_start_screen)
        .add_systems(OnExit(AppState::StartScreen), start_screen::cleanup_start_screen)
        .add_systems(
            Update,
            start_screen::handle_start_screen_input.run_if(in_state(AppState::StartScreen)),
        )
        .add_systems(OnEnter(AppState::Story), story::setup_story)
        .add_systems(OnExit(AppState::Story), story::cleanup_story)
        .add_systems(
            Update,
            (story::run_story, story::skip_story).run_if(in_state(AppState::Story)),
        )
        .add_systems(
            OnEnter(AppState::InGame),
            (ui::setup_hud, stage::setup_stage, begin_match),
        )
        .add_systems(
            Update,
            (
                // A submit or input edit landing between two frames must be
                // fully applied before the next engine update, and events are
                // routed after the update so breach/expiry land same-frame.
                handle_typing,
                sync_danger_line,
                advance_match.after(handle_typing).after(sync_danger_line),
                route_match_events.after(advance_match),
                stage::sync_enemies.after(route_match_events),
                stage::animate_transients,
                stage::apply_screen_shake,
                stage::sync_crt,
                ui::update_hud.after(route_match_events),
                ui::update_overlays.after(route_match_events),
            )
                .run_if(in_state(AppState::InGame)),
        )
        .add_systems(Update, handle_settings_hotkeys)
        .run();
}

fn setup_camera(mut commands: Commands) {
    commands.spawn(Camera2d);
}

/// Keep the engine's kill line anchored to the real window height.
fn sync_danger_line(
    windows: Query<&Window, With<PrimaryWindow>>,
    config: Res<Config>,
    mut engine: ResMut<MatchEngine>,
) {
    if let Ok(window) = windows.get_single() {
        engine.set_danger_line(window.height() - config.danger_margin);
    }
}

fn begin_match(
    windows: Query<&Window, With<PrimaryWindow>>,
    config: Res<Config>,
    mut engine: ResMut<MatchEngine>,
) {
    if let Ok(window) = windows.get_single() {
        engine.set_danger_line(window.height() - config.danger_margin);
    }
    engine.start_match();
}

fn advance_match(time: Res<Time>, mut engine: ResMut<MatchEngine>) {
    engine.update(time.delta_secs());
}

/// Route raw keyboard input into the engine: characters and backspace edit
/// the buffer, Enter fires (or restarts after a game over), Escape pauses.
/// The story and start screen run in other states, so no modal gating is
/// needed here.
fn handle_typing(
    mut key_events: EventReader<KeyboardInput>,
    keys: Res<ButtonInput<KeyCode>>,
    mut engine: ResMut<MatchEngine>,
) {
    if keys.just_pressed(KeyCode::Escape) {
        engine.toggle_pause();
    }

    for event in key_events.read() {
        if event.state != ButtonState::Pressed {
            continue;
        }
        match &event.logical_key {
            Key::Enter => {
                if event.repeat {
                    continue;
                }
                if engine.phase == Phase::GameOver {
                    engine.start_match();
                } else {
                    engine.submit();
                }
            }
            Key::Backspace => {
                let mut buffer = engine.input_buffer.clone();
                buffer.pop();
                engine.on_input_changed(&buffer);
            }
            Key::Character(input) => {
                let mut buffer = engine.input_buffer.clone();
                buffer.extend(input.chars().filter(|c| !c.is_control()));
                engine.on_input_changed(&buffer);
            }
            _ => {}
        }
    }
}

/// Drain the engine's event queue and fan it out to the synthesizer, the
/// sequencer, the transient visuals and the status line.
fn route_match_events(
    mut engine: ResMut<MatchEngine>,
    audio: NonSend<AudioBus>,
    settings: Res<SettingsStore>,
    mut ui_state: ResMut<UiState>,
    mut shake: ResMut<ShakeState>,
    mut commands: Commands,
    windows: Query<&Window, With<PrimaryWindow>>,
) {
    let window = windows.get_single().ok();
    for event in engine.drain_events() {
        match event {
            MatchEvent::MatchStarted => {
                audio.music.start();
                ui_state.status = "SYSTEM ONLINE".to_string();
                ui_state.status_color = Color::srgb(0.8, 0.8, 0.9);
            }
            MatchEvent::Keystroke => audio.sfx.play_keystroke(),
            MatchEvent::EnemySpawned { .. } => {}
            MatchEvent::EnemyDestroyed {
                x_frac,
                y,
                points,
                combo,
                ..
            } => {
                audio.sfx.play_shot_fired();
                audio.sfx.play_destroy();
                if let Some(window) = window {
                    let target = stage::stage_to_world(window, x_frac, y);
                    stage::spawn_laser(&mut commands, stage::player_base_position(window), target);
                    stage::spawn_explosion(&mut commands, target);
                }
                if settings.data().shake_enabled {
                    shake.trigger();
                }
                ui_state.status = format!("HIT +{points} (x{combo})");
                ui_state.status_color = Color::srgb(0.2, 0.9, 0.9);
            }
            MatchEvent::Miss => {
                audio.sfx.play_miss();
                ui_state.status = "MISS! COMBO RESET".to_string();
                ui_state.status_color = Color::srgb(1.0, 0.2, 0.2);
            }
            MatchEvent::Paused => audio.music.stop(),
            MatchEvent::Resumed => audio.music.start(),
            MatchEvent::GameOver { reason } => {
                audio.music.stop();
                audio.sfx.play_miss();
                ui_state.status = reason.message().to_string();
                ui_state.status_color = Color::srgb(1.0, 0.2, 0.2);
            }
        }
    }
}

/// Volume and visual-toggle hotkeys. The store persists and notifies the
/// audio bus; music ramps smoothly, effects step.
fn handle_settings_hotkeys(
    keys: Res<ButtonInput<KeyCode>>,
    mut settings: ResMut<SettingsStore>,
) {
    let data = settings.data();
    if keys.just_pressed(KeyCode::Comma) {
        settings.set_music_vol(data.music_vol - 0.1);
    }
    if keys.just_pressed(KeyCode::Period) {
        settings.set_music_vol(data.music_vol + 0.1);
    }
    if keys.just_pressed(KeyCode::BracketLeft) {
        settings.set_sfx_vol(data.sfx_vol - 0.1);
    }
    if keys.just_pressed(KeyCode::BracketRight) {
        settings.set_sfx_vol(data.sfx_vol + 0.1);
    }
    if keys.just_pressed(KeyCode::F3) {
        settings.set_crt_enabled(!data.crt_enabled);
    }
    if keys.just_pressed(KeyCode::F4) {
        settings.set_shake_enabled(!data.shake_enabled);
    }
}
