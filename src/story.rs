//! Intro narrative: a terminal typewriter played once per session, before
//! the first match. Escape or a click skips it; either way the session moves
//! into the match exactly once (the `Story → InGame` state transition).

use bevy::prelude::*;

use crate::start_screen::AppState;

pub const STORY_LINES: &[&str] = &[
    "WARNING: CRITICAL SYSTEM FAULT.",
    "FIREWALL STATUS: BREACHED.",
    "SOURCE: CRIMSON_VIRUS.EXE",
    "PROTOCOL: MANUAL DEFENSE REQUIRED.",
    "LOADING WEAPON SYSTEMS...",
    "GOOD LUCK, USER.",
];

/// Seconds per revealed character.
const CHAR_SECS: f32 = 0.040;
/// Pause after each line.
const LINE_PAUSE_SECS: f32 = 0.8;
/// Extra hold after the last line before auto-finish.
const TAIL_PAUSE_SECS: f32 = 1.0;

/// Precomputed reveal schedule: when each line appears and when the whole
/// sequence auto-finishes.
pub struct StoryScript {
    pub reveal_at: Vec<f32>,
    pub finish_at: f32,
}

impl StoryScript {
    pub fn new(lines: &[&str]) -> Self {
        let mut reveal_at = Vec::with_capacity(lines.len());
        let mut t = 0.0;
        for line in lines {
            reveal_at.push(t);
            t += line.chars().count() as f32 * CHAR_SECS + LINE_PAUSE_SECS;
        }
        Self {
            reveal_at,
            finish_at: t + TAIL_PAUSE_SECS,
        }
    }
}

/// Marker for everything the story layer spawns.
#[derive(Component)]
pub struct StoryLayer;

/// The terminal text node lines are appended to.
#[derive(Component)]
pub struct StoryTerminal;

#[derive(Resource)]
pub struct StoryState {
    script: StoryScript,
    elapsed: f32,
    revealed: usize,
}

pub fn setup_story(mut commands: Commands) {
    commands.insert_resource(StoryState {
        script: StoryScript::new(STORY_LINES),
        elapsed: 0.0,
        revealed: 0,
    });

    commands
        .spawn((
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                padding: UiRect::all(Val::Px(60.0)),
                flex_direction: FlexDirection::Column,
                ..default()
            },
            BackgroundColor(Color::srgb(0.01, 0.0, 0.02)),
            StoryLayer,
        ))
        .with_children(|parent| {
            parent.spawn((
                Text::new(""),
                TextFont {
                    font_size: 22.0,
                    ..default()
                },
                TextColor(Color::srgb(0.9, 0.2, 0.3)),
                StoryTerminal,
            ));
            parent.spawn((
                Text::new("[ CLICK OR ESC TO SKIP ]"),
                TextFont {
                    font_size: 14.0,
                    ..default()
                },
                TextColor(Color::srgb(0.35, 0.05, 0.1)),
                Node {
                    position_type: PositionType::Absolute,
                    bottom: Val::Px(20.0),
                    right: Val::Px(20.0),
                    ..default()
                },
            ));
        });
}

/// Reveal lines on schedule; hand off to the match when the script ends.
pub fn run_story(
    time: Res<Time>,
    state: Option<ResMut<StoryState>>,
    mut terminal: Query<&mut Text, With<StoryTerminal>>,
    mut next_state: ResMut<NextState<AppState>>,
) {
    let Some(mut state) = state else {
        return;
    };
    state.elapsed += time.delta_secs();

    while state.revealed < STORY_LINES.len()
        && state.elapsed >= state.script.reveal_at[state.revealed]
    {
        if let Ok(mut text) = terminal.get_single_mut() {
            text.0.push_str(STORY_LINES[state.revealed]);
            text.0.push_str("\n\n");
        }
        state.revealed += 1;
    }

    if state.elapsed >= state.script.finish_at {
        next_state.set(AppState::InGame);
    }
}

/// Early termination still reaches the match.
pub fn skip_story(
    keys: Res<ButtonInput<KeyCode>>,
    mouse: Res<ButtonInput<MouseButton>>,
    mut next_state: ResMut<NextState<AppState>>,
) {
    if keys.just_pressed(KeyCode::Escape) || mouse.just_pressed(MouseButton::Left) {
        next_state.set(AppState::InGame);
    }
}

pub fn cleanup_story(
    mut commands: Commands,
    layers: Query<Entity, With<StoryLayer>>,
) {
    for entity in layers.iter() {
        commands.entity(entity).despawn_recursive();
    }
    commands.remove_resource::<StoryState>();
}
