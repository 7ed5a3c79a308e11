//! In-match HUD: stat readouts, typed-input display, status line, and the
//! pause / game-over overlays. Reads the match engine every frame; the only
//! state of its own is the status line, which the event router writes.

use bevy::prelude::*;

use crate::match_engine::{MatchEngine, Phase};

// UI Components
#[derive(Component)]
pub struct HudContainer;

#[derive(Component)]
pub struct ScoreText;

#[derive(Component)]
pub struct AccuracyText;

#[derive(Component)]
pub struct TimeText;

#[derive(Component)]
pub struct ComboText;

#[derive(Component)]
pub struct ComboBox;

#[derive(Component)]
pub struct InputDisplay;

#[derive(Component)]
pub struct StatusText;

#[derive(Component)]
pub struct PauseOverlay;

#[derive(Component)]
pub struct GameOverOverlay;

#[derive(Component)]
pub struct GameOverReasonText;

#[derive(Component)]
pub struct FinalScoreText;

#[derive(Component)]
pub struct FinalAccuracyText;

#[derive(Component)]
pub struct FinalComboText;

/// Status line state, written by the event router.
#[derive(Resource)]
pub struct UiState {
    pub status: String,
    pub status_color: Color,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            status: "STANDBY".to_string(),
            status_color: Color::srgb(0.8, 0.8, 0.9),
        }
    }
}

fn stat_box(parent: &mut ChildBuilder, label: &str, marker: impl Component, boxed: Option<impl Component>) {
    let mut node = parent.spawn((
        Node {
            flex_direction: FlexDirection::Column,
            align_items: AlignItems::Center,
            padding: UiRect::all(Val::Px(8.0)),
            margin: UiRect::right(Val::Px(16.0)),
            ..default()
        },
        BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.6)),
    ));
    if let Some(boxed) = boxed {
        node.insert(boxed);
    }
    node.with_children(|parent| {
        parent.spawn((
            Text::new(label),
            TextFont {
                font_size: 12.0,
                ..default()
            },
            TextColor(Color::srgb(0.6, 0.2, 0.3)),
        ));
        parent.spawn((
            Text::new("0"),
            TextFont {
                font_size: 20.0,
                ..default()
            },
            TextColor(Color::WHITE),
            marker,
        ));
    });
}

pub fn setup_hud(mut commands: Commands) {
    commands
        .spawn((
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                ..default()
            },
            HudContainer,
        ))
        .with_children(|parent| {
            // Top stat bar
            parent
                .spawn((Node {
                    position_type: PositionType::Absolute,
                    top: Val::Px(10.0),
                    left: Val::Px(10.0),
                    flex_direction: FlexDirection::Row,
                    ..default()
                },))
                .with_children(|parent| {
                    stat_box(parent, "SCORE", ScoreText, None::<ComboBox>);
                    stat_box(parent, "ACCURACY", AccuracyText, None::<ComboBox>);
                    stat_box(parent, "TIME", TimeText, None::<ComboBox>);
                    stat_box(parent, "COMBO", ComboText, Some(ComboBox));
                });

            // Status line and typed-input display at the bottom
            parent
                .spawn((Node {
                    position_type: PositionType::Absolute,
                    bottom: Val::Px(24.0),
                    width: Val::Percent(100.0),
                    flex_direction: FlexDirection::Column,
                    align_items: AlignItems::Center,
                    ..default()
                },))
                .with_children(|parent| {
                    parent.spawn((
                        Text::new("SYSTEM ONLINE"),
                        TextFont {
                            font_size: 14.0,
                            ..default()
                        },
                        TextColor(Color::srgb(0.8, 0.8, 0.9)),
                        Node {
                            margin: UiRect::bottom(Val::Px(8.0)),
                            ..default()
                        },
                        StatusText,
                    ));
                    parent.spawn((
                        Text::new(""),
                        TextFont {
                            font_size: 30.0,
                            ..default()
                        },
                        TextColor(Color::srgb(0.2, 0.9, 0.9)),
                        InputDisplay,
                    ));
                });
        });

    // Pause overlay
    commands
        .spawn((
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                align_items: AlignItems::Center,
                justify_content: JustifyContent::Center,
                flex_direction: FlexDirection::Column,
                ..default()
            },
            BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.8)),
            Visibility::Hidden,
            PauseOverlay,
            HudContainer,
        ))
        .with_children(|parent| {
            parent.spawn((
                Text::new("PAUSED"),
                TextFont {
                    font_size: 48.0,
                    ..default()
                },
                TextColor(Color::srgb(0.9, 0.1, 0.25)),
            ));
            parent.spawn((
                Text::new("ESC to resume"),
                TextFont {
                    font_size: 18.0,
                    ..default()
                },
                TextColor(Color::srgb(0.5, 0.2, 0.3)),
            ));
        });

    // Game-over overlay with the final stats panel
    commands
        .spawn((
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                align_items: AlignItems::Center,
                justify_content: JustifyContent::Center,
                flex_direction: FlexDirection::Column,
                ..default()
            },
            BackgroundColor(Color::srgba(0.02, 0.0, 0.02, 0.9)),
            Visibility::Hidden,
            GameOverOverlay,
            HudContainer,
        ))
        .with_children(|parent| {
            parent.spawn((
                Text::new("DEFENSE OFFLINE"),
                TextFont {
                    font_size: 56.0,
                    ..default()
                },
                TextColor(Color::srgb(0.9, 0.1, 0.25)),
            ));
            parent.spawn((
                Text::new(""),
                TextFont {
                    font_size: 22.0,
                    ..default()
                },
                TextColor(Color::srgb(1.0, 0.3, 0.3)),
                Node {
                    margin: UiRect::bottom(Val::Px(24.0)),
                    ..default()
                },
                GameOverReasonText,
            ));
            let stat_font = TextFont {
                font_size: 20.0,
                ..default()
            };
            parent.spawn((
                Text::new("FINAL SCORE 0"),
                stat_font.clone(),
                TextColor(Color::WHITE),
                FinalScoreText,
            ));
            parent.spawn((
                Text::new("ACCURACY 100%"),
                stat_font.clone(),
                TextColor(Color::WHITE),
                FinalAccuracyText,
            ));
            parent.spawn((
                Text::new("MAX COMBO x1"),
                stat_font,
                TextColor(Color::WHITE),
                FinalComboText,
            ));
            parent.spawn((
                Text::new("PRESS ENTER TO RE-ENGAGE"),
                TextFont {
                    font_size: 16.0,
                    ..default()
                },
                TextColor(Color::srgb(0.5, 0.2, 0.3)),
                Node {
                    margin: UiRect::top(Val::Px(30.0)),
                    ..default()
                },
            ));
        });
}

/// Refresh every live readout from the engine.
pub fn update_hud(
    engine: Res<MatchEngine>,
    ui_state: Res<UiState>,
    mut texts: Query<(
        &mut Text,
        &mut TextColor,
        Option<&ScoreText>,
        Option<&AccuracyText>,
        Option<&TimeText>,
        Option<&ComboText>,
        Option<&InputDisplay>,
        Option<&StatusText>,
    )>,
    mut combo_box: Query<&mut BackgroundColor, With<ComboBox>>,
) {
    for (mut text, mut color, score, acc, time, combo, input, status) in &mut texts {
        if score.is_some() {
            text.0 = engine.score.to_string();
        } else if acc.is_some() {
            text.0 = format!("{}%", engine.accuracy());
        } else if time.is_some() {
            text.0 = format!("{:.1}s", engine.time_left.max(0.0));
            color.0 = if engine.time_left <= 5.0 {
                Color::srgb(1.0, 0.2, 0.2)
            } else {
                Color::WHITE
            };
        } else if combo.is_some() {
            text.0 = format!("x{}", engine.combo);
        } else if input.is_some() {
            text.0 = engine.input_buffer.to_uppercase();
        } else if status.is_some() {
            text.0 = ui_state.status.clone();
            color.0 = ui_state.status_color;
        }
    }

    // Combo streak callout past x5
    for mut bg in &mut combo_box {
        bg.0 = if engine.combo > 5 {
            Color::srgba(0.4, 0.0, 0.1, 0.9)
        } else {
            Color::srgba(0.0, 0.0, 0.0, 0.6)
        };
    }
}

/// Drive overlay visibility and the final-stats panel from the phase.
pub fn update_overlays(
    engine: Res<MatchEngine>,
    mut pause: Query<&mut Visibility, (With<PauseOverlay>, Without<GameOverOverlay>)>,
    mut over: Query<&mut Visibility, (With<GameOverOverlay>, Without<PauseOverlay>)>,
    mut finals: Query<(
        &mut Text,
        Option<&FinalScoreText>,
        Option<&FinalAccuracyText>,
        Option<&FinalComboText>,
        Option<&GameOverReasonText>,
    )>,
) {
    for mut visibility in &mut pause {
        *visibility = if engine.phase == Phase::Paused {
            Visibility::Visible
        } else {
            Visibility::Hidden
        };
    }

    let game_over = engine.phase == Phase::GameOver;
    for mut visibility in &mut over {
        *visibility = if game_over {
            Visibility::Visible
        } else {
            Visibility::Hidden
        };
    }
    if game_over {
        for (mut text, score, acc, combo, reason) in &mut finals {
            if score.is_some() {
                text.0 = format!("FINAL SCORE {}", engine.score);
            } else if acc.is_some() {
                text.0 = format!("ACCURACY {}%", engine.accuracy());
            } else if combo.is_some() {
                text.0 = format!("MAX COMBO x{}", engine.max_combo);
            } else if reason.is_some() {
                if let Some(r) = engine.over_reason {
                    text.0 = r.message().to_string();
                }
            }
        }
    }
}
