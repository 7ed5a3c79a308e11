//! Start overlay and the outer session flow.

use bevy::prelude::*;

/// Outer flow: title overlay → intro narrative (once per session) → match.
/// Pause and game-over live inside the match engine's own phase, not here.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, States)]
pub enum AppState {
    #[default]
    StartScreen,
    Story,
    InGame,
}

/// Marker component for start screen entities
#[derive(Component)]
pub struct StartScreenEntity;

#[derive(Component)]
pub struct StartButton;

/// Setup the start screen UI
pub fn setup_start_screen(mut commands: Commands) {
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
            BackgroundColor(Color::srgb(0.02, 0.0, 0.05)),
            StartScreenEntity,
        ))
        .with_children(|parent| {
            parent.spawn((
                Text::new("CRIMSON DEFENSE"),
                TextFont {
                    font_size: 72.0,
                    ..default()
                },
                TextColor(Color::srgb(0.9, 0.1, 0.25)),
                Node {
                    margin: UiRect::bottom(Val::Px(10.0)),
                    ..default()
                },
            ));

            parent.spawn((
                Text::new("synthwave typing defense"),
                TextFont {
                    font_size: 24.0,
                    ..default()
                },
                TextColor(Color::srgb(0.45, 0.05, 0.3)),
                Node {
                    margin: UiRect::bottom(Val::Px(50.0)),
                    ..default()
                },
            ));

            parent
                .spawn((
                    Button,
                    Node {
                        width: Val::Px(260.0),
                        height: Val::Px(60.0),
                        align_items: AlignItems::Center,
                        justify_content: JustifyContent::Center,
                        border: UiRect::all(Val::Px(2.0)),
                        ..default()
                    },
                    BackgroundColor(Color::srgba(0.2, 0.0, 0.05, 0.9)),
                    BorderColor(Color::srgb(0.5, 0.0, 0.15)),
                    StartButton,
                ))
                .with_children(|parent| {
                    parent.spawn((
                        Text::new("INITIALIZE DEFENSE"),
                        TextFont {
                            font_size: 22.0,
                            ..default()
                        },
                        TextColor(Color::srgb(1.0, 0.3, 0.45)),
                    ));
                });

            parent
                .spawn((
                    Node {
                        position_type: PositionType::Absolute,
                        bottom: Val::Px(20.0),
                        flex_direction: FlexDirection::Column,
                        align_items: AlignItems::Center,
                        ..default()
                    },
                ))
                .with_children(|parent| {
                    for line in [
                        "Type the falling word, ENTER to fire",
                        "ESC pauses  //  , . music volume  //  [ ] sfx volume",
                        "F3 toggles scanlines  //  F4 toggles screen shake",
                    ] {
                        parent.spawn((
                            Text::new(line),
                            TextFont {
                                font_size: 14.0,
                                ..default()
                            },
                            TextColor(Color::srgb(0.4, 0.1, 0.2)),
                            Node {
                                margin: UiRect::bottom(Val::Px(4.0)),
                                ..default()
                            },
                        ));
                    }
                });
        });
}

/// Enter or the button launches the intro sequence.
pub fn handle_start_screen_input(
    keyboard_input: Res<ButtonInput<KeyCode>>,
    mut next_state: ResMut<NextState<AppState>>,
    mut app_exit_events: EventWriter<AppExit>,
    mut buttons: Query<(&Interaction, &mut BackgroundColor), (Changed<Interaction>, With<StartButton>)>,
) {
    let mut start_clicked = false;
    for (interaction, mut color) in &mut buttons {
        match *interaction {
            Interaction::Pressed => {
                *color = BackgroundColor(Color::srgb(0.4, 0.05, 0.1));
                start_clicked = true;
            }
            Interaction::Hovered => {
                *color = BackgroundColor(Color::srgb(0.3, 0.03, 0.08));
            }
            Interaction::None => {
                *color = BackgroundColor(Color::srgba(0.2, 0.0, 0.05, 0.9));
            }
        }
    }

    if keyboard_input.just_pressed(KeyCode::Enter) || start_clicked {
        next_state.set(AppState::Story);
    }

    if keyboard_input.just_pressed(KeyCode::Escape) {
        app_exit_events.send(AppExit::Success);
    }
}

/// Cleanup start screen
pub fn cleanup_start_screen(
    mut commands: Commands,
    query: Query<Entity, With<StartScreenEntity>>,
) {
    for entity in query.iter() {
        commands.entity(entity).despawn_recursive();
    }
}
