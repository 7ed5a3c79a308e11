//! The battlefield: falling word entities plus the transient visuals
//! (laser, explosion particles, screen shake, scanline overlay).
//!
//! Enemies are world-space `Text2d` entities keyed by the engine's enemy id;
//! `sync_enemies` reconciles them against engine state every frame. The
//! engine's coordinates are stage pixels (y grows downward from the top), so
//! they are remapped into world space here and nowhere else.

use std::f32::consts::TAU;

use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::config::Config;
use crate::match_engine::MatchEngine;
use crate::settings::SettingsStore;

const ENEMY_COLOR: Color = Color::srgb(0.2, 0.9, 0.9);
const LOCKED_COLOR: Color = Color::srgb(1.0, 0.9, 0.2);
const PRIMARY: Color = Color::srgb(0.9, 0.1, 0.25);
const SECONDARY: Color = Color::srgb(0.2, 0.9, 0.9);

const SHAKE_SECS: f32 = 0.3;
const SHAKE_AMPLITUDE: f32 = 12.0;
const LASER_SECS: f32 = 0.1;
const PARTICLE_SECS: f32 = 0.6;
const PARTICLE_COUNT: usize = 15;

#[derive(Component)]
pub struct EnemySprite {
    pub id: u64,
}

#[derive(Component)]
pub struct PlayerBase;

#[derive(Component)]
pub struct KillLine;

#[derive(Component)]
pub struct CrtStripe;

#[derive(Component)]
pub struct Laser {
    timer: Timer,
}

#[derive(Component)]
pub struct Particle {
    velocity: Vec2,
    timer: Timer,
}

/// Remaining screen-shake time; hits top it up (when the setting allows).
#[derive(Resource, Default)]
pub struct ShakeState {
    remaining: f32,
}

impl ShakeState {
    pub fn trigger(&mut self) {
        self.remaining = SHAKE_SECS;
    }
}

/// Stage pixels (x as width fraction, y from the top) → world space.
pub fn stage_to_world(window: &Window, x_frac: f32, y: f32) -> Vec2 {
    Vec2::new(
        (x_frac - 0.5) * window.width(),
        window.height() / 2.0 - y,
    )
}

/// World position of the turret the laser fires from.
pub fn player_base_position(window: &Window) -> Vec2 {
    Vec2::new(0.0, -window.height() / 2.0 + 40.0)
}

pub fn setup_stage(
    mut commands: Commands,
    windows: Query<&Window, With<PrimaryWindow>>,
    config: Res<Config>,
) {
    let Ok(window) = windows.get_single() else {
        return;
    };
    let (w, h) = (window.width(), window.height());

    // Turret
    commands.spawn((
        Sprite {
            color: PRIMARY,
            custom_size: Some(Vec2::new(60.0, 16.0)),
            ..default()
        },
        Transform::from_translation(player_base_position(window).extend(1.0)),
        PlayerBase,
    ));

    // Kill line marker
    commands.spawn((
        Sprite {
            color: Color::srgba(0.9, 0.1, 0.25, 0.35),
            custom_size: Some(Vec2::new(w, 2.0)),
            ..default()
        },
        Transform::from_xyz(0.0, config.danger_margin - h / 2.0, 1.0),
        KillLine,
    ));

    // Scanline overlay, toggled by the CRT setting
    let mut y = -h / 2.0;
    while y < h / 2.0 {
        commands.spawn((
            Sprite {
                color: Color::srgba(0.0, 0.0, 0.0, 0.07),
                custom_size: Some(Vec2::new(w, 2.0)),
                ..default()
            },
            Transform::from_xyz(0.0, y, 50.0),
            CrtStripe,
        ));
        y += 6.0;
    }
}

/// Reconcile enemy entities against engine state: move survivors, spawn the
/// new, despawn the destroyed.
pub fn sync_enemies(
    engine: Res<MatchEngine>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut commands: Commands,
    mut sprites: Query<(Entity, &EnemySprite, &mut Transform, &mut TextColor)>,
) {
    let Ok(window) = windows.get_single() else {
        return;
    };

    let mut seen = Vec::with_capacity(engine.enemies.len());
    for (entity, sprite, mut transform, mut color) in &mut sprites {
        match engine.enemies.iter().find(|e| e.id == sprite.id) {
            Some(enemy) => {
                seen.push(enemy.id);
                transform.translation =
                    stage_to_world(window, enemy.x_frac, enemy.y).extend(5.0);
                color.0 = if enemy.locked { LOCKED_COLOR } else { ENEMY_COLOR };
            }
            None => commands.entity(entity).despawn(),
        }
    }

    for enemy in engine.enemies.iter().filter(|e| !seen.contains(&e.id)) {
        commands.spawn((
            Text2d::new(enemy.word),
            TextFont {
                font_size: 24.0,
                ..default()
            },
            TextColor(ENEMY_COLOR),
            Transform::from_translation(
                stage_to_world(window, enemy.x_frac, enemy.y).extend(5.0),
            ),
            EnemySprite { id: enemy.id },
        ));
    }
}

/// Beam from the turret to the destroyed enemy, gone after 100 ms.
pub fn spawn_laser(commands: &mut Commands, from: Vec2, to: Vec2) {
    let delta = to - from;
    let length = delta.length().max(1.0);
    let angle = delta.y.atan2(delta.x);
    commands.spawn((
        Sprite {
            color: PRIMARY,
            custom_size: Some(Vec2::new(length, 3.0)),
            ..default()
        },
        Transform {
            translation: ((from + to) / 2.0).extend(8.0),
            rotation: Quat::from_rotation_z(angle),
            ..default()
        },
        Laser {
            timer: Timer::from_seconds(LASER_SECS, TimerMode::Once),
        },
    ));
}

/// Particle burst at the impact point.
pub fn spawn_explosion(commands: &mut Commands, at: Vec2) {
    for _ in 0..PARTICLE_COUNT {
        let angle = rand::random::<f32>() * TAU;
        let speed = 50.0 + rand::random::<f32>() * 150.0;
        let color = if rand::random::<bool>() { PRIMARY } else { SECONDARY };
        commands.spawn((
            Sprite {
                color,
                custom_size: Some(Vec2::splat(5.0)),
                ..default()
            },
            Transform::from_translation(at.extend(9.0)),
            Particle {
                velocity: Vec2::from_angle(angle) * speed,
                timer: Timer::from_seconds(PARTICLE_SECS, TimerMode::Once),
            },
        ));
    }
}

/// Advance and expire lasers and particles.
pub fn animate_transients(
    time: Res<Time>,
    mut commands: Commands,
    mut lasers: Query<(Entity, &mut Laser)>,
    mut particles: Query<(Entity, &mut Transform, &mut Sprite, &mut Particle)>,
) {
    for (entity, mut laser) in &mut lasers {
        if laser.timer.tick(time.delta()).finished() {
            commands.entity(entity).despawn();
        }
    }

    for (entity, mut transform, mut sprite, mut particle) in &mut particles {
        particle.timer.tick(time.delta());
        if particle.timer.finished() {
            commands.entity(entity).despawn();
            continue;
        }
        let dt = time.delta_secs();
        transform.translation.x += particle.velocity.x * dt;
        transform.translation.y += particle.velocity.y * dt;
        let fade = 1.0 - particle.timer.fraction();
        sprite.color = sprite.color.with_alpha(fade);
        transform.scale = Vec3::splat(fade.max(0.05));
    }
}

/// Jitter the 2D camera while a shake is active, settling back to center.
pub fn apply_screen_shake(
    time: Res<Time>,
    mut shake: ResMut<ShakeState>,
    mut cameras: Query<&mut Transform, With<Camera2d>>,
) {
    let Ok(mut transform) = cameras.get_single_mut() else {
        return;
    };
    if shake.remaining > 0.0 {
        shake.remaining -= time.delta_secs();
        let falloff = (shake.remaining / SHAKE_SECS).max(0.0);
        transform.translation.x = (rand::random::<f32>() - 0.5) * SHAKE_AMPLITUDE * falloff;
        transform.translation.y = (rand::random::<f32>() - 0.5) * SHAKE_AMPLITUDE * falloff;
    } else if transform.translation.x != 0.0 || transform.translation.y != 0.0 {
        transform.translation.x = 0.0;
        transform.translation.y = 0.0;
    }
}

/// Scanlines follow the CRT setting.
pub fn sync_crt(
    settings: Res<SettingsStore>,
    mut stripes: Query<&mut Visibility, With<CrtStripe>>,
) {
    let visible = settings.data().crt_enabled;
    for mut visibility in &mut stripes {
        *visibility = if visible {
            Visibility::Visible
        } else {
            Visibility::Hidden
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_coordinates_map_into_world_space() {
        let mut window = Window::default();
        window.resolution.set(1200.0, 800.0);

        // Center column, stage top.
        let top = stage_to_world(&window, 0.5, 0.0);
        assert_eq!(top, Vec2::new(0.0, 400.0));

        // Left spawn column, halfway down.
        let mid = stage_to_world(&window, 0.10, 400.0);
        assert_eq!(mid, Vec2::new(-480.0, 0.0));

        let base = player_base_position(&window);
        assert_eq!(base, Vec2::new(0.0, -360.0));
    }
}
