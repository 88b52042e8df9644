use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::math::EulerRot;
use bevy::prelude::*;

const YAW_SENSITIVITY: f32 = 0.0035;
const PITCH_SENSITIVITY: f32 = 0.0030;
const PITCH_LIMIT: f32 = 1.55;

#[derive(Resource, Clone, Debug)]
pub struct ViewportCamera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub move_speed: f32,
    pub dolly_speed: f32,
}

impl ViewportCamera {
    /// Start from an existing transform, keeping its heading.
    pub fn from_transform(transform: &Transform) -> Self {
        let (yaw, pitch, _) = transform.rotation.to_euler(EulerRot::YXZ);
        Self {
            position: transform.translation,
            yaw,
            pitch: pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            ..default()
        }
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }

    pub fn look(&mut self, mouse_delta: Vec2) {
        self.yaw -= mouse_delta.x * YAW_SENSITIVITY;
        self.pitch =
            (self.pitch - mouse_delta.y * PITCH_SENSITIVITY).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Move in camera-relative axes: x right, y world up, z backwards.
    pub fn translate(&mut self, move_input: Vec3, distance: f32) {
        if move_input == Vec3::ZERO {
            return;
        }
        let rotation = self.rotation();
        let right = rotation * Vec3::X;
        let backward = rotation * Vec3::Z;
        let world_delta = right * move_input.x + Vec3::Y * move_input.y + backward * move_input.z;
        self.position += world_delta.normalize_or_zero() * distance;
    }
}

impl Default for ViewportCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 4.0, 20.0),
            yaw: 0.0,
            pitch: -0.2,
            move_speed: 8.0,
            dolly_speed: 1.5,
        }
    }
}

pub fn camera_controller(
    mut camera_query: Query<&mut Transform, With<Camera3d>>,
    mut viewport_camera: ResMut<ViewportCamera>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut mouse_motion: EventReader<MouseMotion>,
    mut scroll_events: EventReader<MouseWheel>,
    keyboard: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
) {
    let Ok(mut camera_transform) = camera_query.single_mut() else {
        return;
    };

    let mouse_delta: Vec2 = mouse_motion.read().map(|m| m.delta).sum();
    if mouse_button.pressed(MouseButton::Right) && mouse_delta != Vec2::ZERO {
        viewport_camera.look(mouse_delta);
    }

    let scroll: f32 = scroll_events
        .read()
        .map(|ev| match ev.unit {
            MouseScrollUnit::Line => ev.y,
            MouseScrollUnit::Pixel => ev.y * 0.05,
        })
        .sum();
    if scroll.abs() > f32::EPSILON {
        let dolly = viewport_camera.dolly_speed;
        viewport_camera.translate(Vec3::NEG_Z, scroll * dolly);
    }

    let mut move_input = Vec3::ZERO;
    if keyboard.pressed(KeyCode::KeyW) {
        move_input.z -= 1.0;
    }
    if keyboard.pressed(KeyCode::KeyS) {
        move_input.z += 1.0;
    }
    if keyboard.pressed(KeyCode::KeyD) {
        move_input.x += 1.0;
    }
    if keyboard.pressed(KeyCode::KeyA) {
        move_input.x -= 1.0;
    }
    if keyboard.pressed(KeyCode::KeyE) {
        move_input.y += 1.0;
    }
    if keyboard.pressed(KeyCode::KeyQ) {
        move_input.y -= 1.0;
    }

    // Shift = faster, ctrl = slower
    let mut speed = viewport_camera.move_speed;
    if keyboard.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]) {
        speed *= 3.5;
    }
    if keyboard.any_pressed([KeyCode::ControlLeft, KeyCode::ControlRight]) {
        speed *= 0.25;
    }
    viewport_camera.translate(move_input, speed * time.delta_secs());

    let lerp_speed = (12.0 * time.delta_secs()).min(1.0);
    camera_transform.translation = camera_transform
        .translation
        .lerp(viewport_camera.position, lerp_speed);
    camera_transform.rotation = camera_transform
        .rotation
        .slerp(viewport_camera.rotation(), lerp_speed);
}
