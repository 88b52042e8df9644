use crate::engine::core::app_state::FpsText;
use crate::engine::lights::light_set::LightSet;
use crate::engine::systems::render_mode::RenderModeState;
use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;

/// Wall clock duration of the previous frame.
#[derive(Event, Clone, Copy, Debug, PartialEq)]
pub struct FrameTimed {
    pub frame_ms: f32,
}

pub fn emit_frame_timing(time: Res<Time<Real>>, mut frames: EventWriter<FrameTimed>) {
    let frame_ms = time.delta_secs() * 1000.0;
    if frame_ms > 0.0 {
        frames.write(FrameTimed { frame_ms });
    }
}

pub fn fps_text_update_system(
    diagnostics: Res<DiagnosticsStore>,
    mode: Res<RenderModeState>,
    lights: Res<LightSet>,
    mut frames: EventReader<FrameTimed>,
    mut last_frame_ms: Local<f32>,
    mut query: Query<&mut Text, With<FpsText>>,
) {
    if let Some(frame) = frames.read().last() {
        *last_frame_ms = frame.frame_ms;
    }

    let Some(fps) = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|fps| fps.smoothed())
    else {
        return;
    };

    for mut text in &mut query {
        text.0 = overlay_text(
            fps,
            *last_frame_ms,
            &mode.current_mode.to_string(),
            lights.active_count(),
        );
    }
}

fn overlay_text(fps: f64, frame_ms: f32, mode: &str, lights: u32) -> String {
    format!("FPS: {fps:.1} ({frame_ms:.2} ms)\n{mode} | {lights} lights")
}
