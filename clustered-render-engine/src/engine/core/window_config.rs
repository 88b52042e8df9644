use bevy::prelude::*;
use bevy::window::PresentMode;

/// Native windows present without vsync so frame timings reflect render cost.
pub fn create_window_config() -> Window {
    #[cfg(target_arch = "wasm32")]
    {
        Window {
            canvas: Some("#bevy".into()),
            fit_canvas_to_parent: true,
            prevent_default_event_handling: false,
            present_mode: PresentMode::AutoVsync,
            title: "Clustered Lighting".into(),
            ..default()
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        Window {
            present_mode: PresentMode::AutoNoVsync,
            title: "Clustered Lighting".into(),
            resolution: (1600.0, 900.0).into(),
            ..default()
        }
    }
}
