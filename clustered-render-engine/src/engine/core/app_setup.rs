use bevy::asset::AssetMetaCheck;
use bevy::diagnostic::FrameTimeDiagnosticsPlugin;
use bevy::prelude::*;
use bevy::time::TimeSystem;
use bevy_common_assets::json::JsonAssetPlugin;

use crate::engine::camera::viewport_camera::{ViewportCamera, camera_controller};
use crate::engine::core::app_state::{AppState, FpsText, transition_to_running};
use crate::engine::core::cli::LaunchOptions;
use crate::engine::core::config::RendererConfig;
use crate::engine::core::window_config::create_window_config;
use crate::engine::loading::config_loader::{ConfigLoader, apply_config_system, start_loading};
use crate::engine::render::clustered_render_plugin::ClusteredRenderPlugin;
use crate::engine::scene::atrium::{spawn_atrium, spawn_camera};
use crate::engine::systems::{
    benchmark::{
        BenchmarkState, run_benchmark_system, start_benchmark_on_key, start_benchmark_on_launch,
    },
    cluster_diagnostics::cluster_diagnostics_system,
    fps_tracking::{FrameTimed, emit_frame_timing, fps_text_update_system},
    light_controls::{advance_lights, light_count_controls},
    render_mode::{RenderModeState, render_mode_system},
};

pub fn create_app(options: LaunchOptions) -> App {
    let mut app = App::new();

    app.add_plugins(create_default_plugins())
        .init_state::<AppState>()
        .add_plugins(FrameTimeDiagnosticsPlugin::default())
        // Registers RendererConfig as a loadable asset type from JSON files.
        .add_plugins(JsonAssetPlugin::<RendererConfig>::new(&["json"]))
        .add_plugins(ClusteredRenderPlugin);

    app.insert_resource(options)
        .init_resource::<ConfigLoader>()
        .init_resource::<RenderModeState>()
        .init_resource::<BenchmarkState>()
        .init_resource::<ViewportCamera>()
        .add_event::<FrameTimed>();

    app.add_systems(
        Startup,
        (setup, spawn_camera, spawn_atrium, start_loading).chain(),
    )
    .add_systems(
        Update,
        (apply_config_system, transition_to_running)
            .chain()
            .run_if(in_state(AppState::Loading)),
    )
    .add_systems(OnEnter(AppState::Running), start_benchmark_on_launch);

    // After the clock update, before any reader.
    app.add_systems(First, emit_frame_timing.after(TimeSystem));

    let runtime_systems = (
        camera_controller,
        render_mode_system,
        light_count_controls,
        start_benchmark_on_key,
        run_benchmark_system,
        advance_lights,
        cluster_diagnostics_system,
    )
        .chain();

    app.add_systems(Update, runtime_systems.run_if(in_state(AppState::Running)));

    #[cfg(not(target_arch = "wasm32"))]
    {
        app.add_systems(
            Update,
            fps_text_update_system.run_if(in_state(AppState::Running)),
        );
    }

    app
}

fn setup(mut commands: Commands) {
    #[cfg(not(target_arch = "wasm32"))]
    {
        create_native_overlays(&mut commands);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn create_native_overlays(commands: &mut Commands) {
    commands
        .spawn(Node {
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            ..default()
        })
        .with_children(|parent| {
            parent.spawn((
                Text::new("FPS: "),
                TextFont {
                    font_size: 16.0,
                    ..default()
                },
                TextColor(Color::srgb(1., 0.85, 0.2)),
                Node {
                    position_type: PositionType::Absolute,
                    bottom: Val::Px(12.0),
                    right: Val::Px(12.0),
                    ..default()
                },
                FpsText,
            ));
        });
}

fn create_default_plugins() -> impl PluginGroup {
    let window_config = WindowPlugin {
        primary_window: Some(create_window_config()),
        ..default()
    };

    let asset_config = AssetPlugin {
        meta_check: AssetMetaCheck::Never,
        ..default()
    };

    DefaultPlugins.set(window_config).set(asset_config)
}
