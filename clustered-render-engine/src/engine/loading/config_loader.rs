use crate::engine::core::cli::LaunchOptions;
use crate::engine::core::config::{ClusterSettings, RENDERER_CONFIG_PATH, RendererConfig};
use crate::engine::core::error::{ConfigError, LightSetError};
use crate::engine::lights::light_set::LightSet;
use crate::engine::systems::benchmark::BenchmarkSettings;
use crate::engine::systems::light_controls::LightControls;
use crate::engine::systems::render_mode::RenderModeState;
use bevy::asset::LoadState;
use bevy::prelude::*;

#[derive(Resource, Default)]
pub struct ConfigLoader {
    handle: Option<Handle<RendererConfig>>,
    applied: bool,
}

impl ConfigLoader {
    pub fn is_applied(&self) -> bool {
        self.applied
    }
}

// Kick off the config load
pub fn start_loading(
    mut config_loader: ResMut<ConfigLoader>,
    options: Res<LaunchOptions>,
    asset_server: Res<AssetServer>,
) {
    let path = options
        .config
        .clone()
        .unwrap_or_else(|| RENDERER_CONFIG_PATH.to_string());
    info!("Loading renderer config from {}", path);
    config_loader.handle = Some(asset_server.load(path));
}

/// Fold command line overrides into a loaded config and re-validate it.
pub fn apply_launch_options(
    config: &mut RendererConfig,
    options: &LaunchOptions,
) -> Result<(), ConfigError> {
    if let Some(mode) = options.mode {
        config.initial_mode = mode;
    }
    if let Some(lights) = options.lights {
        if lights > config.lights.max_lights {
            return Err(LightSetError::ActiveCountOutOfRange {
                requested: lights,
                capacity: config.lights.max_lights,
            }
            .into());
        }
        config.lights.initial_lights = lights;
    }
    if let Some(output) = &options.output {
        config.benchmark.output_dir = output.to_string_lossy().into_owned();
    }
    config.validate()
}

/// Resolve the config to run with. Falls back to the defaults (plus
/// overrides) when the file is missing or invalid, and to the bare defaults
/// when the overrides themselves are rejected.
pub fn resolve_config(loaded: Option<&RendererConfig>, options: &LaunchOptions) -> RendererConfig {
    let mut config = match loaded {
        Some(loaded) => match loaded.validate() {
            Ok(()) => loaded.clone(),
            Err(err) => {
                warn!("Renderer config rejected ({}), using defaults", err);
                RendererConfig::default()
            }
        },
        None => RendererConfig::default(),
    };

    let mut overridden = config.clone();
    match apply_launch_options(&mut overridden, options) {
        Ok(()) => overridden,
        Err(err) => {
            warn!("Ignoring launch options: {}", err);
            if let Some(mode) = options.mode {
                config.initial_mode = mode;
            }
            config
        }
    }
}

fn insert_runtime_resources(
    commands: &mut Commands,
    config: &RendererConfig,
    options: &LaunchOptions,
) -> Result<(), ConfigError> {
    let light_set = LightSet::new(&config.lights)?;
    info!(
        "✓ Renderer configured: {} of {} lights, {:?} clusters, starting in {}",
        light_set.active_count(),
        light_set.capacity(),
        config.clusters.dimensions,
        config.initial_mode
    );

    commands.insert_resource(light_set);
    commands.insert_resource(ClusterSettings::from(&config.clusters));
    commands.insert_resource(RenderModeState {
        current_mode: config.initial_mode,
    });
    commands.insert_resource(LightControls {
        count_step: config.lights.count_step,
    });
    commands.insert_resource(BenchmarkSettings::new(
        config.benchmark.clone(),
        options.benchmark,
    ));
    Ok(())
}

/// Wait for the config asset, then derive the runtime resources from it.
pub fn apply_config_system(
    mut config_loader: ResMut<ConfigLoader>,
    mut commands: Commands,
    options: Res<LaunchOptions>,
    asset_server: Res<AssetServer>,
    configs: Res<Assets<RendererConfig>>,
) {
    if config_loader.applied {
        return;
    }
    let Some(handle) = config_loader.handle.clone() else {
        return;
    };

    let config = if let Some(loaded) = configs.get(&handle) {
        resolve_config(Some(loaded), &options)
    } else if let LoadState::Failed(err) = asset_server.load_state(handle.id()) {
        warn!("Renderer config failed to load ({}), using defaults", err);
        resolve_config(None, &options)
    } else {
        return;
    };

    match insert_runtime_resources(&mut commands, &config, &options) {
        Ok(()) => config_loader.applied = true,
        Err(err) => {
            error!("Renderer config could not be applied: {}", err);
            config_loader.handle = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::systems::render_mode::RenderMode;
    use std::path::PathBuf;

    #[test]
    fn overrides_replace_config_values() {
        let mut config = RendererConfig::default();
        let options = LaunchOptions {
            mode: Some(RenderMode::Naive),
            lights: Some(1200),
            output: Some(PathBuf::from("out")),
            ..Default::default()
        };
        apply_launch_options(&mut config, &options).unwrap();

        assert_eq!(config.initial_mode, RenderMode::Naive);
        assert_eq!(config.lights.initial_lights, 1200);
        assert_eq!(config.benchmark.output_dir, "out");
    }

    #[test]
    fn light_override_above_capacity_is_rejected() {
        let mut config = RendererConfig::default();
        let capacity = config.lights.max_lights;
        let options = LaunchOptions {
            lights: Some(capacity + 1),
            ..Default::default()
        };
        let result = apply_launch_options(&mut config, &options);
        assert!(matches!(
            result,
            Err(ConfigError::LightSet(LightSetError::ActiveCountOutOfRange { .. }))
        ));
        assert_eq!(
            config.lights.initial_lights,
            RendererConfig::default().lights.initial_lights
        );
    }

    #[test]
    fn missing_file_resolves_to_defaults_with_overrides() {
        let options = LaunchOptions {
            mode: Some(RenderMode::ForwardPlus),
            ..Default::default()
        };
        let config = resolve_config(None, &options);
        assert_eq!(config.initial_mode, RenderMode::ForwardPlus);
        assert_eq!(config.lights, RendererConfig::default().lights);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let mut broken = RendererConfig::default();
        broken.clusters.max_lights_per_cluster = 0;
        let config = resolve_config(Some(&broken), &LaunchOptions::default());
        assert_eq!(config, RendererConfig::default());
    }

    #[test]
    fn rejected_override_keeps_mode_choice() {
        let options = LaunchOptions {
            mode: Some(RenderMode::Naive),
            lights: Some(u32::MAX),
            ..Default::default()
        };
        let config = resolve_config(None, &options);
        assert_eq!(config.initial_mode, RenderMode::Naive);
        assert_eq!(
            config.lights.initial_lights,
            RendererConfig::default().lights.initial_lights
        );
        config.validate().unwrap();
    }
}
