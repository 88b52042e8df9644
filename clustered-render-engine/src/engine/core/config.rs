use crate::engine::cluster::grid::ClusterDimensions;
use crate::engine::core::error::{ClusterGridError, ConfigError, LightSetError};
use crate::engine::systems::render_mode::RenderMode;
use bevy::prelude::*;
use bevy::render::extract_resource::ExtractResource;
use constants::{benchmark, cluster, lights};
use serde::{Deserialize, Serialize};

pub const RENDERER_CONFIG_PATH: &str = "config/renderer.json";

/// Renderer configuration, loaded from `assets/config/renderer.json`.
///
/// Every field is optional in the file; missing values fall back to the
/// defaults in the `constants` crate.
#[derive(Asset, TypePath, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RendererConfig {
    pub initial_mode: RenderMode,
    pub lights: LightConfig,
    pub clusters: ClusterConfig,
    pub benchmark: BenchmarkConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LightConfig {
    pub max_lights: u32,
    pub initial_lights: u32,
    pub radius: f32,
    pub intensity: f32,
    pub bounds_min: [f32; 3],
    pub bounds_max: [f32; 3],
    pub max_speed: f32,
    pub jitter: f32,
    pub seed: u64,
    pub count_step: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    pub dimensions: [u32; 3],
    pub max_lights_per_cluster: u32,
    pub far: f32,
    pub ambient: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub modes: Vec<RenderMode>,
    pub light_counts: Vec<u32>,
    pub settle_frames: u32,
    pub warmup_frames: u32,
    pub sample_frames: u32,
    pub output_dir: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            initial_mode: RenderMode::ClusteredDeferred,
            lights: LightConfig::default(),
            clusters: ClusterConfig::default(),
            benchmark: BenchmarkConfig::default(),
        }
    }
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            max_lights: lights::MAX_LIGHTS,
            initial_lights: lights::INITIAL_LIGHTS,
            radius: lights::LIGHT_RADIUS,
            intensity: lights::LIGHT_INTENSITY,
            bounds_min: lights::LIGHT_BOUNDS_MIN,
            bounds_max: lights::LIGHT_BOUNDS_MAX,
            max_speed: lights::LIGHT_MAX_SPEED,
            jitter: lights::LIGHT_JITTER,
            seed: lights::LIGHT_SEED,
            count_step: lights::LIGHT_COUNT_STEP,
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            dimensions: [
                cluster::CLUSTER_DIMENSIONS_X,
                cluster::CLUSTER_DIMENSIONS_Y,
                cluster::CLUSTER_DIMENSIONS_Z,
            ],
            max_lights_per_cluster: cluster::MAX_LIGHTS_PER_CLUSTER,
            far: cluster::CLUSTER_FAR,
            ambient: lights::AMBIENT_LIGHT,
        }
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            modes: RenderMode::ALL.to_vec(),
            light_counts: (benchmark::LIGHT_COUNT_START..=benchmark::LIGHT_COUNT_END)
                .step_by(benchmark::LIGHT_COUNT_STEP as usize)
                .collect(),
            settle_frames: benchmark::SETTLE_FRAMES,
            warmup_frames: benchmark::WARMUP_FRAMES,
            sample_frames: benchmark::SAMPLE_FRAMES,
            output_dir: benchmark::DEFAULT_OUTPUT_DIR.to_string(),
        }
    }
}

impl RendererConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: RendererConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.lights.validate()?;
        self.clusters.validate()?;
        self.benchmark.validate(self.lights.max_lights)?;
        Ok(())
    }
}

impl LightConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_lights == 0 {
            return Err(LightSetError::ZeroCapacity.into());
        }
        if self.initial_lights > self.max_lights {
            return Err(LightSetError::ActiveCountOutOfRange {
                requested: self.initial_lights,
                capacity: self.max_lights,
            }
            .into());
        }
        if !(self.radius > 0.0) {
            return Err(LightSetError::InvalidRadius(self.radius).into());
        }
        let min = Vec3::from_array(self.bounds_min);
        let max = Vec3::from_array(self.bounds_max);
        if !min.cmplt(max).all() {
            return Err(LightSetError::EmptyBounds { min, max }.into());
        }
        Ok(())
    }
}

impl ClusterConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let [x, y, z] = self.dimensions;
        let dimensions = ClusterDimensions::new(x, y, z);
        dimensions.validate()?;
        if self.max_lights_per_cluster == 0 {
            return Err(ConfigError::ZeroLightsPerCluster);
        }
        // Run offsets are u32 on the GPU.
        let clusters = dimensions.cluster_count();
        if clusters.checked_mul(self.max_lights_per_cluster).is_none() {
            return Err(ConfigError::LightIndexListTooLarge {
                clusters,
                per_cluster: self.max_lights_per_cluster,
            });
        }
        if !(self.far > 0.0) {
            return Err(ClusterGridError::InvalidDepthRange {
                near: 0.0,
                far: self.far,
            }
            .into());
        }
        Ok(())
    }
}

impl BenchmarkConfig {
    fn validate(&self, capacity: u32) -> Result<(), ConfigError> {
        if self.modes.is_empty() || self.light_counts.is_empty() {
            return Err(ConfigError::EmptyBenchmarkSweep);
        }
        if let Some(&requested) = self.light_counts.iter().find(|&&n| n > capacity) {
            return Err(ConfigError::BenchmarkLightCount {
                requested,
                capacity,
            });
        }
        if self.sample_frames == 0 {
            return Err(ConfigError::ZeroSampleFrames);
        }
        Ok(())
    }
}

/// Cluster parameters shared by the culling and shading passes.
/// Extracted to the render world every frame.
#[derive(Resource, Clone, Debug, PartialEq, ExtractResource)]
pub struct ClusterSettings {
    pub dimensions: ClusterDimensions,
    pub max_lights_per_cluster: u32,
    pub far: f32,
    pub ambient: f32,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self::from(&ClusterConfig::default())
    }
}

impl From<&ClusterConfig> for ClusterSettings {
    fn from(config: &ClusterConfig) -> Self {
        let [x, y, z] = config.dimensions;
        Self {
            dimensions: ClusterDimensions::new(x, y, z),
            max_lights_per_cluster: config.max_lights_per_cluster,
            far: config.far,
            ambient: config.ambient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        RendererConfig::default().validate().unwrap();
    }

    #[test]
    fn default_sweep_covers_ten_light_counts() {
        let sweep = BenchmarkConfig::default();
        assert_eq!(sweep.light_counts.len(), 10);
        assert_eq!(sweep.light_counts.first(), Some(&500));
        assert_eq!(sweep.light_counts.last(), Some(&5000));
        assert_eq!(sweep.modes.len(), 3);
    }

    #[test]
    fn shipped_config_parses() {
        let json = include_str!("../../../assets/config/renderer.json");
        let config = RendererConfig::from_json_str(json).unwrap();
        assert_eq!(config.lights.max_lights, lights::MAX_LIGHTS);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config =
            RendererConfig::from_json_str(r#"{ "lights": { "initial_lights": 42 } }"#).unwrap();
        assert_eq!(config.lights.initial_lights, 42);
        assert_eq!(config.lights.max_lights, lights::MAX_LIGHTS);
        assert_eq!(config.clusters, ClusterConfig::default());
    }

    #[test]
    fn initial_lights_above_capacity_is_rejected() {
        let result = RendererConfig::from_json_str(
            r#"{ "lights": { "max_lights": 10, "initial_lights": 11 } }"#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::LightSet(LightSetError::ActiveCountOutOfRange {
                requested: 11,
                capacity: 10
            }))
        ));
    }

    #[test]
    fn degenerate_cluster_grid_is_rejected() {
        let result =
            RendererConfig::from_json_str(r#"{ "clusters": { "dimensions": [16, 0, 24] } }"#);
        assert!(matches!(
            result,
            Err(ConfigError::ClusterGrid(ClusterGridError::ZeroDimension { .. }))
        ));

        let result =
            RendererConfig::from_json_str(r#"{ "clusters": { "max_lights_per_cluster": 0 } }"#);
        assert!(matches!(result, Err(ConfigError::ZeroLightsPerCluster)));
    }

    #[test]
    fn oversized_cluster_grid_is_rejected() {
        let result =
            RendererConfig::from_json_str(r#"{ "clusters": { "dimensions": [65536, 65536, 2] } }"#);
        assert!(matches!(
            result,
            Err(ConfigError::ClusterGrid(ClusterGridError::TooManyClusters {
                x: 65536,
                y: 65536,
                z: 2
            }))
        ));

        let result = RendererConfig::from_json_str(
            r#"{ "clusters": { "dimensions": [1024, 1024, 64], "max_lights_per_cluster": 256 } }"#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::LightIndexListTooLarge {
                clusters: 67_108_864,
                per_cluster: 256
            })
        ));
    }

    #[test]
    fn benchmark_counts_must_fit_capacity() {
        let result = RendererConfig::from_json_str(
            r#"{ "lights": { "max_lights": 1000, "initial_lights": 10 } }"#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::BenchmarkLightCount {
                requested: 1500,
                capacity: 1000
            })
        ));
    }

    #[test]
    fn malformed_json_reports_parse_error() {
        let result = RendererConfig::from_json_str("{ \"lights\": ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
