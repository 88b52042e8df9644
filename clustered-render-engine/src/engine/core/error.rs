use bevy::math::{UVec2, Vec3};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LightSetError {
    #[error("active light count {requested} exceeds light set capacity {capacity}")]
    ActiveCountOutOfRange { requested: u32, capacity: u32 },

    #[error("light set capacity must be greater than zero")]
    ZeroCapacity,

    #[error("light bounds are empty (min {min}, max {max})")]
    EmptyBounds { min: Vec3, max: Vec3 },

    #[error("light radius must be positive, got {0}")]
    InvalidRadius(f32),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClusterGridError {
    #[error("cluster grid dimensions must be non-zero, got {x}x{y}x{z}")]
    ZeroDimension { x: u32, y: u32, z: u32 },

    #[error("cluster grid {x}x{y}x{z} has more clusters than can be indexed")]
    TooManyClusters { x: u32, y: u32, z: u32 },

    #[error("cluster depth range requires 0 < near < far, got near {near} far {far}")]
    InvalidDepthRange { near: f32, far: f32 },

    #[error("vertical field of view must lie in (0, pi), got {0}")]
    InvalidFieldOfView(f32),

    #[error("aspect ratio must be positive, got {0}")]
    InvalidAspectRatio(f32),

    #[error("viewport must have a non-zero size, got {0}")]
    EmptyViewport(UVec2),

    #[error("projection cannot be inverted")]
    SingularProjection,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    LightSet(#[from] LightSetError),

    #[error(transparent)]
    ClusterGrid(#[from] ClusterGridError),

    #[error("max lights per cluster must be greater than zero")]
    ZeroLightsPerCluster,

    #[error("{clusters} clusters x {per_cluster} lights per cluster overflows the light index list")]
    LightIndexListTooLarge { clusters: u32, per_cluster: u32 },

    #[error("benchmark sweep needs at least one light count and one render mode")]
    EmptyBenchmarkSweep,

    #[error("benchmark light count {requested} exceeds light set capacity {capacity}")]
    BenchmarkLightCount { requested: u32, capacity: u32 },

    #[error("benchmark needs at least one sample frame")]
    ZeroSampleFrames,

    #[error("unknown render mode '{0}' (expected naive, forward+ or clustered deferred)")]
    UnknownRenderMode(String),

    #[error("failed to parse renderer config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum BenchmarkError {
    #[error("a benchmark is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to write benchmark results to {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShadingError {
    #[error("cannot allocate G-buffer targets for an empty viewport")]
    EmptyGBuffer,

    #[error("{buffer} needs {size} bytes but the device binds at most {limit}")]
    StorageTooLarge {
        buffer: &'static str,
        size: u64,
        limit: u64,
    },
}
