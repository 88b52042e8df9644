/// Screen tiles along x.
pub const CLUSTER_DIMENSIONS_X: u32 = 16;
/// Screen tiles along y.
pub const CLUSTER_DIMENSIONS_Y: u32 = 9;
/// Exponential depth slices between the cluster near and far planes.
pub const CLUSTER_DIMENSIONS_Z: u32 = 24;

/// Fixed run length reserved per cluster in the global light index list.
/// Intersecting lights beyond this count are dropped for that cluster.
pub const MAX_LIGHTS_PER_CLUSTER: u32 = 256;

/// Far plane used for depth slicing. The camera projection itself may be infinite.
pub const CLUSTER_FAR: f32 = 100.0;

/// Far face of the last depth slice. Fragments beyond `CLUSTER_FAR` clamp into
/// that slice, so its bounds reach past anything the camera can see.
/// `cluster_bounds.wgsl` uses the same value.
pub const LAST_SLICE_FAR_DEPTH: f32 = 1.0e30;

pub const CLUSTER_BOUNDS_WORKGROUP_SIZE: u32 = 64;
pub const LIGHT_CULLING_WORKGROUP_SIZE: u32 = 64;
