//! GPU compute passes for clustered light culling.
//!
//! Both dispatches run in one compute pass ahead of shading each frame:
//!
//! 1. `cluster_bounds.wgsl` writes the view-space AABB of every cluster.
//! 2. `light_culling.wgsl` tests every active light against every cluster
//!    and fills the light grid and the global light index list.
//!
//! Each invocation owns one cluster and writes only that cluster's slots.
//!
//! ```wgsl
//! @group(0) @binding(0) var<uniform> cluster_view: ClusterView;
//! @group(0) @binding(1) var<storage, read> light_set: LightSet;
//! @group(0) @binding(2) var<storage, read> cluster_bounds: array<ClusterBounds>;
//! @group(0) @binding(3) var<storage, read_write> light_grid: array<LightGridEntry>;
//! @group(0) @binding(4) var<storage, read_write> light_indices: array<u32>;
//! ```

/// Cluster bounds and light assignment pipelines plus their graph node.
pub mod light_culling;
