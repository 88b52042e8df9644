//! Cluster grid definition and the CPU reference of light culling.
//!
//! The view frustum is split into `x * y` screen tiles and `z` exponential
//! depth slices. Cluster `(x, y, z)` has index `x + y * X + z * X * Y`, shared
//! by the culling pass and every shading pass. The GPU passes in
//! `engine::compute` run the same algorithm each frame. The CPU versions here
//! back the occupancy diagnostic and the tests.

/// Light-to-cluster assignment over disjoint per-cluster runs.
pub mod culling;

/// Frustum partitioning, fragment-to-cluster mapping and cluster bounds.
pub mod grid;
