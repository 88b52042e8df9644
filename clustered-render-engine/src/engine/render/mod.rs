//! Render world side of the clustered lighting engine.
//!
//! Owns the GPU storage for lights and per-cluster light lists, the clustered
//! mesh phase and its pipelines, and the shading renderers. Light culling
//! itself lives in `engine::compute`.

/// Light set, light grid, index list and cluster bounds buffers plus the
/// per-view bind groups over them.
pub mod cluster_buffers;

/// Plugin registering extraction, prepare and queue systems and graph nodes.
pub mod clustered_render_plugin;

/// Main world to render world extraction.
pub mod extraction;

/// Clustered mesh phase and its specialised pipelines.
pub mod pipeline;

/// Naive, Forward+ and clustered deferred renderers.
pub mod shading;
