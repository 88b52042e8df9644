//! Mesh pipeline and phase for the clustered geometry passes.

/// Specialised mesh pipelines for naive, Forward+ and G-buffer passes.
pub mod clustered_mesh_pipeline;
