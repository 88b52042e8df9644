//! Shading passes for the three renderers.
//!
//! The render world holds exactly one [`renderer::ShadingRenderer`]. Naive and
//! Forward+ draw the clustered mesh phase straight into the view target.
//! Clustered deferred draws the same phase into a G-buffer, then lights it with
//! a full-screen compose pass.

/// Full-screen compose pipeline for the deferred renderer.
pub mod deferred;

/// Render graph node encoding the active renderer.
pub mod node;

/// Renderer variants, their GPU resources and the stop-then-start switch.
pub mod renderer;
