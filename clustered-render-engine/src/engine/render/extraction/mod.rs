//! Extraction systems copying main world state into the render world.
//!
//! Runs in Bevy's extract schedule each frame so the prepare systems and
//! render graph nodes see the current application state, camera phases and
//! light data.

/// State extraction for state-gated render systems.
pub mod app_state;

/// Per-camera clustered mesh phase management.
pub mod camera_phases;

/// Packed light set snapshot for GPU upload.
pub mod light_set;
