//! Main-world runtime systems for renderer control and diagnostics.
//!
//! Mode switching, light animation and count controls, frame timing, the
//! benchmark harness and the cluster occupancy report.

/// Benchmark sweep over render modes and light counts with CSV export.
///
/// Drives mode switches and light counts frame by frame from `FrameTimed` events.
pub mod benchmark;

/// On-demand CPU culling of the current view, logging cluster occupancy.
pub mod cluster_diagnostics;

/// Per-frame wall clock timing and the native FPS overlay.
pub mod fps_tracking;

/// Light animation and keyboard control of the active light count.
pub mod light_controls;

/// Render mode state and keyboard switching between the three renderers.
pub mod render_mode;
