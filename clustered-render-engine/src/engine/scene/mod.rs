//! Built-in scene content.
//!
//! A procedural atrium gives the renderers something to shade without any
//! external assets.

/// Floor, walls and pillar rows built from vertex-colored boxes, plus the camera.
pub mod atrium;
