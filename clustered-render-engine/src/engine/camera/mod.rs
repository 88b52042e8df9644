//! Viewport camera for scene navigation.
//!
//! Fly-style controls: right mouse drag looks around, WASD moves, QE moves
//! down and up, the wheel dollies along the view direction.

/// Viewport camera resource and controller system.
pub mod viewport_camera;
