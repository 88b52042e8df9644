//! Point light storage, animation and GPU packing.
//!
//! The light set is the single writer of light data. Every renderer reads the
//! packed buffer it produces:
//!
//! ```wgsl
//! struct PointLight {
//!     position: vec3<f32>,
//!     radius: f32,
//!     color: vec3<f32>,
//!     intensity: f32,
//! }
//!
//! struct LightSet {
//!     num_lights: u32,
//!     lights: array<PointLight>,   // offset 16
//! }
//! ```

/// Fixed-capacity light storage with a bounded random walk.
pub mod light_set;
