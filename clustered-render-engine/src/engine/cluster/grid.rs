use crate::engine::core::error::ClusterGridError;
use bevy::prelude::*;
use bytemuck::{Pod, Zeroable};
use constants::cluster::LAST_SLICE_FAR_DEPTH;
use rayon::prelude::*;
use std::f32::consts::PI;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClusterDimensions {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl ClusterDimensions {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Total cluster count, saturating at `u32::MAX` for grids that
    /// [`Self::checked_cluster_count`] rejects.
    pub fn cluster_count(&self) -> u32 {
        self.checked_cluster_count().unwrap_or(u32::MAX)
    }

    pub fn checked_cluster_count(&self) -> Option<u32> {
        self.x.checked_mul(self.y)?.checked_mul(self.z)
    }

    pub fn to_array(&self) -> [u32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn validate(&self) -> Result<(), ClusterGridError> {
        if self.x == 0 || self.y == 0 || self.z == 0 {
            return Err(ClusterGridError::ZeroDimension {
                x: self.x,
                y: self.y,
                z: self.z,
            });
        }
        if self.checked_cluster_count().is_none() {
            return Err(ClusterGridError::TooManyClusters {
                x: self.x,
                y: self.y,
                z: self.z,
            });
        }
        Ok(())
    }
}

/// View-space bounding box of one cluster. View space looks down -Z, so
/// `max.z` is the near face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClusterAabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl ClusterAabb {
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for point in points {
            min = min.min(point);
            max = max.max(point);
        }
        Self { min, max }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Sphere-vs-box test against the closest point on the box.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let closest = center.clamp(self.min, self.max);
        closest.distance_squared(center) <= radius * radius
    }
}

/// Perspective parameters matching Bevy's `PerspectiveProjection`, which builds
/// an infinite reversed-Z projection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerspectiveParams {
    pub fov_y: f32,
    pub aspect_ratio: f32,
    pub near: f32,
}

impl PerspectiveParams {
    pub fn clip_from_view(&self) -> Mat4 {
        Mat4::perspective_infinite_reverse_rh(self.fov_y, self.aspect_ratio, self.near)
    }
}

/// Partition of the view frustum into `x * y` screen tiles and `z`
/// exponentially spaced depth slices between `near` and `far`.
#[derive(Clone, Debug)]
pub struct ClusterGrid {
    dimensions: ClusterDimensions,
    near: f32,
    far: f32,
    viewport: Vec2,
    view_from_clip: Mat4,
    log_depth_ratio: f32,
}

impl ClusterGrid {
    pub fn new(
        dimensions: ClusterDimensions,
        projection: PerspectiveParams,
        far: f32,
        viewport: UVec2,
    ) -> Result<Self, ClusterGridError> {
        if !(projection.fov_y > 0.0 && projection.fov_y < PI) {
            return Err(ClusterGridError::InvalidFieldOfView(projection.fov_y));
        }
        if !(projection.aspect_ratio > 0.0) {
            return Err(ClusterGridError::InvalidAspectRatio(projection.aspect_ratio));
        }
        Self::from_projection(
            dimensions,
            projection.clip_from_view(),
            projection.near,
            far,
            viewport,
        )
    }

    /// Build from an explicit projection matrix, as extracted from a render view.
    pub fn from_projection(
        dimensions: ClusterDimensions,
        clip_from_view: Mat4,
        near: f32,
        far: f32,
        viewport: UVec2,
    ) -> Result<Self, ClusterGridError> {
        dimensions.validate()?;
        if !(near > 0.0 && far > near && far.is_finite()) {
            return Err(ClusterGridError::InvalidDepthRange { near, far });
        }
        if viewport.x == 0 || viewport.y == 0 {
            return Err(ClusterGridError::EmptyViewport(viewport));
        }
        let determinant = clip_from_view.determinant();
        if determinant == 0.0 || !determinant.is_finite() {
            return Err(ClusterGridError::SingularProjection);
        }

        Ok(Self {
            dimensions,
            near,
            far,
            viewport: viewport.as_vec2(),
            view_from_clip: clip_from_view.inverse(),
            log_depth_ratio: (far / near).ln(),
        })
    }

    pub fn dimensions(&self) -> ClusterDimensions {
        self.dimensions
    }

    pub fn cluster_count(&self) -> u32 {
        self.dimensions.cluster_count()
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub fn view_from_clip(&self) -> Mat4 {
        self.view_from_clip
    }

    /// View depth where slice `slice` begins: `near * (far / near)^(slice / z)`.
    pub fn slice_near_depth(&self, slice: u32) -> f32 {
        if slice >= self.dimensions.z {
            return self.far;
        }
        self.near * (self.log_depth_ratio * slice as f32 / self.dimensions.z as f32).exp()
    }

    /// View depth of the far face of slice `slice`'s bounds. The last slice
    /// is unbounded since every depth past `far` resolves to it.
    pub fn slice_far_depth(&self, slice: u32) -> f32 {
        if slice + 1 >= self.dimensions.z {
            return LAST_SLICE_FAR_DEPTH;
        }
        self.slice_near_depth(slice + 1)
    }

    /// Depth slice containing a positive view depth. A depth lying exactly on a
    /// slice boundary belongs to the farther slice. Depths outside
    /// `[near, far)` clamp to the first or last slice.
    pub fn depth_slice(&self, depth: f32) -> u32 {
        let last = self.dimensions.z - 1;
        if !(depth > self.near) {
            return 0;
        }
        if depth >= self.far {
            return last;
        }

        let estimate =
            ((depth / self.near).ln() / self.log_depth_ratio * self.dimensions.z as f32).floor();
        let mut slice = (estimate.max(0.0) as u32).min(last);

        // The log estimate can land one slice off near boundaries.
        if slice > 0 && depth < self.slice_near_depth(slice) {
            slice -= 1;
        } else if slice < last && depth >= self.slice_near_depth(slice + 1) {
            slice += 1;
        }
        slice
    }

    /// Screen tile for a pixel position measured from the top-left of the viewport.
    pub fn tile(&self, pixel: Vec2) -> UVec2 {
        let scaled = (pixel / self.viewport)
            * Vec2::new(self.dimensions.x as f32, self.dimensions.y as f32);
        let tile = scaled.floor().max(Vec2::ZERO);
        UVec2::new(
            (tile.x as u32).min(self.dimensions.x - 1),
            (tile.y as u32).min(self.dimensions.y - 1),
        )
    }

    pub fn cluster_index(&self, coords: UVec3) -> u32 {
        coords.x + coords.y * self.dimensions.x + coords.z * self.dimensions.x * self.dimensions.y
    }

    pub fn cluster_coords(&self, index: u32) -> UVec3 {
        let per_slice = self.dimensions.x * self.dimensions.y;
        UVec3::new(
            index % self.dimensions.x,
            (index % per_slice) / self.dimensions.x,
            index / per_slice,
        )
    }

    /// Resolve the cluster of a fragment from its pixel position and view depth.
    pub fn cluster_at(&self, pixel: Vec2, depth: f32) -> u32 {
        let tile = self.tile(pixel);
        self.cluster_index(tile.extend(self.depth_slice(depth)))
    }

    /// View-space ray through an NDC position, scaled so that `z == -1`.
    fn tile_ray(&self, ndc: Vec2) -> Vec3 {
        // Reversed-Z: NDC depth 1 is the near plane.
        let on_near_plane = self.view_from_clip * Vec4::new(ndc.x, ndc.y, 1.0, 1.0);
        let point = on_near_plane.xyz() / on_near_plane.w;
        point / -point.z
    }

    pub fn cluster_aabb(&self, index: u32) -> ClusterAabb {
        let coords = self.cluster_coords(index);
        let dims = Vec2::new(self.dimensions.x as f32, self.dimensions.y as f32);

        let min_ndc = Vec2::new(
            coords.x as f32 / dims.x * 2.0 - 1.0,
            1.0 - (coords.y + 1) as f32 / dims.y * 2.0,
        );
        let max_ndc = Vec2::new(
            (coords.x + 1) as f32 / dims.x * 2.0 - 1.0,
            1.0 - coords.y as f32 / dims.y * 2.0,
        );

        let rays = [
            self.tile_ray(min_ndc),
            self.tile_ray(Vec2::new(max_ndc.x, min_ndc.y)),
            self.tile_ray(Vec2::new(min_ndc.x, max_ndc.y)),
            self.tile_ray(max_ndc),
        ];
        let near_depth = self.slice_near_depth(coords.z);
        let far_depth = self.slice_far_depth(coords.z);

        ClusterAabb::from_points(
            rays.iter()
                .flat_map(|ray| [*ray * near_depth, *ray * far_depth]),
        )
    }

    pub fn compute_bounds(&self) -> ClusterBounds {
        let aabbs = (0..self.cluster_count())
            .into_par_iter()
            .map(|index| self.cluster_aabb(index))
            .collect();
        ClusterBounds {
            dimensions: self.dimensions,
            aabbs,
        }
    }

    pub fn uniform(
        &self,
        view_from_world: Mat4,
        max_lights_per_cluster: u32,
        ambient: f32,
    ) -> ClusterViewUniform {
        ClusterViewUniform {
            view_from_world: view_from_world.to_cols_array_2d(),
            view_from_clip: self.view_from_clip.to_cols_array_2d(),
            viewport_size: self.viewport.to_array(),
            z_near: self.near,
            z_far: self.far,
            dimensions: self.dimensions.to_array(),
            max_lights_per_cluster,
            ambient,
            _padding: [0.0; 3],
        }
    }
}

/// Per-cluster bounds for one grid. Only produced by [`ClusterGrid::compute_bounds`].
#[derive(Clone, Debug)]
pub struct ClusterBounds {
    dimensions: ClusterDimensions,
    aabbs: Vec<ClusterAabb>,
}

impl ClusterBounds {
    pub fn dimensions(&self) -> ClusterDimensions {
        self.dimensions
    }

    pub fn aabbs(&self) -> &[ClusterAabb] {
        &self.aabbs
    }
}

/// Camera and grid parameters shared by every clustered pass.
///
/// ```wgsl
/// struct ClusterView {
///     view_from_world: mat4x4<f32>,
///     view_from_clip: mat4x4<f32>,
///     viewport_size: vec2<f32>,
///     z_near: f32,
///     z_far: f32,
///     dimensions: vec3<u32>,
///     max_lights_per_cluster: u32,
///     ambient: f32,
/// }
/// ```
#[repr(C)]
#[derive(Pod, Zeroable, Copy, Clone, Debug, PartialEq)]
pub struct ClusterViewUniform {
    pub view_from_world: [[f32; 4]; 4],
    pub view_from_clip: [[f32; 4]; 4],
    pub viewport_size: [f32; 2],
    pub z_near: f32,
    pub z_far: f32,
    pub dimensions: [u32; 3],
    pub max_lights_per_cluster: u32,
    pub ambient: f32,
    pub _padding: [f32; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIMS: ClusterDimensions = ClusterDimensions::new(16, 9, 24);
    const VIEWPORT: UVec2 = UVec2::new(1600, 900);

    fn projection() -> PerspectiveParams {
        PerspectiveParams {
            fov_y: PI / 4.0,
            aspect_ratio: 16.0 / 9.0,
            near: 0.1,
        }
    }

    fn grid() -> ClusterGrid {
        ClusterGrid::new(DIMS, projection(), 100.0, VIEWPORT).unwrap()
    }

    /// Project a view-space point to top-left pixel coordinates.
    fn to_pixel(point: Vec3) -> Vec2 {
        let clip = projection().clip_from_view() * point.extend(1.0);
        let ndc = clip.xy() / clip.w;
        Vec2::new(
            (ndc.x + 1.0) * 0.5 * VIEWPORT.x as f32,
            (1.0 - ndc.y) * 0.5 * VIEWPORT.y as f32,
        )
    }

    #[test]
    fn uniform_layout_matches_wgsl() {
        assert_eq!(std::mem::size_of::<ClusterViewUniform>(), 176);
        assert_eq!(std::mem::offset_of!(ClusterViewUniform, dimensions), 144);
        assert_eq!(std::mem::offset_of!(ClusterViewUniform, ambient), 160);
    }

    #[test]
    fn degenerate_grids_are_rejected() {
        let p = projection();
        assert!(matches!(
            ClusterGrid::new(ClusterDimensions::new(16, 0, 24), p, 100.0, VIEWPORT),
            Err(ClusterGridError::ZeroDimension { .. })
        ));
        assert!(matches!(
            ClusterGrid::new(DIMS, p, 0.05, VIEWPORT),
            Err(ClusterGridError::InvalidDepthRange { .. })
        ));
        assert!(matches!(
            ClusterGrid::new(DIMS, PerspectiveParams { near: 0.0, ..p }, 100.0, VIEWPORT),
            Err(ClusterGridError::InvalidDepthRange { .. })
        ));
        assert!(matches!(
            ClusterGrid::new(DIMS, PerspectiveParams { fov_y: PI, ..p }, 100.0, VIEWPORT),
            Err(ClusterGridError::InvalidFieldOfView(_))
        ));
        assert!(matches!(
            ClusterGrid::new(DIMS, PerspectiveParams { aspect_ratio: 0.0, ..p }, 100.0, VIEWPORT),
            Err(ClusterGridError::InvalidAspectRatio(_))
        ));
        assert!(matches!(
            ClusterGrid::new(DIMS, p, 100.0, UVec2::new(0, 900)),
            Err(ClusterGridError::EmptyViewport(_))
        ));
        assert!(matches!(
            ClusterGrid::from_projection(DIMS, Mat4::ZERO, 0.1, 100.0, VIEWPORT),
            Err(ClusterGridError::SingularProjection)
        ));
    }

    #[test]
    fn oversized_grids_are_rejected_instead_of_overflowing() {
        let huge = ClusterDimensions::new(65536, 65536, 2);
        assert_eq!(huge.checked_cluster_count(), None);
        assert_eq!(huge.cluster_count(), u32::MAX);
        assert!(matches!(
            ClusterGrid::new(huge, projection(), 100.0, VIEWPORT),
            Err(ClusterGridError::TooManyClusters { .. })
        ));
        assert_eq!(DIMS.checked_cluster_count(), Some(3456));
    }

    #[test]
    fn last_slice_bounds_reach_past_the_far_plane() {
        let grid = grid();
        let bounds = grid.compute_bounds();
        let last = bounds.aabbs()[grid.cluster_index(UVec3::new(7, 4, DIMS.z - 1)) as usize];
        assert!(last.min.z < -1.0e6);
        assert!((last.max.z + grid.slice_near_depth(DIMS.z - 1)).abs() < 1e-3);
        assert_eq!(grid.slice_far_depth(3), grid.slice_near_depth(4));
    }

    #[test]
    fn slices_are_exponential_and_span_near_to_far() {
        let grid = grid();
        assert!((grid.slice_near_depth(0) - 0.1).abs() < 1e-6);
        assert!((grid.slice_near_depth(24) - 100.0).abs() < 1e-3);

        let ratio = grid.slice_near_depth(1) / grid.slice_near_depth(0);
        for k in 1..24 {
            let step = grid.slice_near_depth(k + 1) / grid.slice_near_depth(k);
            assert!((step - ratio).abs() < 1e-3);
        }
    }

    #[test]
    fn boundary_depth_belongs_to_farther_slice() {
        let grid = grid();
        for k in 1..DIMS.z {
            let boundary = grid.slice_near_depth(k);
            assert_eq!(grid.depth_slice(boundary), k, "boundary of slice {k}");
            let just_before = boundary * (1.0 - 1e-4);
            assert_eq!(grid.depth_slice(just_before), k - 1);
        }
    }

    #[test]
    fn out_of_range_depths_clamp() {
        let grid = grid();
        assert_eq!(grid.depth_slice(0.0), 0);
        assert_eq!(grid.depth_slice(0.1), 0);
        assert_eq!(grid.depth_slice(-3.0), 0);
        assert_eq!(grid.depth_slice(100.0), DIMS.z - 1);
        assert_eq!(grid.depth_slice(1.0e6), DIMS.z - 1);
    }

    #[test]
    fn tiles_clamp_to_the_viewport() {
        let grid = grid();
        assert_eq!(grid.tile(Vec2::ZERO), UVec2::ZERO);
        assert_eq!(grid.tile(Vec2::new(-5.0, -5.0)), UVec2::ZERO);
        assert_eq!(grid.tile(Vec2::new(1600.0, 900.0)), UVec2::new(15, 8));
        // 100 px per tile horizontally: a pixel on the edge goes right.
        assert_eq!(grid.tile(Vec2::new(100.0, 0.0)), UVec2::new(1, 0));
        assert_eq!(grid.tile(Vec2::new(99.5, 99.5)), UVec2::new(0, 0));
    }

    #[test]
    fn index_and_coords_round_trip() {
        let grid = grid();
        for index in 0..grid.cluster_count() {
            assert_eq!(grid.cluster_index(grid.cluster_coords(index)), index);
        }
        assert_eq!(grid.cluster_index(UVec3::new(3, 2, 1)), 3 + 2 * 16 + 16 * 9);
    }

    #[test]
    fn cluster_centres_resolve_to_their_own_cluster() {
        let grid = grid();
        for index in 0..grid.cluster_count() {
            let coords = grid.cluster_coords(index);
            let pixel = Vec2::new(
                (coords.x as f32 + 0.5) * 100.0,
                (coords.y as f32 + 0.5) * 100.0,
            );
            let depth = (grid.slice_near_depth(coords.z) * grid.slice_near_depth(coords.z + 1)).sqrt();
            assert_eq!(grid.cluster_at(pixel, depth), index);
        }
    }

    #[test]
    fn projected_points_land_inside_their_cluster_bounds() {
        let grid = grid();
        let bounds = grid.compute_bounds();
        let tolerance = Vec3::splat(1e-3);

        for &depth in &[0.15, 0.9, 3.0, 7.5, 22.0, 64.0] {
            for &(u, v) in &[(-0.9, -0.9), (-0.3, 0.5), (0.0, 0.0), (0.45, -0.2), (0.95, 0.95)] {
                let half_height = (projection().fov_y * 0.5).tan() * depth;
                let half_width = half_height * projection().aspect_ratio;
                let point = Vec3::new(u * half_width, v * half_height, -depth);

                let index = grid.cluster_at(to_pixel(point), depth);
                let aabb = bounds.aabbs()[index as usize];
                let padded = ClusterAabb {
                    min: aabb.min - tolerance,
                    max: aabb.max + tolerance,
                };
                assert!(padded.contains(point), "{point} not in cluster {index}: {aabb:?}");
            }
        }
    }

    #[test]
    fn slices_tile_the_depth_range_without_gaps() {
        let grid = grid();
        let bounds = grid.compute_bounds();
        for z in 0..DIMS.z - 1 {
            let here = bounds.aabbs()[grid.cluster_index(UVec3::new(7, 4, z)) as usize];
            let next = bounds.aabbs()[grid.cluster_index(UVec3::new(7, 4, z + 1)) as usize];
            assert!((here.min.z - next.max.z).abs() < 1e-4);
        }
    }

    #[test]
    fn sphere_test_uses_closest_point() {
        let aabb = ClusterAabb {
            min: Vec3::new(0.0, 0.0, -2.0),
            max: Vec3::new(1.0, 1.0, -1.0),
        };
        assert!(aabb.intersects_sphere(Vec3::new(0.5, 0.5, -1.5), 0.01));
        assert!(aabb.intersects_sphere(Vec3::new(2.0, 0.5, -1.5), 1.0));
        assert!(!aabb.intersects_sphere(Vec3::new(2.0, 2.0, -1.5), 1.0));
        assert!(!aabb.intersects_sphere(Vec3::new(0.5, 0.5, 0.5), 1.0));
    }
}
