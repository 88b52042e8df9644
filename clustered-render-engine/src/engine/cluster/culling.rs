use crate::engine::cluster::grid::ClusterBounds;
use crate::engine::lights::light_set::GpuPointLight;
use bevy::prelude::*;
use bytemuck::{Pod, Zeroable};
use rayon::prelude::*;

/// Per-cluster slice of the global light index list.
///
/// ```wgsl
/// struct LightGridEntry {
///     offset: u32,
///     count: u32,
/// }
/// ```
#[repr(C)]
#[derive(Pod, Zeroable, Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LightGridEntry {
    pub offset: u32,
    pub count: u32,
}

/// Light transformed into the camera's view space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewLight {
    pub center: Vec3,
    pub radius: f32,
    pub color: Vec3,
    pub intensity: f32,
}

impl ViewLight {
    pub fn from_world(light: &GpuPointLight, view_from_world: &Mat4) -> Self {
        Self {
            center: view_from_world.transform_point3(Vec3::from_array(light.position)),
            radius: light.radius,
            color: Vec3::from_array(light.color),
            intensity: light.intensity,
        }
    }
}

pub fn lights_to_view_space(lights: &[GpuPointLight], view_from_world: Mat4) -> Vec<ViewLight> {
    lights
        .par_iter()
        .map(|light| ViewLight::from_world(light, &view_from_world))
        .collect()
}

/// Output of one culling pass: the light grid and the global light index list.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterLightLists {
    light_grid: Vec<LightGridEntry>,
    light_indices: Vec<u32>,
    max_lights_per_cluster: u32,
}

impl ClusterLightLists {
    pub fn light_grid(&self) -> &[LightGridEntry] {
        &self.light_grid
    }

    pub fn light_indices(&self) -> &[u32] {
        &self.light_indices
    }

    pub fn max_lights_per_cluster(&self) -> u32 {
        self.max_lights_per_cluster
    }

    /// Indices of the lights assigned to `cluster`.
    pub fn lights_in(&self, cluster: u32) -> &[u32] {
        let entry = self.light_grid[cluster as usize];
        let start = entry.offset as usize;
        &self.light_indices[start..start + entry.count as usize]
    }

    pub fn total_assignments(&self) -> u64 {
        self.light_grid.iter().map(|entry| entry.count as u64).sum()
    }

    pub fn occupied_clusters(&self) -> usize {
        self.light_grid.iter().filter(|entry| entry.count > 0).count()
    }

    /// Clusters that hit the per-cluster cap and may have dropped lights.
    pub fn saturated_clusters(&self) -> usize {
        self.light_grid
            .iter()
            .filter(|entry| entry.count == self.max_lights_per_cluster)
            .count()
    }

    pub fn max_count(&self) -> u32 {
        self.light_grid
            .iter()
            .map(|entry| entry.count)
            .max()
            .unwrap_or(0)
    }
}

/// Assign every light to every cluster its sphere of influence touches.
///
/// Each cluster owns the fixed run `[index * cap, index * cap + cap)` of the
/// index list, so clusters are processed in parallel without synchronisation.
/// Lights are visited in index order; once a run is full the remaining
/// intersecting lights are dropped for that cluster.
pub fn cull_lights(
    bounds: &ClusterBounds,
    lights: &[ViewLight],
    max_lights_per_cluster: u32,
) -> ClusterLightLists {
    let cluster_count = bounds.aabbs().len();
    let cap = max_lights_per_cluster as usize;
    let mut light_grid = vec![LightGridEntry::default(); cluster_count];
    let mut light_indices = vec![0u32; cluster_count * cap];

    if cap > 0 {
        light_indices
            .par_chunks_mut(cap)
            .zip(light_grid.par_iter_mut())
            .zip(bounds.aabbs().par_iter())
            .enumerate()
            .for_each(|(cluster, ((run, entry), aabb))| {
                let mut count = 0;
                for (light_index, light) in lights.iter().enumerate() {
                    if count == cap {
                        break;
                    }
                    if aabb.intersects_sphere(light.center, light.radius) {
                        run[count] = light_index as u32;
                        count += 1;
                    }
                }
                *entry = LightGridEntry {
                    offset: (cluster * cap) as u32,
                    count: count as u32,
                };
            });
    }

    ClusterLightLists {
        light_grid,
        light_indices,
        max_lights_per_cluster,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cluster::grid::{ClusterDimensions, ClusterGrid, PerspectiveParams};
    use crate::engine::core::config::LightConfig;
    use crate::engine::lights::light_set::LightSet;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;
    use std::f32::consts::PI;

    const CAP: u32 = 64;

    fn grid() -> ClusterGrid {
        ClusterGrid::new(
            ClusterDimensions::new(16, 9, 24),
            PerspectiveParams {
                fov_y: PI / 4.0,
                aspect_ratio: 16.0 / 9.0,
                near: 0.1,
            },
            100.0,
            UVec2::new(1600, 900),
        )
        .unwrap()
    }

    fn light_at(center: Vec3, radius: f32) -> ViewLight {
        ViewLight {
            center,
            radius,
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }

    /// Point at the middle of a cluster's frustum cell: the tile centre ray at
    /// the geometric mean of the slice depths.
    fn cell_center(grid: &ClusterGrid, coords: UVec3) -> Vec3 {
        let tile_size = grid.viewport() / Vec2::new(16.0, 9.0);
        let pixel = (coords.truncate().as_vec2() + 0.5) * tile_size;
        let depth = (grid.slice_near_depth(coords.z) * grid.slice_near_depth(coords.z + 1)).sqrt();
        unproject(grid, pixel, depth)
    }

    /// Tiny lights whose sphere touches exactly one cluster bounding box.
    /// Bounding boxes of neighbouring tiles overlap towards the screen edges,
    /// so candidates are checked against every box.
    fn isolated_lights(grid: &ClusterGrid, bounds: &ClusterBounds, n: usize) -> Vec<ViewLight> {
        let mut lights = Vec::new();
        let mut clusters = HashSet::new();
        for index in 0..grid.cluster_count() {
            let light = light_at(cell_center(grid, grid.cluster_coords(index)), 1e-4);
            let touched: Vec<usize> = bounds
                .aabbs()
                .iter()
                .enumerate()
                .filter(|(_, aabb)| aabb.intersects_sphere(light.center, light.radius))
                .map(|(i, _)| i)
                .collect();
            if touched == [index as usize] && clusters.insert(index) {
                lights.push(light);
            }
            if lights.len() == n {
                break;
            }
        }
        assert_eq!(lights.len(), n);
        lights
    }

    #[test]
    fn lights_inside_single_clusters_are_counted_once() {
        let grid = grid();
        let bounds = grid.compute_bounds();
        let lights = isolated_lights(&grid, &bounds, 50);

        let lists = cull_lights(&bounds, &lights, CAP);
        assert_eq!(lists.total_assignments(), 50);
        assert_eq!(lists.occupied_clusters(), 50);
    }

    #[test]
    fn straddling_light_is_listed_in_both_clusters() {
        let grid = grid();
        let bounds = grid.compute_bounds();
        let a = grid.cluster_index(UVec3::new(7, 4, 10));
        let b = grid.cluster_index(UVec3::new(7, 4, 11));

        // On the shared depth face, in the middle of the tile.
        let boundary = grid.slice_near_depth(11);
        let center = unproject(&grid, Vec2::new(750.0, 450.0), boundary);
        let light = light_at(center, 0.01);

        let lists = cull_lights(&bounds, &[light], CAP);
        assert_eq!(lists.lights_in(a), &[0]);
        assert_eq!(lists.lights_in(b), &[0]);
    }

    #[test]
    fn runs_start_at_fixed_offsets() {
        let grid = grid();
        let bounds = grid.compute_bounds();
        let lists = cull_lights(&bounds, &isolated_lights(&grid, &bounds, 10), CAP);

        for (index, entry) in lists.light_grid().iter().enumerate() {
            assert_eq!(entry.offset, index as u32 * CAP);
            assert!(entry.offset + entry.count <= lists.light_indices().len() as u32);
        }
    }

    #[test]
    fn culling_is_idempotent() {
        let grid = grid();
        let bounds = grid.compute_bounds();
        let lights = random_view_lights(500, 7);

        let first = cull_lights(&bounds, &lights, CAP);
        let second = cull_lights(&bounds, &lights, CAP);
        assert_eq!(first, second);
    }

    #[test]
    fn overflow_truncates_to_cap() {
        let grid = grid();
        let bounds = grid.compute_bounds();
        let coords = UVec3::new(7, 4, 12);
        let target = grid.cluster_index(coords);
        let center = cell_center(&grid, coords);
        let tiny = 1e-4;

        let k = 8;
        let lights: Vec<ViewLight> = (0..k + 5)
            .map(|_| light_at(center, tiny))
            .collect();

        let lists = cull_lights(&bounds, &lights, k);
        assert_eq!(lists.light_grid()[target as usize].count, k);
        assert_eq!(lists.lights_in(target), &(0..k).collect::<Vec<_>>()[..]);
        assert_eq!(lists.saturated_clusters(), 1);
        assert_eq!(lists.light_indices().len(), (grid.cluster_count() * k) as usize);
    }

    #[test]
    fn zero_cap_produces_empty_lists() {
        let grid = grid();
        let bounds = grid.compute_bounds();
        let lists = cull_lights(&bounds, &random_view_lights(10, 1), 0);
        assert_eq!(lists.total_assignments(), 0);
        assert!(lists.light_indices().is_empty());
    }

    #[test]
    fn light_counts_scale_within_capacity() {
        let grid = grid();
        let bounds = grid.compute_bounds();
        let config = LightConfig {
            max_lights: 5000,
            initial_lights: 500,
            ..LightConfig::default()
        };
        let mut light_set = LightSet::new(&config).unwrap();
        let view_from_world = Transform::from_xyz(0.0, 4.0, 18.0)
            .looking_at(Vec3::new(0.0, 2.0, 0.0), Vec3::Y)
            .compute_matrix()
            .inverse();

        let lights = lights_to_view_space(light_set.active(), view_from_world);
        let small = cull_lights(&bounds, &lights, 256);
        let touched: u64 = lights
            .iter()
            .map(|light| {
                bounds
                    .aabbs()
                    .iter()
                    .filter(|aabb| aabb.intersects_sphere(light.center, light.radius))
                    .count() as u64
            })
            .sum();
        assert_eq!(small.saturated_clusters(), 0);
        assert!(small.total_assignments() > 0);
        assert_eq!(small.total_assignments(), touched);

        light_set.set_active_count(5000).unwrap();
        let lights = lights_to_view_space(light_set.active(), view_from_world);
        let large = cull_lights(&bounds, &lights, 256);
        assert!(large.total_assignments() > small.total_assignments());
        assert!(large.light_grid().iter().all(|entry| entry.count <= 256));
    }

    #[test]
    fn clustered_shading_matches_full_light_loop() {
        let grid = grid();
        let bounds = grid.compute_bounds();
        let lights = random_view_lights(400, 11);
        let lists = cull_lights(&bounds, &lights, 256);
        assert_eq!(lists.saturated_clusters(), 0);

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..2000 {
            let pixel = Vec2::new(rng.random_range(0.0..1600.0), rng.random_range(0.0..900.0));
            let depth = rng.random_range(0.2..40.0);
            let position = unproject(&grid, pixel, depth);
            let normal = Vec3::new(rng.random_range(-1.0..1.0), 1.0, 0.5).normalize();

            let full = shade(position, normal, lights.iter());
            let cluster = grid.cluster_at(pixel, depth);
            let clustered = shade(
                position,
                normal,
                lists.lights_in(cluster).iter().map(|&i| &lights[i as usize]),
            );
            assert!(
                (full - clustered).abs().max_element() < 1e-4,
                "pixel {pixel} depth {depth}: {full} vs {clustered}"
            );
        }
    }

    #[test]
    fn lights_beyond_the_slicing_far_plane_still_reach_fragments() {
        let grid = grid();
        let bounds = grid.compute_bounds();
        let light = light_at(Vec3::new(0.0, 0.0, -150.0), 2.0);
        let lists = cull_lights(&bounds, &[light], CAP);

        let pixel = Vec2::new(800.0, 450.0);
        let depth = 150.5;
        let cluster = grid.cluster_at(pixel, depth);
        assert_eq!(grid.cluster_coords(cluster).z, 23);
        assert_eq!(lists.lights_in(cluster), &[0]);

        let position = unproject(&grid, pixel, depth);
        let full = shade(position, Vec3::Z, [light].iter());
        let clustered = shade(
            position,
            Vec3::Z,
            lists.lights_in(cluster).iter().map(|_| &light),
        );
        assert!(full.max_element() > 0.0);
        assert_eq!(full, clustered);
    }

    fn random_view_lights(n: usize, seed: u64) -> Vec<ViewLight> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                light_at(
                    Vec3::new(
                        rng.random_range(-12.0..12.0),
                        rng.random_range(-6.0..6.0),
                        rng.random_range(-40.0..-0.5),
                    ),
                    2.0,
                )
            })
            .collect()
    }

    /// View-space position of a pixel at a given view depth.
    fn unproject(grid: &ClusterGrid, pixel: Vec2, depth: f32) -> Vec3 {
        let ndc = Vec2::new(
            pixel.x / grid.viewport().x * 2.0 - 1.0,
            1.0 - pixel.y / grid.viewport().y * 2.0,
        );
        let near = grid.view_from_clip() * Vec4::new(ndc.x, ndc.y, 1.0, 1.0);
        let near = near.xyz() / near.w;
        near / -near.z * depth
    }

    /// CPU mirror of `clustered_lighting::point_light_contribution`.
    fn shade<'a>(position: Vec3, normal: Vec3, lights: impl Iterator<Item = &'a ViewLight>) -> Vec3 {
        lights
            .map(|light| {
                let to_light = light.center - position;
                let distance = to_light.length();
                let ratio = distance / light.radius;
                let window = (1.0 - ratio.powi(4)).clamp(0.0, 1.0);
                let attenuation = window / (distance * distance).max(1e-4);
                let lambert = normal.dot(to_light / distance.max(1e-6)).max(0.0);
                light.color * light.intensity * lambert * attenuation
            })
            .sum()
    }
}
