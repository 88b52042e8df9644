use crate::engine::cluster::culling::{ClusterLightLists, cull_lights, lights_to_view_space};
use crate::engine::cluster::grid::ClusterGrid;
use crate::engine::core::config::ClusterSettings;
use crate::engine::core::error::ClusterGridError;
use crate::engine::lights::light_set::LightSet;
use bevy::prelude::*;

/// Occupancy summary of one culling pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClusterOccupancy {
    pub clusters: usize,
    pub occupied: usize,
    pub saturated: usize,
    pub max_count: u32,
    pub total_assignments: u64,
}

impl ClusterOccupancy {
    pub fn from_lists(lists: &ClusterLightLists) -> Self {
        Self {
            clusters: lists.light_grid().len(),
            occupied: lists.occupied_clusters(),
            saturated: lists.saturated_clusters(),
            max_count: lists.max_count(),
            total_assignments: lists.total_assignments(),
        }
    }

    pub fn mean_per_occupied(&self) -> f32 {
        if self.occupied == 0 {
            0.0
        } else {
            self.total_assignments as f32 / self.occupied as f32
        }
    }
}

/// Run the CPU culling reference for one camera.
pub fn measure_occupancy(
    settings: &ClusterSettings,
    lights: &LightSet,
    clip_from_view: Mat4,
    view_from_world: Mat4,
    viewport: UVec2,
) -> Result<ClusterOccupancy, ClusterGridError> {
    let near = clip_from_view.w_axis.z;
    let grid = ClusterGrid::from_projection(
        settings.dimensions,
        clip_from_view,
        near,
        settings.far,
        viewport,
    )?;
    let view_lights = lights_to_view_space(lights.active(), view_from_world);
    let lists = cull_lights(
        &grid.compute_bounds(),
        &view_lights,
        settings.max_lights_per_cluster,
    );
    Ok(ClusterOccupancy::from_lists(&lists))
}

/// F2 logs how the current light set distributes over the cluster grid.
pub fn cluster_diagnostics_system(
    keyboard: Res<ButtonInput<KeyCode>>,
    settings: Res<ClusterSettings>,
    lights: Res<LightSet>,
    cameras: Query<(&Camera, &GlobalTransform), With<Camera3d>>,
) {
    if !keyboard.just_pressed(KeyCode::F2) {
        return;
    }
    let Ok((camera, transform)) = cameras.single() else {
        return;
    };
    let Some(viewport) = camera.physical_viewport_size() else {
        return;
    };

    let view_from_world = transform.compute_matrix().inverse();
    match measure_occupancy(
        &settings,
        &lights,
        camera.clip_from_view(),
        view_from_world,
        viewport,
    ) {
        Ok(occupancy) => {
            info!("=== CLUSTER OCCUPANCY ===");
            info!(
                "Lights: {} | Grid: {:?} ({} clusters)",
                lights.active_count(),
                settings.dimensions.to_array(),
                occupancy.clusters
            );
            info!(
                "Occupied: {} | Saturated (cap {}): {}",
                occupancy.occupied, settings.max_lights_per_cluster, occupancy.saturated
            );
            info!(
                "Max per cluster: {} | Mean per occupied: {:.1} | Assignments: {}",
                occupancy.max_count,
                occupancy.mean_per_occupied(),
                occupancy.total_assignments
            );
        }
        Err(err) => warn!("Cluster occupancy unavailable: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cluster::grid::ClusterDimensions;
    use crate::engine::core::config::LightConfig;

    fn camera_looking_at_lights() -> (Mat4, Mat4) {
        let clip_from_view =
            Mat4::perspective_infinite_reverse_rh(std::f32::consts::FRAC_PI_3, 16.0 / 9.0, 0.1);
        let world_from_view =
            Transform::from_xyz(0.0, 4.0, 30.0).looking_at(Vec3::new(0.0, 4.0, 0.0), Vec3::Y);
        (clip_from_view, world_from_view.compute_matrix().inverse())
    }

    #[test]
    fn occupancy_counts_every_assignment() {
        let settings = ClusterSettings::default();
        let lights = LightSet::new(&LightConfig {
            initial_lights: 500,
            ..Default::default()
        })
        .unwrap();
        let (clip_from_view, view_from_world) = camera_looking_at_lights();

        let occupancy = measure_occupancy(
            &settings,
            &lights,
            clip_from_view,
            view_from_world,
            UVec2::new(1600, 900),
        )
        .unwrap();

        assert_eq!(occupancy.clusters, settings.dimensions.cluster_count() as usize);
        assert!(occupancy.occupied > 0);
        assert!(occupancy.total_assignments >= occupancy.occupied as u64);
        assert!(occupancy.max_count <= settings.max_lights_per_cluster);
        assert!(occupancy.mean_per_occupied() >= 1.0);
    }

    #[test]
    fn tiny_cap_saturates_clusters() {
        let settings = ClusterSettings {
            dimensions: ClusterDimensions::new(4, 4, 4),
            max_lights_per_cluster: 1,
            ..Default::default()
        };
        let lights = LightSet::new(&LightConfig {
            initial_lights: 2000,
            ..Default::default()
        })
        .unwrap();
        let (clip_from_view, view_from_world) = camera_looking_at_lights();

        let occupancy = measure_occupancy(
            &settings,
            &lights,
            clip_from_view,
            view_from_world,
            UVec2::new(1600, 900),
        )
        .unwrap();
        assert!(occupancy.saturated > 0);
        assert_eq!(occupancy.max_count, 1);
        assert_eq!(occupancy.saturated, occupancy.occupied);
    }

    #[test]
    fn empty_viewport_is_reported() {
        let (clip_from_view, view_from_world) = camera_looking_at_lights();
        let lights = LightSet::new(&LightConfig::default()).unwrap();
        let result = measure_occupancy(
            &ClusterSettings::default(),
            &lights,
            clip_from_view,
            view_from_world,
            UVec2::ZERO,
        );
        assert_eq!(result, Err(ClusterGridError::EmptyViewport(UVec2::ZERO)));
    }
}
