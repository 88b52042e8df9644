use crate::engine::render::pipeline::clustered_mesh_pipeline::ClusteredMeshPhase;
use bevy::prelude::*;
use bevy::render::{render_phase::ViewSortedRenderPhases, view::RetainedViewEntity, Extract};
use std::collections::HashSet;

/// Keep one clustered mesh phase per active 3D camera.
pub fn extract_camera_phases(
    mut clustered_phases: ResMut<ViewSortedRenderPhases<ClusteredMeshPhase>>,
    cameras: Extract<Query<(Entity, &Camera), With<Camera3d>>>,
    mut live_entities: Local<HashSet<RetainedViewEntity>>,
) {
    live_entities.clear();
    for (main_entity, camera) in &cameras {
        if !camera.is_active {
            continue;
        }

        let retained_view_entity = RetainedViewEntity::new(main_entity.into(), None, 0);
        clustered_phases.insert_or_clear(retained_view_entity);
        live_entities.insert(retained_view_entity);
    }
    clustered_phases.retain(|camera_entity, _| live_entities.contains(camera_entity));
}
