use crate::engine::compute::light_culling::{
    LightCullingLabel, LightCullingNode, LightCullingPipelines,
};
use crate::engine::core::app_state::AppState;
use crate::engine::core::config::ClusterSettings;
use crate::engine::render::cluster_buffers::{
    prepare_cluster_buffers, prepare_view_cluster_bind_groups, ClusterBindGroupLayouts,
    ClusterGpuStorage,
};
use crate::engine::render::extraction::{
    app_state::extract_state,
    camera_phases::extract_camera_phases,
    light_set::{extract_light_set, ExtractedLightSet},
};
use crate::engine::render::pipeline::clustered_mesh_pipeline::{
    queue_clustered_meshes, ClusteredMeshPhase, ClusteredMeshPipeline, DrawClusteredMesh,
    ShadedMesh,
};
use crate::engine::render::shading::{
    deferred::DeferredComposePipeline,
    node::{ClusteredShadingLabel, ClusteredShadingNode},
    renderer::{update_active_renderer, ActiveRenderer},
};
use crate::engine::systems::render_mode::RenderModeState;
use bevy::core_pipeline::core_3d::graph::{Core3d, Node3d};
use bevy::pbr::MeshPipeline;
use bevy::prelude::*;
use bevy::render::{
    extract_component::ExtractComponentPlugin,
    extract_resource::ExtractResourcePlugin,
    render_graph::{RenderGraphApp, ViewNodeRunner},
    render_phase::{
        sort_phase_system, AddRenderCommand, DrawFunctions, SortedRenderPhasePlugin,
        ViewSortedRenderPhases,
    },
    render_resource::SpecializedMeshPipelines,
    ExtractSchedule, Render, RenderApp, RenderDebugFlags, RenderSet,
};

/// Light culling, the three shading renderers and the render graph wiring
/// between them.
///
/// Graph order per view: `EndPrepasses -> LightCulling -> ClusteredShading ->
/// MainOpaquePass`.
pub struct ClusteredRenderPlugin;

impl Plugin for ClusteredRenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            ExtractResourcePlugin::<RenderModeState>::default(),
            ExtractResourcePlugin::<ClusterSettings>::default(),
            ExtractComponentPlugin::<ShadedMesh>::default(),
            SortedRenderPhasePlugin::<ClusteredMeshPhase, MeshPipeline>::new(
                RenderDebugFlags::default(),
            ),
        ));

        let Some(render_app) = app.get_sub_app_mut(RenderApp) else {
            return;
        };

        render_app
            .init_resource::<State<AppState>>()
            .init_resource::<SpecializedMeshPipelines<ClusteredMeshPipeline>>()
            .init_resource::<DrawFunctions<ClusteredMeshPhase>>()
            .add_render_command::<ClusteredMeshPhase, DrawClusteredMesh>()
            .init_resource::<ViewSortedRenderPhases<ClusteredMeshPhase>>()
            .init_resource::<ClusterGpuStorage>()
            .init_resource::<ExtractedLightSet>()
            .init_resource::<ActiveRenderer>()
            .add_systems(
                ExtractSchedule,
                (
                    extract_state::<AppState>,
                    extract_camera_phases,
                    extract_light_set,
                ),
            )
            .add_systems(
                Render,
                (
                    update_active_renderer.in_set(RenderSet::ManageViews),
                    queue_clustered_meshes.in_set(RenderSet::QueueMeshes),
                    sort_phase_system::<ClusteredMeshPhase>.in_set(RenderSet::PhaseSort),
                    prepare_cluster_buffers.in_set(RenderSet::PrepareResources),
                    prepare_view_cluster_bind_groups.in_set(RenderSet::PrepareBindGroups),
                )
                    .run_if(in_state(AppState::Running))
                    .run_if(resource_exists::<ClusterSettings>),
            )
            .add_render_graph_node::<ViewNodeRunner<LightCullingNode>>(Core3d, LightCullingLabel)
            .add_render_graph_node::<ViewNodeRunner<ClusteredShadingNode>>(
                Core3d,
                ClusteredShadingLabel,
            )
            .add_render_graph_edges(
                Core3d,
                (
                    Node3d::EndPrepasses,
                    LightCullingLabel,
                    ClusteredShadingLabel,
                    Node3d::MainOpaquePass,
                ),
            );
    }

    fn finish(&self, app: &mut App) {
        let Some(render_app) = app.get_sub_app_mut(RenderApp) else {
            return;
        };

        // The pipelines below clone layouts out of this resource.
        render_app
            .init_resource::<ClusterBindGroupLayouts>()
            .init_resource::<LightCullingPipelines>()
            .init_resource::<ClusteredMeshPipeline>()
            .init_resource::<DeferredComposePipeline>();
    }
}
