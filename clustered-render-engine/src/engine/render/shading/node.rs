use crate::engine::compute::light_culling::LightCullingPipelines;
use crate::engine::render::cluster_buffers::ViewClusterBindGroups;
use crate::engine::render::pipeline::clustered_mesh_pipeline::ClusteredMeshPhase;
use crate::engine::render::shading::renderer::{ActiveRenderer, ViewDraw};
use bevy::ecs::query::QueryItem;
use bevy::prelude::*;
use bevy::render::{
    render_graph::{NodeRunError, RenderGraphContext, RenderLabel, ViewNode},
    render_phase::ViewSortedRenderPhases,
    render_resource::PipelineCache,
    renderer::RenderContext,
    view::{ExtractedView, ViewDepthTexture, ViewTarget},
};

#[derive(Debug, Hash, PartialEq, Eq, Clone, RenderLabel)]
pub struct ClusteredShadingLabel;

/// Encodes the active renderer's passes for one view.
#[derive(Default)]
pub struct ClusteredShadingNode;

impl ViewNode for ClusteredShadingNode {
    type ViewQuery = (
        &'static ExtractedView,
        &'static ViewTarget,
        &'static ViewDepthTexture,
        Option<&'static ViewClusterBindGroups>,
    );

    fn run(
        &self,
        graph: &mut RenderGraphContext,
        render_context: &mut RenderContext,
        (view, target, depth, cluster_bind_groups): QueryItem<Self::ViewQuery>,
        world: &World,
    ) -> Result<(), NodeRunError> {
        let Some(renderer) = world.resource::<ActiveRenderer>().get() else {
            return Ok(());
        };
        let Some(cluster_bind_groups) = cluster_bind_groups else {
            return Ok(());
        };

        // Clustered renderers read lists the culling node must have produced.
        if renderer.mode().uses_clusters()
            && !world
                .resource::<LightCullingPipelines>()
                .is_ready(world.resource::<PipelineCache>())
        {
            return Ok(());
        }

        let Some(phases) = world.get_resource::<ViewSortedRenderPhases<ClusteredMeshPhase>>()
        else {
            return Ok(());
        };
        let Some(phase) = phases.get(&view.retained_view_entity) else {
            return Ok(());
        };

        renderer.draw(
            render_context,
            world,
            &ViewDraw {
                entity: graph.view_entity(),
                phase,
                target,
                depth,
                cluster_bind_groups,
            },
        )
    }
}
