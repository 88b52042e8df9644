use crate::engine::render::cluster_buffers::{ClusterBindGroupLayouts, ViewClusterBindGroups};
use crate::engine::render::pipeline::clustered_mesh_pipeline::CLUSTERED_LIGHTING_SHADER_PATH;
use crate::engine::render::shading::renderer::ActiveRenderer;
use bevy::ecs::query::QueryItem;
use bevy::prelude::*;
use bevy::render::{
    render_graph::{NodeRunError, RenderGraphContext, RenderLabel, ViewNode},
    render_resource::{
        CachedComputePipelineId, ComputePassDescriptor, ComputePipelineDescriptor, PipelineCache,
        ShaderDefVal,
    },
    renderer::RenderContext,
};
use constants::cluster::{CLUSTER_BOUNDS_WORKGROUP_SIZE, LIGHT_CULLING_WORKGROUP_SIZE};

const CLUSTER_BOUNDS_SHADER_PATH: &str = "shaders/cluster_bounds.wgsl";
const LIGHT_CULLING_SHADER_PATH: &str = "shaders/light_culling.wgsl";

#[derive(Debug, Hash, PartialEq, Eq, Clone, RenderLabel)]
pub struct LightCullingLabel;

/// Compute pipelines for the two culling dispatches: cluster bounds, then
/// light assignment.
#[derive(Resource)]
pub struct LightCullingPipelines {
    bounds_pipeline: CachedComputePipelineId,
    culling_pipeline: CachedComputePipelineId,
    _lighting_library: Handle<Shader>,
}

impl FromWorld for LightCullingPipelines {
    fn from_world(world: &mut World) -> Self {
        let layouts = world.resource::<ClusterBindGroupLayouts>();
        let bounds_layout = layouts.bounds.clone();
        let culling_layout = layouts.culling.clone();

        let bounds_shader = world.load_asset(CLUSTER_BOUNDS_SHADER_PATH);
        let culling_shader = world.load_asset(LIGHT_CULLING_SHADER_PATH);
        let lighting_library = world.load_asset(CLUSTERED_LIGHTING_SHADER_PATH);

        let pipeline_cache = world.resource::<PipelineCache>();
        let bounds_pipeline = pipeline_cache.queue_compute_pipeline(ComputePipelineDescriptor {
            label: Some("cluster_bounds_compute".into()),
            layout: vec![bounds_layout],
            push_constant_ranges: Vec::new(),
            shader: bounds_shader,
            shader_defs: vec![workgroup_size_def(CLUSTER_BOUNDS_WORKGROUP_SIZE)],
            entry_point: "main".into(),
            zero_initialize_workgroup_memory: false,
        });
        let culling_pipeline = pipeline_cache.queue_compute_pipeline(ComputePipelineDescriptor {
            label: Some("light_culling_compute".into()),
            layout: vec![culling_layout],
            push_constant_ranges: Vec::new(),
            shader: culling_shader,
            shader_defs: vec![workgroup_size_def(LIGHT_CULLING_WORKGROUP_SIZE)],
            entry_point: "main".into(),
            zero_initialize_workgroup_memory: false,
        });

        Self {
            bounds_pipeline,
            culling_pipeline,
            _lighting_library: lighting_library,
        }
    }
}

impl LightCullingPipelines {
    pub fn is_ready(&self, pipeline_cache: &PipelineCache) -> bool {
        pipeline_cache
            .get_compute_pipeline(self.bounds_pipeline)
            .is_some()
            && pipeline_cache
                .get_compute_pipeline(self.culling_pipeline)
                .is_some()
    }
}

fn workgroup_size_def(size: u32) -> ShaderDefVal {
    ShaderDefVal::UInt("WORKGROUP_SIZE".into(), size)
}

/// Workgroups needed for one invocation per cluster.
pub fn workgroup_count(cluster_count: u32, workgroup_size: u32) -> u32 {
    cluster_count.div_ceil(workgroup_size)
}

/// Rebuilds cluster bounds and the per-cluster light lists for a view.
/// Idle while the naive renderer is active.
#[derive(Default)]
pub struct LightCullingNode;

impl ViewNode for LightCullingNode {
    type ViewQuery = &'static ViewClusterBindGroups;

    fn run(
        &self,
        _graph: &mut RenderGraphContext,
        render_context: &mut RenderContext,
        bind_groups: QueryItem<Self::ViewQuery>,
        world: &World,
    ) -> Result<(), NodeRunError> {
        if !world.resource::<ActiveRenderer>().uses_clusters() {
            return Ok(());
        }

        let pipelines = world.resource::<LightCullingPipelines>();
        let pipeline_cache = world.resource::<PipelineCache>();
        let (Some(bounds_pipeline), Some(culling_pipeline)) = (
            pipeline_cache.get_compute_pipeline(pipelines.bounds_pipeline),
            pipeline_cache.get_compute_pipeline(pipelines.culling_pipeline),
        ) else {
            return Ok(());
        };

        let mut pass = render_context
            .command_encoder()
            .begin_compute_pass(&ComputePassDescriptor {
                label: Some("light_culling"),
                timestamp_writes: None,
            });

        pass.set_pipeline(bounds_pipeline);
        pass.set_bind_group(0, &bind_groups.bounds, &[]);
        pass.dispatch_workgroups(
            workgroup_count(bind_groups.cluster_count, CLUSTER_BOUNDS_WORKGROUP_SIZE),
            1,
            1,
        );

        pass.set_pipeline(culling_pipeline);
        pass.set_bind_group(0, &bind_groups.culling, &[]);
        pass.dispatch_workgroups(
            workgroup_count(bind_groups.cluster_count, LIGHT_CULLING_WORKGROUP_SIZE),
            1,
            1,
        );

        Ok(())
    }
}
