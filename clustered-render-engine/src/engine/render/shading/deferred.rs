use crate::engine::render::cluster_buffers::ClusterBindGroupLayouts;
use crate::engine::render::pipeline::clustered_mesh_pipeline::CLUSTERED_LIGHTING_SHADER_PATH;
use bevy::core_pipeline::fullscreen_vertex_shader::fullscreen_shader_vertex_state;
use bevy::prelude::*;
use bevy::render::{
    render_resource::{
        CachedRenderPipelineId, ColorTargetState, ColorWrites, FragmentState, MultisampleState,
        PipelineCache, PrimitiveState, RenderPipelineDescriptor, TextureFormat,
    },
    view::ViewTarget,
};

const DEFERRED_COMPOSE_SHADER_PATH: &str = "shaders/deferred_compose.wgsl";

/// Full-screen pass that lights the G-buffer from the per-cluster light lists.
///
/// Bind groups: `@group(0)` cluster shading, `@group(1)` G-buffer textures.
#[derive(Resource)]
pub struct DeferredComposePipeline {
    ldr_pipeline_id: CachedRenderPipelineId,
    hdr_pipeline_id: CachedRenderPipelineId,
    _lighting_library: Handle<Shader>,
}

impl DeferredComposePipeline {
    pub fn pipeline_id(&self, hdr: bool) -> CachedRenderPipelineId {
        if hdr {
            self.hdr_pipeline_id
        } else {
            self.ldr_pipeline_id
        }
    }
}

impl FromWorld for DeferredComposePipeline {
    fn from_world(world: &mut World) -> Self {
        let layouts = world.resource::<ClusterBindGroupLayouts>();
        let layout = vec![layouts.shading.clone(), layouts.gbuffer.clone()];
        let shader = world.load_asset(DEFERRED_COMPOSE_SHADER_PATH);
        let lighting_library = world.load_asset(CLUSTERED_LIGHTING_SHADER_PATH);

        let descriptor = |format: TextureFormat| RenderPipelineDescriptor {
            label: Some("deferred_compose_pipeline".into()),
            layout: layout.clone(),
            vertex: fullscreen_shader_vertex_state(),
            fragment: Some(FragmentState {
                shader: shader.clone(),
                shader_defs: vec![],
                entry_point: "fragment".into(),
                targets: vec![Some(ColorTargetState {
                    format,
                    blend: None,
                    write_mask: ColorWrites::ALL,
                })],
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: None,
            multisample: MultisampleState::default(),
            push_constant_ranges: vec![],
            zero_initialize_workgroup_memory: false,
        };
        let ldr = descriptor(TextureFormat::bevy_default());
        let hdr = descriptor(ViewTarget::TEXTURE_FORMAT_HDR);

        let pipeline_cache = world.resource_mut::<PipelineCache>();
        Self {
            ldr_pipeline_id: pipeline_cache.queue_render_pipeline(ldr),
            hdr_pipeline_id: pipeline_cache.queue_render_pipeline(hdr),
            _lighting_library: lighting_library,
        }
    }
}
