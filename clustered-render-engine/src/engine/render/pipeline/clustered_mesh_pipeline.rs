use crate::engine::render::cluster_buffers::{ClusterBindGroupLayouts, ViewClusterBindGroups};
use crate::engine::render::shading::renderer::ActiveRenderer;
use bevy::core_pipeline::core_3d::CORE_3D_DEPTH_FORMAT;
use bevy::ecs::system::{lifetimeless::Read, SystemParamItem};
use bevy::math::FloatOrd;
use bevy::pbr::{
    DrawMesh, MeshPipeline, MeshPipelineKey, MeshPipelineViewLayoutKey, RenderMeshInstances,
    SetMeshBindGroup, SetMeshViewBindGroup, MAX_CASCADES_PER_LIGHT, MAX_DIRECTIONAL_LIGHTS,
};
use bevy::prelude::*;
use bevy::render::{
    extract_component::ExtractComponent,
    mesh::{MeshVertexBufferLayoutRef, RenderMesh},
    render_asset::RenderAssets,
    render_phase::{
        CachedRenderPipelinePhaseItem, DrawFunctionId, DrawFunctions, PhaseItem,
        PhaseItemExtraIndex, RenderCommand, RenderCommandResult, SetItemPipeline,
        SortedPhaseItem, TrackedRenderPass, ViewSortedRenderPhases,
    },
    render_resource::{
        BindGroupLayout, CachedRenderPipelineId, ColorTargetState, ColorWrites, CompareFunction,
        DepthBiasState, DepthStencilState, Face, FragmentState, FrontFace, MultisampleState,
        PipelineCache, PolygonMode, PrimitiveState, RenderPipelineDescriptor, ShaderDefVal,
        SpecializedMeshPipeline, SpecializedMeshPipelineError, SpecializedMeshPipelines,
        StencilState, TextureFormat, VertexState,
    },
    sync_world::MainEntity,
    view::{ExtractedView, RenderVisibleEntities, ViewTarget},
};
use std::ops::Range;

const CLUSTERED_MESH_SHADER_PATH: &str = "shaders/clustered_mesh.wgsl";
const NAIVE_SHADER_PATH: &str = "shaders/naive.wgsl";
const FORWARD_PLUS_SHADER_PATH: &str = "shaders/forward_plus.wgsl";
const GBUFFER_SHADER_PATH: &str = "shaders/gbuffer.wgsl";
pub const CLUSTERED_LIGHTING_SHADER_PATH: &str = "shaders/clustered_lighting.wgsl";

pub const GBUFFER_POSITION_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
pub const GBUFFER_NORMAL_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
pub const GBUFFER_ALBEDO_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

/// Marks scene meshes drawn by the clustered lighting passes.
#[derive(Component, Clone, Copy, Default, ExtractComponent)]
pub struct ShadedMesh;

/// Geometry pass a mesh pipeline is specialised for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShadingPass {
    /// Lit against every active light.
    Naive,
    /// Lit from the fragment's cluster.
    ForwardPlus,
    /// Writes position, normal and albedo for the compose pass.
    GBuffer,
}

impl ShadingPass {
    fn fragment_shader_path(&self) -> &'static str {
        match self {
            ShadingPass::Naive => NAIVE_SHADER_PATH,
            ShadingPass::ForwardPlus => FORWARD_PLUS_SHADER_PATH,
            ShadingPass::GBuffer => GBUFFER_SHADER_PATH,
        }
    }

    pub fn color_formats(&self, hdr: bool) -> Vec<TextureFormat> {
        match self {
            ShadingPass::Naive | ShadingPass::ForwardPlus => vec![if hdr {
                ViewTarget::TEXTURE_FORMAT_HDR
            } else {
                TextureFormat::bevy_default()
            }],
            ShadingPass::GBuffer => vec![
                GBUFFER_POSITION_FORMAT,
                GBUFFER_NORMAL_FORMAT,
                GBUFFER_ALBEDO_FORMAT,
            ],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClusteredMeshPipelineKey {
    pub mesh_key: MeshPipelineKey,
    pub pass: ShadingPass,
}

#[derive(Resource)]
pub struct ClusteredMeshPipeline {
    mesh_pipeline: MeshPipeline,
    vertex_shader: Handle<Shader>,
    naive_shader: Handle<Shader>,
    forward_plus_shader: Handle<Shader>,
    gbuffer_shader: Handle<Shader>,
    /// Held so the `clustered_lighting` import stays registered.
    _lighting_library: Handle<Shader>,
    shading_layout: BindGroupLayout,
}

impl FromWorld for ClusteredMeshPipeline {
    fn from_world(world: &mut World) -> Self {
        let shading_layout = world.resource::<ClusterBindGroupLayouts>().shading.clone();
        let mesh_pipeline = MeshPipeline::from_world(world);
        let asset_server = world.resource::<AssetServer>();

        Self {
            mesh_pipeline,
            vertex_shader: asset_server.load(CLUSTERED_MESH_SHADER_PATH),
            naive_shader: asset_server.load(ShadingPass::Naive.fragment_shader_path()),
            forward_plus_shader: asset_server
                .load(ShadingPass::ForwardPlus.fragment_shader_path()),
            gbuffer_shader: asset_server.load(ShadingPass::GBuffer.fragment_shader_path()),
            _lighting_library: asset_server.load(CLUSTERED_LIGHTING_SHADER_PATH),
            shading_layout,
        }
    }
}

impl ClusteredMeshPipeline {
    fn fragment_shader(&self, pass: ShadingPass) -> Handle<Shader> {
        match pass {
            ShadingPass::Naive => self.naive_shader.clone(),
            ShadingPass::ForwardPlus => self.forward_plus_shader.clone(),
            ShadingPass::GBuffer => self.gbuffer_shader.clone(),
        }
    }
}

impl SpecializedMeshPipeline for ClusteredMeshPipeline {
    type Key = ClusteredMeshPipelineKey;

    fn specialize(
        &self,
        key: Self::Key,
        layout: &MeshVertexBufferLayoutRef,
    ) -> Result<RenderPipelineDescriptor, SpecializedMeshPipelineError> {
        // mesh_view_types sizes its light arrays from these.
        let mut shader_defs: Vec<ShaderDefVal> = vec![
            ShaderDefVal::UInt(
                "MAX_DIRECTIONAL_LIGHTS".into(),
                MAX_DIRECTIONAL_LIGHTS as u32,
            ),
            ShaderDefVal::UInt(
                "MAX_CASCADES_PER_LIGHT".into(),
                MAX_CASCADES_PER_LIGHT as u32,
            ),
        ];
        if let Some(batch_size) = self.mesh_pipeline.per_object_buffer_batch_size {
            shader_defs.push(ShaderDefVal::UInt(
                "PER_OBJECT_BUFFER_BATCH_SIZE".into(),
                batch_size,
            ));
        }

        let mut vertex_attributes = vec![
            Mesh::ATTRIBUTE_POSITION.at_shader_location(0),
            Mesh::ATTRIBUTE_NORMAL.at_shader_location(1),
        ];
        if layout.0.contains(Mesh::ATTRIBUTE_COLOR) {
            shader_defs.push("VERTEX_COLORS".into());
            vertex_attributes.push(Mesh::ATTRIBUTE_COLOR.at_shader_location(2));
        }
        let vertex_buffer_layout = layout.0.get_layout(&vertex_attributes)?;

        let targets = key
            .pass
            .color_formats(key.mesh_key.contains(MeshPipelineKey::HDR))
            .into_iter()
            .map(|format| {
                Some(ColorTargetState {
                    format,
                    blend: None,
                    write_mask: ColorWrites::ALL,
                })
            })
            .collect();

        Ok(RenderPipelineDescriptor {
            label: Some(format!("clustered_mesh_pipeline_{:?}", key.pass).into()),
            layout: vec![
                // @group(0) view uniforms via SetMeshViewBindGroup.
                self.mesh_pipeline
                    .get_view_layout(MeshPipelineViewLayoutKey::from(key.mesh_key))
                    .clone(),
                // @group(1) mesh uniforms via SetMeshBindGroup.
                self.mesh_pipeline.mesh_layouts.model_only.clone(),
                // @group(2) cluster view, lights, light grid and index list.
                self.shading_layout.clone(),
            ],
            push_constant_ranges: vec![],
            vertex: VertexState {
                shader: self.vertex_shader.clone(),
                entry_point: "vertex".into(),
                shader_defs: shader_defs.clone(),
                buffers: vec![vertex_buffer_layout],
            },
            fragment: Some(FragmentState {
                shader: self.fragment_shader(key.pass),
                entry_point: "fragment".into(),
                shader_defs,
                targets,
            }),
            primitive: PrimitiveState {
                topology: key.mesh_key.primitive_topology(),
                front_face: FrontFace::Ccw,
                cull_mode: Some(Face::Back),
                polygon_mode: PolygonMode::Fill,
                ..default()
            },
            depth_stencil: Some(DepthStencilState {
                format: CORE_3D_DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Greater,
                stencil: StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: MultisampleState {
                count: key.mesh_key.msaa_samples(),
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            zero_initialize_workgroup_memory: false,
        })
    }
}

pub type DrawClusteredMesh = (
    SetItemPipeline,
    SetMeshViewBindGroup<0>,
    SetMeshBindGroup<1>,
    SetClusterShadingBindGroup<2>,
    DrawMesh,
);

/// Binds the view's cluster shading group. Views without one skip the draw.
pub struct SetClusterShadingBindGroup<const I: usize>;

impl<P: PhaseItem, const I: usize> RenderCommand<P> for SetClusterShadingBindGroup<I> {
    type Param = ();
    type ViewQuery = Option<Read<ViewClusterBindGroups>>;
    type ItemQuery = ();

    #[inline]
    fn render<'w>(
        _item: &P,
        bind_groups: Option<&'w ViewClusterBindGroups>,
        _entity: Option<()>,
        _param: SystemParamItem<'w, '_, Self::Param>,
        pass: &mut TrackedRenderPass<'w>,
    ) -> RenderCommandResult {
        let Some(bind_groups) = bind_groups else {
            return RenderCommandResult::Skip;
        };
        pass.set_bind_group(I, &bind_groups.shading, &[]);
        RenderCommandResult::Success
    }
}

/// Phase item for the clustered geometry passes, sorted front to back.
pub struct ClusteredMeshPhase {
    pub sort_key: FloatOrd,
    pub entity: (Entity, MainEntity),
    pub pipeline: CachedRenderPipelineId,
    pub draw_function: DrawFunctionId,
    pub batch_range: Range<u32>,
    pub extra_index: PhaseItemExtraIndex,
    pub indexed: bool,
}

impl PhaseItem for ClusteredMeshPhase {
    fn entity(&self) -> Entity {
        self.entity.0
    }

    fn main_entity(&self) -> MainEntity {
        self.entity.1
    }

    fn draw_function(&self) -> DrawFunctionId {
        self.draw_function
    }

    fn batch_range(&self) -> &Range<u32> {
        &self.batch_range
    }

    fn batch_range_mut(&mut self) -> &mut Range<u32> {
        &mut self.batch_range
    }

    fn extra_index(&self) -> PhaseItemExtraIndex {
        self.extra_index.clone()
    }

    fn batch_range_and_extra_index_mut(&mut self) -> (&mut Range<u32>, &mut PhaseItemExtraIndex) {
        (&mut self.batch_range, &mut self.extra_index)
    }
}

impl SortedPhaseItem for ClusteredMeshPhase {
    type SortKey = FloatOrd;

    fn sort_key(&self) -> Self::SortKey {
        self.sort_key
    }

    fn sort(items: &mut [Self]) {
        items.sort_by_key(SortedPhaseItem::sort_key);
    }

    fn indexed(&self) -> bool {
        self.indexed
    }
}

impl CachedRenderPipelinePhaseItem for ClusteredMeshPhase {
    fn cached_pipeline(&self) -> CachedRenderPipelineId {
        self.pipeline
    }
}

/// Queue every visible `ShadedMesh` with the pipeline of the active renderer.
pub fn queue_clustered_meshes(
    draw_functions: Res<DrawFunctions<ClusteredMeshPhase>>,
    mut pipelines: ResMut<SpecializedMeshPipelines<ClusteredMeshPipeline>>,
    pipeline_cache: Res<PipelineCache>,
    clustered_pipeline: Res<ClusteredMeshPipeline>,
    active_renderer: Res<ActiveRenderer>,
    render_meshes: Res<RenderAssets<RenderMesh>>,
    render_mesh_instances: Res<RenderMeshInstances>,
    mut clustered_phases: ResMut<ViewSortedRenderPhases<ClusteredMeshPhase>>,
    views: Query<(&ExtractedView, &RenderVisibleEntities, &Msaa)>,
    shaded_meshes: Query<(), With<ShadedMesh>>,
) {
    let Some(pass) = active_renderer.shading_pass() else {
        return;
    };
    let draw_function = draw_functions.read().id::<DrawClusteredMesh>();

    for (view, visible_entities, msaa) in &views {
        let Some(phase) = clustered_phases.get_mut(&view.retained_view_entity) else {
            continue;
        };

        let view_key = MeshPipelineKey::from_msaa_samples(msaa.samples())
            | MeshPipelineKey::from_hdr(view.hdr);
        let rangefinder = view.rangefinder3d();

        for (render_entity, visible_entity) in visible_entities.iter::<Mesh3d>() {
            if shaded_meshes.get(*render_entity).is_err() {
                continue;
            }
            let Some(mesh_instance) = render_mesh_instances.render_mesh_queue_data(*visible_entity)
            else {
                continue;
            };
            let Some(mesh) = render_meshes.get(mesh_instance.mesh_asset_id) else {
                continue;
            };

            let key = ClusteredMeshPipelineKey {
                mesh_key: view_key
                    | MeshPipelineKey::from_primitive_topology(mesh.primitive_topology()),
                pass,
            };
            let pipeline_id =
                match pipelines.specialize(&pipeline_cache, &clustered_pipeline, key, &mesh.layout)
                {
                    Ok(id) => id,
                    Err(err) => {
                        error!("Clustered mesh pipeline specialization failed: {}", err);
                        continue;
                    }
                };

            // View-space z is negative in front of the camera; nearest first.
            let distance = rangefinder.distance_translation(&mesh_instance.translation);

            phase.add(ClusteredMeshPhase {
                sort_key: FloatOrd(-distance),
                entity: (*render_entity, *visible_entity),
                pipeline: pipeline_id,
                draw_function,
                batch_range: 0..1,
                extra_index: PhaseItemExtraIndex::None,
                indexed: mesh.indexed(),
            });
        }
    }
}
