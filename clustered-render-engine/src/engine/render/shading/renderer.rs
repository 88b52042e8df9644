use crate::engine::core::error::ShadingError;
use crate::engine::render::cluster_buffers::{ClusterBindGroupLayouts, ViewClusterBindGroups};
use crate::engine::render::pipeline::clustered_mesh_pipeline::{
    ClusteredMeshPhase, ShadingPass, GBUFFER_ALBEDO_FORMAT, GBUFFER_NORMAL_FORMAT,
    GBUFFER_POSITION_FORMAT,
};
use crate::engine::render::shading::deferred::DeferredComposePipeline;
use crate::engine::systems::render_mode::{RenderMode, RenderModeState};
use bevy::prelude::*;
use bevy::render::{
    render_graph::NodeRunError,
    render_phase::SortedRenderPhase,
    render_resource::{
        BindGroup, BindGroupEntries, Extent3d, LoadOp, Operations, PipelineCache,
        RenderPassColorAttachment, RenderPassDescriptor, StoreOp, Texture, TextureDescriptor,
        TextureDimension, TextureFormat, TextureUsages, TextureView, TextureViewDescriptor,
    },
    renderer::{RenderContext, RenderDevice},
    view::{ExtractedView, ViewDepthTexture, ViewTarget},
};

/// One G-buffer target and its view.
pub struct GBufferTarget {
    texture: Texture,
    view: TextureView,
}

impl GBufferTarget {
    fn new(
        render_device: &RenderDevice,
        label: &'static str,
        size: UVec2,
        format: TextureFormat,
    ) -> Self {
        let texture = render_device.create_texture(&TextureDescriptor {
            label: Some(label),
            size: Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&TextureViewDescriptor::default());
        Self { texture, view }
    }

    fn cleared_attachment(&self) -> RenderPassColorAttachment<'_> {
        RenderPassColorAttachment {
            view: &self.view,
            resolve_target: None,
            ops: Operations {
                // Position w = 0 is the empty pixel sentinel.
                load: LoadOp::Clear(LinearRgba::NONE.into()),
                store: StoreOp::Store,
            },
        }
    }
}

/// G-buffer owned by the clustered deferred renderer.
pub struct DeferredTargets {
    size: UVec2,
    position: GBufferTarget,
    normal: GBufferTarget,
    albedo: GBufferTarget,
    bind_group: BindGroup,
}

impl DeferredTargets {
    pub fn validate_size(size: UVec2) -> Result<UVec2, ShadingError> {
        if size.x == 0 || size.y == 0 {
            return Err(ShadingError::EmptyGBuffer);
        }
        Ok(size)
    }

    fn new(
        render_device: &RenderDevice,
        layouts: &ClusterBindGroupLayouts,
        size: UVec2,
    ) -> Result<Self, ShadingError> {
        let size = Self::validate_size(size)?;
        let position =
            GBufferTarget::new(render_device, "gbuffer_position", size, GBUFFER_POSITION_FORMAT);
        let normal =
            GBufferTarget::new(render_device, "gbuffer_normal", size, GBUFFER_NORMAL_FORMAT);
        let albedo =
            GBufferTarget::new(render_device, "gbuffer_albedo", size, GBUFFER_ALBEDO_FORMAT);

        let bind_group = render_device.create_bind_group(
            "gbuffer_bind_group",
            &layouts.gbuffer,
            &BindGroupEntries::sequential((&position.view, &normal.view, &albedo.view)),
        );

        Ok(Self {
            size,
            position,
            normal,
            albedo,
            bind_group,
        })
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    fn release(self) {
        self.position.texture.destroy();
        self.normal.texture.destroy();
        self.albedo.texture.destroy();
    }
}

/// Everything a renderer needs to encode one view.
pub struct ViewDraw<'a> {
    pub entity: Entity,
    pub phase: &'a SortedRenderPhase<ClusteredMeshPhase>,
    pub target: &'a ViewTarget,
    pub depth: &'a ViewDepthTexture,
    pub cluster_bind_groups: &'a ViewClusterBindGroups,
}

/// The renderer currently shading the scene. Switching always stops the
/// old variant before the new one starts.
pub enum ShadingRenderer {
    Naive,
    ForwardPlus,
    ClusteredDeferred(DeferredTargets),
}

impl ShadingRenderer {
    pub fn start(
        mode: RenderMode,
        viewport: UVec2,
        render_device: &RenderDevice,
        layouts: &ClusterBindGroupLayouts,
    ) -> Result<Self, ShadingError> {
        Ok(match mode {
            RenderMode::Naive => ShadingRenderer::Naive,
            RenderMode::ForwardPlus => ShadingRenderer::ForwardPlus,
            RenderMode::ClusteredDeferred => ShadingRenderer::ClusteredDeferred(
                DeferredTargets::new(render_device, layouts, viewport)?,
            ),
        })
    }

    pub fn stop(self) {
        if let ShadingRenderer::ClusteredDeferred(targets) = self {
            targets.release();
        }
    }

    pub fn mode(&self) -> RenderMode {
        match self {
            ShadingRenderer::Naive => RenderMode::Naive,
            ShadingRenderer::ForwardPlus => RenderMode::ForwardPlus,
            ShadingRenderer::ClusteredDeferred(_) => RenderMode::ClusteredDeferred,
        }
    }

    pub fn shading_pass(&self) -> ShadingPass {
        match self {
            ShadingRenderer::Naive => ShadingPass::Naive,
            ShadingRenderer::ForwardPlus => ShadingPass::ForwardPlus,
            ShadingRenderer::ClusteredDeferred(_) => ShadingPass::GBuffer,
        }
    }

    /// Whether the renderer's resources still match the viewport.
    fn fits(&self, viewport: UVec2) -> bool {
        match self {
            ShadingRenderer::ClusteredDeferred(targets) => targets.size() == viewport,
            _ => true,
        }
    }

    pub fn draw(
        &self,
        render_context: &mut RenderContext,
        world: &World,
        view: &ViewDraw,
    ) -> Result<(), NodeRunError> {
        match self {
            ShadingRenderer::Naive | ShadingRenderer::ForwardPlus => {
                let mut render_pass =
                    render_context.begin_tracked_render_pass(RenderPassDescriptor {
                        label: Some("clustered_forward_pass"),
                        color_attachments: &[Some(view.target.get_color_attachment())],
                        depth_stencil_attachment: Some(view.depth.get_attachment(StoreOp::Store)),
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });
                view.phase
                    .render(&mut render_pass, world, view.entity)
                    .map_err(|draw_err| {
                        error!("Clustered forward phase render failed: {:?}", draw_err);
                        NodeRunError::DrawError(draw_err)
                    })
            }
            ShadingRenderer::ClusteredDeferred(targets) => {
                draw_deferred(targets, render_context, world, view)
            }
        }
    }
}

fn draw_deferred(
    targets: &DeferredTargets,
    render_context: &mut RenderContext,
    world: &World,
    view: &ViewDraw,
) -> Result<(), NodeRunError> {
    let compose = world.resource::<DeferredComposePipeline>();
    let pipeline_cache = world.resource::<PipelineCache>();
    let Some(compose_pipeline) =
        pipeline_cache.get_render_pipeline(compose.pipeline_id(view.target.is_hdr()))
    else {
        return Ok(());
    };

    {
        let mut gbuffer_pass = render_context.begin_tracked_render_pass(RenderPassDescriptor {
            label: Some("gbuffer_pass"),
            color_attachments: &[
                Some(targets.position.cleared_attachment()),
                Some(targets.normal.cleared_attachment()),
                Some(targets.albedo.cleared_attachment()),
            ],
            depth_stencil_attachment: Some(view.depth.get_attachment(StoreOp::Store)),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        view.phase
            .render(&mut gbuffer_pass, world, view.entity)
            .map_err(|draw_err| {
                error!("G-buffer phase render failed: {:?}", draw_err);
                NodeRunError::DrawError(draw_err)
            })?;
    }

    let mut compose_pass = render_context.begin_tracked_render_pass(RenderPassDescriptor {
        label: Some("deferred_compose_pass"),
        color_attachments: &[Some(view.target.get_color_attachment())],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    compose_pass.set_render_pipeline(compose_pipeline);
    compose_pass.set_bind_group(0, &view.cluster_bind_groups.shading, &[]);
    compose_pass.set_bind_group(1, &targets.bind_group, &[]);
    compose_pass.draw(0..3, 0..1);

    Ok(())
}

/// Render world slot for the running renderer.
#[derive(Resource, Default)]
pub struct ActiveRenderer {
    renderer: Option<ShadingRenderer>,
    failed_start: Option<(RenderMode, UVec2)>,
}

impl ActiveRenderer {
    pub fn get(&self) -> Option<&ShadingRenderer> {
        self.renderer.as_ref()
    }

    pub fn shading_pass(&self) -> Option<ShadingPass> {
        self.renderer.as_ref().map(ShadingRenderer::shading_pass)
    }

    pub fn uses_clusters(&self) -> bool {
        self.renderer
            .as_ref()
            .is_some_and(|renderer| renderer.mode().uses_clusters())
    }
}

/// Restart the renderer when the selected mode or the viewport changed.
pub fn update_active_renderer(
    mut active: ResMut<ActiveRenderer>,
    mode: Res<RenderModeState>,
    views: Query<&ExtractedView>,
    layouts: Res<ClusterBindGroupLayouts>,
    render_device: Res<RenderDevice>,
) {
    let Some(viewport) = views.iter().next().map(|view| view.viewport.zw()) else {
        return;
    };
    let wanted = mode.current_mode;

    let current = active
        .renderer
        .as_ref()
        .is_some_and(|renderer| renderer.mode() == wanted && renderer.fits(viewport));
    if current || active.failed_start == Some((wanted, viewport)) {
        return;
    }

    if let Some(previous) = active.renderer.take() {
        let previous_mode = previous.mode();
        previous.stop();
        if previous_mode != wanted {
            info!("Stopped {} renderer", previous_mode);
        }
    }

    match ShadingRenderer::start(wanted, viewport, &render_device, &layouts) {
        Ok(renderer) => {
            info!("Started {} renderer at {}x{}", wanted, viewport.x, viewport.y);
            active.renderer = Some(renderer);
            active.failed_start = None;
        }
        Err(err) => {
            error!("Failed to start {} renderer: {}", wanted, err);
            active.failed_start = Some((wanted, viewport));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_viewport_cannot_hold_a_gbuffer() {
        assert_eq!(
            DeferredTargets::validate_size(UVec2::new(0, 720)),
            Err(ShadingError::EmptyGBuffer)
        );
        assert_eq!(
            DeferredTargets::validate_size(UVec2::new(1280, 720)),
            Ok(UVec2::new(1280, 720))
        );
    }

    #[test]
    fn forward_renderers_map_to_their_pass() {
        assert_eq!(ShadingRenderer::Naive.shading_pass(), ShadingPass::Naive);
        assert_eq!(
            ShadingRenderer::ForwardPlus.shading_pass(),
            ShadingPass::ForwardPlus
        );
        assert_eq!(ShadingRenderer::ForwardPlus.mode(), RenderMode::ForwardPlus);
        assert!(ShadingRenderer::Naive.fits(UVec2::ZERO));
    }

    #[test]
    fn idle_slot_draws_nothing() {
        let active = ActiveRenderer::default();
        assert!(active.get().is_none());
        assert!(active.shading_pass().is_none());
        assert!(!active.uses_clusters());
    }
}
