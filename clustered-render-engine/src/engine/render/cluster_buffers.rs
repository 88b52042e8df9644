use crate::engine::cluster::culling::LightGridEntry;
use crate::engine::cluster::grid::ClusterGrid;
use crate::engine::core::config::ClusterSettings;
use crate::engine::core::error::ShadingError;
use crate::engine::lights::light_set::LightSet;
use crate::engine::render::extraction::light_set::ExtractedLightSet;
use bevy::prelude::*;
use bevy::render::{
    render_resource::{
        binding_types::{
            storage_buffer_read_only_sized, storage_buffer_sized, texture_2d,
            uniform_buffer_sized,
        },
        BindGroup, BindGroupEntries, BindGroupLayout, BindGroupLayoutEntries, Buffer,
        BufferDescriptor, BufferInitDescriptor, BufferUsages, ShaderStages, TextureSampleType,
    },
    renderer::{RenderDevice, RenderQueue},
    view::ExtractedView,
};

/// Size of one `ClusterBounds` entry: two `vec4<f32>`.
pub const CLUSTER_BOUNDS_ENTRY_SIZE: u64 = 32;

/// Bind group layouts shared by the culling compute pipelines, the mesh
/// pipelines and the deferred compose pipeline.
///
/// ```wgsl
/// // bounds (compute)
/// @group(0) @binding(0) var<uniform> cluster_view: ClusterView;
/// @group(0) @binding(1) var<storage, read_write> cluster_bounds: array<ClusterBounds>;
///
/// // culling (compute)
/// @group(0) @binding(0) var<uniform> cluster_view: ClusterView;
/// @group(0) @binding(1) var<storage, read> light_set: LightSet;
/// @group(0) @binding(2) var<storage, read> cluster_bounds: array<ClusterBounds>;
/// @group(0) @binding(3) var<storage, read_write> light_grid: array<LightGridEntry>;
/// @group(0) @binding(4) var<storage, read_write> light_indices: array<u32>;
///
/// // shading (fragment), group 2 for meshes and group 0 for compose
/// @binding(0) var<uniform> cluster_view: ClusterView;
/// @binding(1) var<storage, read> light_set: LightSet;
/// @binding(2) var<storage, read> light_grid: array<LightGridEntry>;
/// @binding(3) var<storage, read> light_indices: array<u32>;
/// ```
#[derive(Resource)]
pub struct ClusterBindGroupLayouts {
    pub bounds: BindGroupLayout,
    pub culling: BindGroupLayout,
    pub shading: BindGroupLayout,
    pub gbuffer: BindGroupLayout,
}

impl FromWorld for ClusterBindGroupLayouts {
    fn from_world(world: &mut World) -> Self {
        let render_device = world.resource::<RenderDevice>();

        let bounds = render_device.create_bind_group_layout(
            "cluster_bounds_layout",
            &BindGroupLayoutEntries::sequential(
                ShaderStages::COMPUTE,
                (
                    uniform_buffer_sized(false, None),
                    storage_buffer_sized(false, None),
                ),
            ),
        );

        let culling = render_device.create_bind_group_layout(
            "light_culling_layout",
            &BindGroupLayoutEntries::sequential(
                ShaderStages::COMPUTE,
                (
                    uniform_buffer_sized(false, None),
                    storage_buffer_read_only_sized(false, None),
                    storage_buffer_read_only_sized(false, None),
                    storage_buffer_sized(false, None),
                    storage_buffer_sized(false, None),
                ),
            ),
        );

        let shading = render_device.create_bind_group_layout(
            "cluster_shading_layout",
            &BindGroupLayoutEntries::sequential(
                ShaderStages::FRAGMENT,
                (
                    uniform_buffer_sized(false, None),
                    storage_buffer_read_only_sized(false, None),
                    storage_buffer_read_only_sized(false, None),
                    storage_buffer_read_only_sized(false, None),
                ),
            ),
        );

        let gbuffer = render_device.create_bind_group_layout(
            "gbuffer_layout",
            &BindGroupLayoutEntries::sequential(
                ShaderStages::FRAGMENT,
                (
                    texture_2d(TextureSampleType::Float { filterable: false }),
                    texture_2d(TextureSampleType::Float { filterable: false }),
                    texture_2d(TextureSampleType::Float { filterable: false }),
                ),
            ),
        );

        Self {
            bounds,
            culling,
            shading,
            gbuffer,
        }
    }
}

/// Shape of the cluster storage. Buffers are rebuilt whenever it changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClusterBufferKey {
    pub cluster_count: u32,
    pub max_lights_per_cluster: u32,
    pub light_capacity: u32,
}

impl ClusterBufferKey {
    pub fn light_set_size(&self) -> u64 {
        LightSet::buffer_size_for(self.light_capacity)
    }

    pub fn light_grid_size(&self) -> u64 {
        self.cluster_count as u64 * std::mem::size_of::<LightGridEntry>() as u64
    }

    pub fn light_indices_size(&self) -> u64 {
        self.cluster_count as u64 * self.max_lights_per_cluster as u64 * 4
    }

    pub fn cluster_bounds_size(&self) -> u64 {
        self.cluster_count as u64 * CLUSTER_BOUNDS_ENTRY_SIZE
    }

    /// Reject storage a single binding on this device could not hold.
    pub fn check_binding_limit(&self, limit: u64) -> Result<(), ShadingError> {
        [
            ("light set buffer", self.light_set_size()),
            ("light grid buffer", self.light_grid_size()),
            ("light index list", self.light_indices_size()),
            ("cluster bounds buffer", self.cluster_bounds_size()),
        ]
        .into_iter()
        .find(|&(_, size)| size > limit)
        .map_or(Ok(()), |(buffer, size)| {
            Err(ShadingError::StorageTooLarge {
                buffer,
                size,
                limit,
            })
        })
    }
}

/// GPU storage for the light set and the culling outputs.
pub struct ClusterBuffers {
    key: ClusterBufferKey,
    pub light_set: Buffer,
    pub light_grid: Buffer,
    pub light_indices: Buffer,
    pub cluster_bounds: Buffer,
}

impl ClusterBuffers {
    fn new(render_device: &RenderDevice, key: ClusterBufferKey) -> Self {
        let storage = |label: &'static str, size: u64, usage: BufferUsages| {
            render_device.create_buffer(&BufferDescriptor {
                label: Some(label),
                size,
                usage,
                mapped_at_creation: false,
            })
        };

        Self {
            key,
            light_set: storage(
                "light_set_buffer",
                key.light_set_size(),
                BufferUsages::STORAGE | BufferUsages::COPY_DST,
            ),
            light_grid: storage(
                "light_grid_buffer",
                key.light_grid_size(),
                BufferUsages::STORAGE,
            ),
            light_indices: storage(
                "light_index_list_buffer",
                key.light_indices_size(),
                BufferUsages::STORAGE,
            ),
            cluster_bounds: storage(
                "cluster_bounds_buffer",
                key.cluster_bounds_size(),
                BufferUsages::STORAGE,
            ),
        }
    }

    pub fn key(&self) -> ClusterBufferKey {
        self.key
    }
}

#[derive(Resource, Default)]
pub struct ClusterGpuStorage {
    pub buffers: Option<ClusterBuffers>,
}

/// Upload this frame's light set, reallocating storage if the grid or the
/// light capacity changed.
pub fn prepare_cluster_buffers(
    mut storage: ResMut<ClusterGpuStorage>,
    settings: Res<ClusterSettings>,
    light_set: Res<ExtractedLightSet>,
    render_device: Res<RenderDevice>,
    render_queue: Res<RenderQueue>,
    mut rejected: Local<Option<ClusterBufferKey>>,
) {
    if light_set.capacity == 0 {
        return;
    }

    let key = ClusterBufferKey {
        cluster_count: settings.dimensions.cluster_count(),
        max_lights_per_cluster: settings.max_lights_per_cluster,
        light_capacity: light_set.capacity,
    };

    let stale = storage
        .buffers
        .as_ref()
        .is_none_or(|buffers| buffers.key() != key);
    if stale {
        if *rejected == Some(key) {
            return;
        }
        let limit = render_device.limits().max_storage_buffer_binding_size as u64;
        if let Err(err) = key.check_binding_limit(limit) {
            error!("Clustered shading disabled: {}", err);
            storage.buffers = None;
            *rejected = Some(key);
            return;
        }
        *rejected = None;
        info!(
            "Allocating cluster storage: {} clusters, {} lights/cluster, {} light capacity",
            key.cluster_count, key.max_lights_per_cluster, key.light_capacity
        );
        storage.buffers = Some(ClusterBuffers::new(&render_device, key));
    }

    if let Some(buffers) = &storage.buffers {
        render_queue.write_buffer(&buffers.light_set, 0, &light_set.bytes);
    }
}

/// Per-view bind groups over the shared cluster storage. Culling and every
/// clustered shading pass run only for views carrying this component.
#[derive(Component)]
pub struct ViewClusterBindGroups {
    pub bounds: BindGroup,
    pub culling: BindGroup,
    pub shading: BindGroup,
    pub cluster_count: u32,
}

pub fn prepare_view_cluster_bind_groups(
    mut commands: Commands,
    views: Query<(Entity, &ExtractedView)>,
    settings: Res<ClusterSettings>,
    storage: Res<ClusterGpuStorage>,
    layouts: Res<ClusterBindGroupLayouts>,
    render_device: Res<RenderDevice>,
    mut reported: Local<bool>,
) {
    for (entity, view) in &views {
        let Some(buffers) = &storage.buffers else {
            commands.entity(entity).remove::<ViewClusterBindGroups>();
            continue;
        };

        // Bevy's perspective projection is infinite reversed-Z: the near plane
        // lives in the fourth column.
        let near = view.clip_from_view.w_axis.z;
        let grid = match ClusterGrid::from_projection(
            settings.dimensions,
            view.clip_from_view,
            near,
            settings.far,
            view.viewport.zw(),
        ) {
            Ok(grid) => grid,
            Err(err) => {
                if !*reported {
                    warn!("Clustered shading disabled for view: {}", err);
                    *reported = true;
                }
                commands.entity(entity).remove::<ViewClusterBindGroups>();
                continue;
            }
        };
        *reported = false;

        let view_from_world = view.world_from_view.compute_matrix().inverse();
        let uniform = grid.uniform(
            view_from_world,
            settings.max_lights_per_cluster,
            settings.ambient,
        );
        let uniform_buffer = render_device.create_buffer_with_data(&BufferInitDescriptor {
            label: Some("cluster_view_uniform"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: BufferUsages::UNIFORM,
        });

        let bounds = render_device.create_bind_group(
            "cluster_bounds_bind_group",
            &layouts.bounds,
            &BindGroupEntries::sequential((
                uniform_buffer.as_entire_binding(),
                buffers.cluster_bounds.as_entire_binding(),
            )),
        );

        let culling = render_device.create_bind_group(
            "light_culling_bind_group",
            &layouts.culling,
            &BindGroupEntries::sequential((
                uniform_buffer.as_entire_binding(),
                buffers.light_set.as_entire_binding(),
                buffers.cluster_bounds.as_entire_binding(),
                buffers.light_grid.as_entire_binding(),
                buffers.light_indices.as_entire_binding(),
            )),
        );

        let shading = render_device.create_bind_group(
            "cluster_shading_bind_group",
            &layouts.shading,
            &BindGroupEntries::sequential((
                uniform_buffer.as_entire_binding(),
                buffers.light_set.as_entire_binding(),
                buffers.light_grid.as_entire_binding(),
                buffers.light_indices.as_entire_binding(),
            )),
        );

        commands.entity(entity).insert(ViewClusterBindGroups {
            bounds,
            culling,
            shading,
            cluster_count: grid.cluster_count(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::lights::light_set::{GPU_POINT_LIGHT_SIZE, LIGHT_SET_HEADER_SIZE};

    #[test]
    fn buffer_sizes_follow_grid_and_capacity() {
        let key = ClusterBufferKey {
            cluster_count: 16 * 9 * 24,
            max_lights_per_cluster: 256,
            light_capacity: 5000,
        };

        assert_eq!(key.light_grid_size(), 3456 * 8);
        assert_eq!(key.light_indices_size(), 3456 * 256 * 4);
        assert_eq!(key.cluster_bounds_size(), 3456 * 32);
        assert_eq!(
            key.light_set_size(),
            LIGHT_SET_HEADER_SIZE + 5000 * GPU_POINT_LIGHT_SIZE
        );
    }

    #[test]
    fn oversized_storage_is_rejected_before_allocation() {
        let default_grid = ClusterBufferKey {
            cluster_count: 16 * 9 * 24,
            max_lights_per_cluster: 256,
            light_capacity: 5000,
        };
        let limit = 128 << 20;
        assert_eq!(default_grid.check_binding_limit(limit), Ok(()));

        let huge_cap = ClusterBufferKey {
            max_lights_per_cluster: 200_000,
            ..default_grid
        };
        assert_eq!(
            huge_cap.check_binding_limit(limit),
            Err(ShadingError::StorageTooLarge {
                buffer: "light index list",
                size: 3456 * 200_000 * 4,
                limit,
            })
        );
    }

    #[test]
    fn light_set_buffer_fits_every_active_count() {
        let key = ClusterBufferKey {
            cluster_count: 1,
            max_lights_per_cluster: 1,
            light_capacity: 100,
        };
        let light_set = LightSet::new(&crate::engine::core::config::LightConfig {
            max_lights: 100,
            initial_lights: 100,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(light_set.packed().len() as u64, key.light_set_size());
    }
}
