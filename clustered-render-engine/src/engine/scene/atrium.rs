use crate::engine::camera::viewport_camera::ViewportCamera;
use crate::engine::render::pipeline::clustered_mesh_pipeline::ShadedMesh;
use bevy::core_pipeline::tonemapping::Tonemapping;
use bevy::prelude::*;
use bevy::render::view::Msaa;

const FLOOR_SIZE: Vec3 = Vec3::new(32.0, 0.2, 16.0);
const WALL_HEIGHT: f32 = 9.0;
const WALL_THICKNESS: f32 = 0.4;
const PILLAR_SIZE: Vec3 = Vec3::new(0.8, 8.0, 0.8);
const PILLARS_PER_ROW: u32 = 7;
const PILLAR_SPACING: f32 = 4.0;
const PILLAR_ROW_Z: [f32; 2] = [-3.0, 3.0];

#[derive(Component)]
pub struct AtriumPiece;

/// One box of the atrium.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PieceLayout {
    pub size: Vec3,
    pub translation: Vec3,
    pub color: Color,
}

pub fn atrium_layout() -> Vec<PieceLayout> {
    let half = FLOOR_SIZE * 0.5;
    let stone = Color::srgb(0.75, 0.72, 0.68);
    let plaster = Color::srgb(0.85, 0.83, 0.8);

    let mut pieces = vec![
        PieceLayout {
            size: FLOOR_SIZE,
            translation: Vec3::new(0.0, -half.y, 0.0),
            color: stone,
        },
        PieceLayout {
            size: Vec3::new(FLOOR_SIZE.x, WALL_HEIGHT, WALL_THICKNESS),
            translation: Vec3::new(0.0, WALL_HEIGHT * 0.5, -half.z),
            color: plaster,
        },
    ];
    for side in [-1.0, 1.0] {
        pieces.push(PieceLayout {
            size: Vec3::new(WALL_THICKNESS, WALL_HEIGHT, FLOOR_SIZE.z),
            translation: Vec3::new(side * half.x, WALL_HEIGHT * 0.5, 0.0),
            color: plaster,
        });
    }

    let first_x = -PILLAR_SPACING * (PILLARS_PER_ROW - 1) as f32 * 0.5;
    for (row, z) in PILLAR_ROW_Z.into_iter().enumerate() {
        for i in 0..PILLARS_PER_ROW {
            // Alternate warm and cool marble.
            let hue = if (i as usize + row) % 2 == 0 { 30.0 } else { 210.0 };
            pieces.push(PieceLayout {
                size: PILLAR_SIZE,
                translation: Vec3::new(
                    first_x + i as f32 * PILLAR_SPACING,
                    PILLAR_SIZE.y * 0.5,
                    z,
                ),
                color: Color::hsl(hue, 0.15, 0.8),
            });
        }
    }
    pieces
}

fn vertex_colored_cuboid(size: Vec3, color: Color) -> Mesh {
    let mesh = Mesh::from(Cuboid::from_size(size));
    let vertex_count = mesh.count_vertices();
    mesh.with_inserted_attribute(
        Mesh::ATTRIBUTE_COLOR,
        vec![color.to_linear().to_f32_array(); vertex_count],
    )
}

pub fn spawn_atrium(mut commands: Commands, mut meshes: ResMut<Assets<Mesh>>) {
    let pieces = atrium_layout();
    for piece in &pieces {
        commands.spawn((
            Mesh3d(meshes.add(vertex_colored_cuboid(piece.size, piece.color))),
            Transform::from_translation(piece.translation),
            ShadedMesh,
            AtriumPiece,
        ));
    }
    info!("Spawned atrium with {} pieces", pieces.len());
}

/// Single-sample and untonemapped: the shading node writes straight into the
/// view target.
pub fn spawn_camera(mut commands: Commands) {
    let transform =
        Transform::from_xyz(-10.0, 5.0, 14.0).looking_at(Vec3::new(0.0, 3.0, 0.0), Vec3::Y);
    commands.insert_resource(ViewportCamera::from_transform(&transform));
    commands.spawn((
        Camera3d::default(),
        Camera {
            clear_color: ClearColorConfig::Custom(Color::srgb(0.01, 0.01, 0.015)),
            ..default()
        },
        Projection::Perspective(PerspectiveProjection {
            fov: std::f32::consts::FRAC_PI_3,
            near: 0.1,
            ..default()
        }),
        Msaa::Off,
        Tonemapping::None,
        transform,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::core::config::LightConfig;

    #[test]
    fn atrium_encloses_the_light_volume() {
        let lights = LightConfig::default();
        let pieces = atrium_layout();
        assert_eq!(pieces.len(), 4 + 2 * PILLARS_PER_ROW as usize);

        let floor = pieces[0];
        let floor_top = floor.translation.y + floor.size.y * 0.5;
        assert_eq!(floor_top, 0.0);
        assert!(floor.size.x * 0.5 >= lights.bounds_max[0]);
        assert!(floor.size.z * 0.5 >= lights.bounds_max[2]);
    }

    #[test]
    fn cuboids_carry_one_color_per_vertex() {
        let mesh = vertex_colored_cuboid(Vec3::ONE, Color::WHITE);
        let colors = mesh.attribute(Mesh::ATTRIBUTE_COLOR).unwrap();
        assert_eq!(colors.len(), mesh.count_vertices());
        assert!(mesh.attribute(Mesh::ATTRIBUTE_NORMAL).is_some());
    }
}
