use crate::engine::lights::light_set::LightSet;
use bevy::prelude::*;
use bevy::render::Extract;

/// Render world copy of the light set, already packed as
/// `{count, light[0..count)}`.
#[derive(Resource, Default)]
pub struct ExtractedLightSet {
    pub bytes: Vec<u8>,
    pub capacity: u32,
}

pub fn extract_light_set(
    mut extracted: ResMut<ExtractedLightSet>,
    light_set: Extract<Option<Res<LightSet>>>,
) {
    let Some(light_set) = light_set.as_ref() else {
        return;
    };

    light_set.write_packed(&mut extracted.bytes);
    extracted.capacity = light_set.capacity();
}
