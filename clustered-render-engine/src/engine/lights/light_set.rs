use crate::engine::core::config::LightConfig;
use crate::engine::core::error::LightSetError;
use bevy::prelude::*;
use bytemuck::{Pod, Zeroable};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Point light as laid out in the GPU light set buffer (std430, 32 bytes).
#[repr(C)]
#[derive(Pod, Zeroable, Copy, Clone, Debug, Default, PartialEq)]
pub struct GpuPointLight {
    pub position: [f32; 3],
    pub radius: f32,
    pub color: [f32; 3],
    pub intensity: f32,
}

/// Header preceding the light array. Padded so `lights` starts at a 16 byte offset.
#[repr(C)]
#[derive(Pod, Zeroable, Copy, Clone, Debug, Default, PartialEq)]
pub struct GpuLightSetHeader {
    pub num_lights: u32,
    pub _padding: [u32; 3],
}

pub const LIGHT_SET_HEADER_SIZE: u64 = std::mem::size_of::<GpuLightSetHeader>() as u64;
pub const GPU_POINT_LIGHT_SIZE: u64 = std::mem::size_of::<GpuPointLight>() as u64;

/// Axis-aligned box the lights wander in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl LightBounds {
    pub fn new(min: Vec3, max: Vec3) -> Result<Self, LightSetError> {
        if !min.cmplt(max).all() {
            return Err(LightSetError::EmptyBounds { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Fold a position that left the box back inside, flipping the velocity
    /// component of every face it crossed.
    fn reflect(&self, position: &mut Vec3, velocity: &mut Vec3) {
        for axis in 0..3 {
            let (lo, hi) = (self.min[axis], self.max[axis]);
            if position[axis] < lo {
                position[axis] = lo + (lo - position[axis]);
                velocity[axis] = velocity[axis].abs();
            } else if position[axis] > hi {
                position[axis] = hi - (position[axis] - hi);
                velocity[axis] = -velocity[axis].abs();
            }
        }
        // A step longer than the box is wide can overshoot the opposite face.
        *position = position.clamp(self.min, self.max);
    }
}

/// Authoritative set of animated point lights.
///
/// Storage is allocated once for `capacity` lights. Only the prefix
/// `[0, active_count)` is simulated, uploaded and shaded.
#[derive(Resource, Clone)]
pub struct LightSet {
    lights: Vec<GpuPointLight>,
    velocities: Vec<Vec3>,
    active_count: u32,
    bounds: LightBounds,
    max_speed: f32,
    jitter: f32,
    rng: ChaCha8Rng,
}

impl LightSet {
    pub fn new(config: &LightConfig) -> Result<Self, LightSetError> {
        if config.max_lights == 0 {
            return Err(LightSetError::ZeroCapacity);
        }
        if !(config.radius > 0.0) {
            return Err(LightSetError::InvalidRadius(config.radius));
        }
        let bounds = LightBounds::new(
            Vec3::from_array(config.bounds_min),
            Vec3::from_array(config.bounds_max),
        )?;

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let capacity = config.max_lights as usize;
        let mut lights = Vec::with_capacity(capacity);
        let mut velocities = Vec::with_capacity(capacity);

        for _ in 0..capacity {
            let position = Vec3::new(
                rng.random_range(bounds.min.x..=bounds.max.x),
                rng.random_range(bounds.min.y..=bounds.max.y),
                rng.random_range(bounds.min.z..=bounds.max.z),
            );
            let color = Color::hsl(rng.random_range(0.0..360.0), 1.0, 0.5).to_linear();

            lights.push(GpuPointLight {
                position: position.to_array(),
                radius: config.radius,
                color: [color.red, color.green, color.blue],
                intensity: config.intensity,
            });
            velocities.push(random_direction(&mut rng) * config.max_speed * 0.5);
        }

        let mut light_set = Self {
            lights,
            velocities,
            active_count: 0,
            bounds,
            max_speed: config.max_speed,
            jitter: config.jitter,
            rng,
        };
        light_set.set_active_count(config.initial_lights)?;
        Ok(light_set)
    }

    pub fn capacity(&self) -> u32 {
        self.lights.len() as u32
    }

    pub fn active_count(&self) -> u32 {
        self.active_count
    }

    pub fn bounds(&self) -> LightBounds {
        self.bounds
    }

    pub fn active(&self) -> &[GpuPointLight] {
        &self.lights[..self.active_count as usize]
    }

    /// Change how many lights are live. Counts above capacity are rejected and
    /// the previous count is kept.
    pub fn set_active_count(&mut self, count: u32) -> Result<(), LightSetError> {
        if count > self.capacity() {
            return Err(LightSetError::ActiveCountOutOfRange {
                requested: count,
                capacity: self.capacity(),
            });
        }
        self.active_count = count;
        Ok(())
    }

    /// Nudge the active count by `delta`, saturating at `0` and capacity.
    pub fn adjust_active_count(&mut self, delta: i64) -> u32 {
        let target = (self.active_count as i64 + delta).clamp(0, self.capacity() as i64);
        self.active_count = target as u32;
        self.active_count
    }

    /// Advance the random walk by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        let count = self.active_count as usize;
        for (light, velocity) in self.lights[..count]
            .iter_mut()
            .zip(self.velocities[..count].iter_mut())
        {
            let kick = random_direction(&mut self.rng) * self.jitter * dt;
            *velocity = (*velocity + kick).clamp_length_max(self.max_speed);

            let mut position = Vec3::from_array(light.position) + *velocity * dt;
            self.bounds.reflect(&mut position, velocity);
            light.position = position.to_array();
        }
    }

    /// Serialise `{count, lights[0..count)}` into `out`, replacing its contents.
    pub fn write_packed(&self, out: &mut Vec<u8>) {
        let header = GpuLightSetHeader {
            num_lights: self.active_count,
            _padding: [0; 3],
        };
        out.clear();
        out.extend_from_slice(bytemuck::bytes_of(&header));
        out.extend_from_slice(bytemuck::cast_slice(self.active()));
    }

    pub fn packed(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.write_packed(&mut bytes);
        bytes
    }

    /// Buffer size needed to hold every light the set can ever activate.
    pub fn buffer_size_for(capacity: u32) -> u64 {
        LIGHT_SET_HEADER_SIZE + GPU_POINT_LIGHT_SIZE * capacity as u64
    }
}

fn random_direction(rng: &mut ChaCha8Rng) -> Vec3 {
    let direction = Vec3::new(
        rng.random_range(-1.0..=1.0),
        rng.random_range(-1.0..=1.0),
        rng.random_range(-1.0..=1.0),
    );
    direction.normalize_or_zero()
}
