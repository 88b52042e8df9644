pub const MAX_LIGHTS: u32 = 5000;
pub const INITIAL_LIGHTS: u32 = 500;
pub const LIGHT_COUNT_STEP: u32 = 100;

pub const LIGHT_RADIUS: f32 = 2.0;
pub const LIGHT_INTENSITY: f32 = 1.0;

/// Lights wander inside this world-space box.
pub const LIGHT_BOUNDS_MIN: [f32; 3] = [-14.0, 0.0, -6.0];
pub const LIGHT_BOUNDS_MAX: [f32; 3] = [14.0, 8.0, 6.0];

/// World units per second.
pub const LIGHT_MAX_SPEED: f32 = 1.5;
/// Velocity perturbation applied per second of simulated time.
pub const LIGHT_JITTER: f32 = 4.0;

pub const LIGHT_SEED: u64 = 0x6c69_6768_7473;

pub const AMBIENT_LIGHT: f32 = 0.025;
