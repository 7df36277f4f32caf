use crate::types::Resources;

pub const TICK_RATE: u32 = 20;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;

pub const ROUND_DURATION_SEC: f32 = 900.0;
pub const MAX_PLAYERS: usize = 2;
pub const MAX_UNITS_PER_PLAYER: usize = 30;

pub const RESOURCE_CAP: f32 = 500.0;
pub const STARTING_RESOURCES: Resources = Resources {
    html: 100.0,
    css: 80.0,
    js: 60.0,
};
pub const BASE_PRODUCTION_RATES: Resources = Resources {
    html: 2.0,
    css: 1.5,
    js: 1.0,
};
pub const CAPTURE_BONUS_MULTIPLIER: f32 = 0.5;

pub const ADVANTAGE_MULTIPLIER: f32 = 1.5;
pub const NEUTRAL_MULTIPLIER: f32 = 1.0;
pub const DISADVANTAGE_MULTIPLIER: f32 = 0.7;
pub const FLANK_BONUS: f32 = 0.2;
pub const FIRST_STRIKE_MULTIPLIER: f32 = 2.0;

pub const ATTACK_RANGE_MELEE: f32 = 1.5;
pub const ATTACK_COOLDOWN_SEC: f32 = 1.0;
pub const EXECUTE_COOLDOWN_SEC: f32 = 60.0;
pub const AURA_RANGE: f32 = 1.5;
pub const SLOW_FIELD_RANGE: f32 = 2.5;
pub const SLOW_FIELD_MULTIPLIER: f32 = 0.5;

pub const CAPTURE_RADIUS: f32 = 1.5;
pub const CAPTURE_SPEED_DIMINISH: f32 = 0.7;
pub const CAPTURE_PROGRESS_MAX: f32 = 100.0;

pub const ARRIVAL_EPSILON: f32 = 0.1;
pub const SPAWN_JITTER: f32 = 0.5;

pub const MAP_WIDTH: i32 = 20;
pub const MAP_HEIGHT: i32 = 15;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Capture speed scales down with every extra unit standing on a node:
/// the first contributes fully, the second 0.7, the third 0.49, ...
pub fn capture_unit_factor(unit_count: usize) -> f32 {
    let mut factor = 0.0;
    let mut weight = 1.0;
    for _ in 0..unit_count {
        factor += weight;
        weight *= CAPTURE_SPEED_DIMINISH;
    }
    factor
}
