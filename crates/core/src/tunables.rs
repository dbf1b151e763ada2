//! Gameplay tunables shared by client and server.
//!
//! Both peers must agree on these values; a client with different numbers
//! would mispredict every weapon and flag interaction.

/// Seconds of pre-match countdown after the match-start broadcast.
pub const MATCH_BEGIN_COUNTDOWN_TIME: f32 = 5.0;

/// Seconds after the final countdown step before the UI hide cue fires.
pub const COUNTDOWN_HIDE_DELAY: f32 = 2.0;

/// Seconds a dropped flag refuses pickups after hitting the ground.
pub const FLAG_PICKUP_COOLDOWN: f32 = 2.5;

/// Seconds a dropped team flag waits before re-homing to its spawn
/// (team-flag mode only).
pub const FLAG_RESPAWN_COOLDOWN: f32 = 20.0;

/// Default flag-spawn jitter radius in meters.
pub const FLAG_SPAWN_RADIUS: f32 = 2.0;

/// Projectile muzzle speed in meters per second.
pub const PROJECTILE_SPEED: f32 = 30.0;

/// Distance from the weapon origin to the muzzle along the aim direction.
pub const MUZZLE_FORWARD_OFFSET: f32 = 0.5;

/// Default weapon fire rate in shots per second.
pub const DEFAULT_FIRE_RATE: f32 = 4.0;

/// Default reload duration in seconds.
pub const DEFAULT_RELOAD_TIME: f32 = 2.0;

/// Rounds per ammo pool at full capacity.
pub const DEFAULT_AMMO_CAPACITY: u32 = 25;

/// Score a team needs to win the match.
pub const DEFAULT_MAX_SCORE: u32 = 3;
