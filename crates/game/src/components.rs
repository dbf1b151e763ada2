//! Components attached to replicated gameplay entities.
//!
//! Ownership follows the job/system permission model: each component has one
//! logical writer per tick, declared through system parameters or job access
//! lists.

use bevy_ecs::entity::Entity;
use bevy_ecs::prelude::Component;
use crazycanvas_core::tunables::{
    DEFAULT_AMMO_CAPACITY, DEFAULT_FIRE_RATE, DEFAULT_RELOAD_TIME, FLAG_PICKUP_COOLDOWN,
    FLAG_RESPAWN_COOLDOWN,
};
use crazycanvas_core::{AmmoType, TeamIndex};
use glam::{Quat, Vec3};

/// World-space position.
#[derive(Component, Debug, Clone, Copy, PartialEq, Default)]
pub struct Position(pub Vec3);

/// World-space rotation.
#[derive(Component, Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotation(pub Quat);

/// World-space scale.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Scale(pub Vec3);

impl Default for Scale {
    fn default() -> Self {
        Self(Vec3::ONE)
    }
}

/// Linear velocity.
#[derive(Component, Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity(pub Vec3);

/// Team membership. Absent on neutral objects (common-mode flags, level
/// geometry).
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Team(pub TeamIndex);

/// Local-frame offset applied while attached to a holder.
#[derive(Component, Debug, Clone, Copy, PartialEq, Default)]
pub struct Offset(pub Vec3);

/// Attachment link from a carried object to its holder.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Attachment {
    /// Entity this object follows while attached.
    pub holder: Entity,
    /// Whether the attachment is live. When false the object obeys free
    /// physics positioning instead.
    pub attached: bool,
}

impl Attachment {
    /// A detached link (placeholder holder retained for packet replay).
    pub fn detached(holder: Entity) -> Self {
        Self {
            holder,
            attached: false,
        }
    }
}

/// Flag state. One flag entity lives for the whole match; respawn resets
/// attachment state rather than recreating the entity.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Flag {
    /// Clock time of the most recent drop.
    pub dropped_at: f32,
    /// Seconds after a drop during which pickups are refused.
    pub pickup_cooldown: f32,
    /// Seconds after a drop before the team-flag respawn sweep re-homes it.
    pub respawn_cooldown: f32,
    /// Set on pickup, cleared on delivery/respawn; gates the respawn sweep.
    pub has_been_picked_up: bool,
}

impl Flag {
    /// A fresh flag with default cooldowns, never picked up.
    pub fn new() -> Self {
        Self {
            dropped_at: f32::NEG_INFINITY,
            pickup_cooldown: FLAG_PICKUP_COOLDOWN,
            respawn_cooldown: FLAG_RESPAWN_COOLDOWN,
            has_been_picked_up: false,
        }
    }
}

impl Default for Flag {
    fn default() -> Self {
        Self::new()
    }
}

/// Marker for flag spawn point entities.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct FlagSpawn {
    /// Spawn jitter radius in meters.
    pub radius: f32,
}

/// Marker for delivery base trigger entities.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPoint {
    /// Team that may deliver here.
    pub team: TeamIndex,
}

/// Marker for player avatars.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Player;

/// The client's own avatar.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct LocalPlayer;

/// A remote avatar mirrored from the server.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct ForeignPlayer;

/// Height of the player's collision capsule, used to place a carried flag.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct CharacterHeight(pub f32);

impl Default for CharacterHeight {
    fn default() -> Self {
        Self(1.8)
    }
}

/// Link from a player to its weapon entity.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeaponRef(pub Entity);

/// One ammo pool with a fixed capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmmoPool {
    /// Rounds remaining.
    pub count: u32,
    /// Maximum rounds.
    pub capacity: u32,
}

impl AmmoPool {
    /// A full pool.
    pub fn full(capacity: u32) -> Self {
        Self {
            count: capacity,
            capacity,
        }
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Weapon state: fire cooldown, reload clock, and the two ammo pools.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Weapon {
    /// Player entity this weapon belongs to.
    pub owner: Entity,
    /// Shots per second.
    pub fire_rate: f32,
    /// Seconds until the next shot is allowed. Never negative.
    pub cooldown: f32,
    /// Seconds a reload takes.
    pub reload_time: f32,
    /// Seconds left on the current reload, zero when not reloading. Never
    /// negative.
    pub reload_clock: f32,
    /// Paint ammo pool.
    pub paint: AmmoPool,
    /// Water ammo pool.
    pub water: AmmoPool,
}

impl Weapon {
    /// A weapon with default tunables and full ammo.
    pub fn new(owner: Entity) -> Self {
        Self {
            owner,
            fire_rate: DEFAULT_FIRE_RATE,
            cooldown: 0.0,
            reload_time: DEFAULT_RELOAD_TIME,
            reload_clock: 0.0,
            paint: AmmoPool::full(DEFAULT_AMMO_CAPACITY),
            water: AmmoPool::full(DEFAULT_AMMO_CAPACITY),
        }
    }

    /// The pool for an ammo type.
    pub fn pool(&self, ammo: AmmoType) -> &AmmoPool {
        match ammo {
            AmmoType::Paint => &self.paint,
            AmmoType::Water => &self.water,
        }
    }

    /// Mutable pool for an ammo type.
    pub fn pool_mut(&mut self, ammo: AmmoType) -> &mut AmmoPool {
        match ammo {
            AmmoType::Paint => &mut self.paint,
            AmmoType::Water => &mut self.water,
        }
    }

    /// Whether a reload is in progress.
    pub fn is_reloading(&self) -> bool {
        self.reload_clock > 0.0
    }
}

/// Ephemeral paint/water projectile. Destroyed unconditionally on any
/// collision resolution.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projectile {
    /// Ammo flavor.
    pub ammo: AmmoType,
    /// Team of the shooter.
    pub team: TeamIndex,
}
