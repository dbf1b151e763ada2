//! Weapon state machine: fire cooldown, dual ammo pools, reloads, and the
//! projectile hit rules.
//!
//! The pure transition functions run on both peers. The client uses them for
//! prediction on the local weapon; the server replays received
//! [`PlayerAction`] packets through the same functions, making them
//! authoritative.

use crate::components::{
    LocalPlayer, Player, Position, Projectile, Rotation, Team, Velocity, Weapon, WeaponRef,
};
use crate::events::{EventBus, GameEvent};
use bevy_ecs::entity::Entity;
use bevy_ecs::prelude::{Commands, Query, ResMut, With};
use crazycanvas_core::tunables::{MUZZLE_FORWARD_OFFSET, PROJECTILE_SPEED};
use crazycanvas_core::{AmmoType, PaintTeam, TeamIndex, FIXED_TICK_SECONDS};
use crazycanvas_ecs::{Job, JobWorld};
use crazycanvas_net::{PacketMailbox, PlayerAction, PlayerActionResponse};
use glam::{Quat, Vec3};
use tracing::warn;

/// Result of a fire attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// A round left the selected pool.
    Fired,
    /// Refused: the fire-rate cooldown has not elapsed.
    OnCooldown,
    /// Refused: the selected pool is empty.
    OutOfAmmo,
}

/// Attempt to fire one round of `ammo`. Pulling the trigger aborts any
/// reload in progress; on success the selected pool loses one round and the
/// cooldown restarts at `1 / fire_rate`.
pub fn try_fire(weapon: &mut Weapon, ammo: AmmoType) -> FireOutcome {
    weapon.reload_clock = 0.0;
    if weapon.cooldown > 0.0 {
        return FireOutcome::OnCooldown;
    }
    if weapon.pool(ammo).is_empty() {
        return FireOutcome::OutOfAmmo;
    }
    weapon.pool_mut(ammo).count -= 1;
    weapon.cooldown = 1.0 / weapon.fire_rate;
    FireOutcome::Fired
}

/// Begin a reload unless one is already running or both pools are full.
/// Returns whether a reload actually started.
pub fn start_reload(weapon: &mut Weapon) -> bool {
    if weapon.is_reloading() {
        return false;
    }
    if weapon.paint.count == weapon.paint.capacity && weapon.water.count == weapon.water.capacity {
        return false;
    }
    weapon.reload_clock = weapon.reload_time;
    true
}

/// Whether the weapon must auto-reload (both pools dry, no reload running).
pub fn auto_reload_due(weapon: &Weapon) -> bool {
    weapon.paint.is_empty() && weapon.water.is_empty() && !weapon.is_reloading()
}

/// Advance cooldown and reload clocks by `dt`, clamping at zero. Returns
/// `true` when a reload completed this step; completion refills both pools.
pub fn step_weapon(weapon: &mut Weapon, dt: f32) -> bool {
    weapon.cooldown = (weapon.cooldown - dt).max(0.0);
    if weapon.reload_clock > 0.0 {
        weapon.reload_clock = (weapon.reload_clock - dt).max(0.0);
        if weapon.reload_clock == 0.0 {
            weapon.paint.count = weapon.paint.capacity;
            weapon.water.count = weapon.water.capacity;
            return true;
        }
    }
    false
}

/// Muzzle position, projectile velocity, and aim direction for a shooter
/// transform.
pub fn muzzle_kinematics(position: Vec3, rotation: Quat) -> (Vec3, Vec3, Vec3) {
    let direction = (rotation * Vec3::NEG_Z).normalize_or_zero();
    let muzzle = position + direction * MUZZLE_FORWARD_OFFSET;
    (muzzle, direction * PROJECTILE_SPEED, direction)
}

/// Whether a projectile hit produces a splash.
///
/// Level geometry (`None`) always splashes. A friendly target only takes
/// water (clean-off), a hostile target only takes paint; everything else is
/// suppressed.
pub fn hit_allowed(ammo: AmmoType, shooter_team: TeamIndex, target_team: Option<TeamIndex>) -> bool {
    match target_team {
        None => true,
        Some(t) if t == shooter_team => ammo == AmmoType::Water,
        Some(_) => ammo == AmmoType::Paint,
    }
}

/// Fixed-tick system advancing every weapon's clocks; publishes reload
/// completion and kicks off auto-reloads.
///
/// An auto-reload on the local player's weapon accretes into the pending
/// [`PlayerAction`] like a manual reload, so the server replays it.
pub fn update_weapons(
    mut events: ResMut<EventBus>,
    mut weapons: Query<&mut Weapon>,
    mut locals: Query<&mut PacketMailbox<PlayerAction>, With<LocalPlayer>>,
) {
    for mut weapon in &mut weapons {
        if step_weapon(&mut weapon, FIXED_TICK_SECONDS) {
            events.publish(GameEvent::WeaponReloadFinished {
                owner: weapon.owner,
            });
        }
        if auto_reload_due(&weapon) && start_reload(&mut weapon) {
            if let Ok(mut actions) = locals.get_mut(weapon.owner) {
                actions.pending_mut().started_reload = true;
            }
        }
    }
}

/// Server-only fixed-tick system replaying received [`PlayerAction`]
/// packets against the authoritative weapon state.
///
/// A successful replayed fire spawns the server projectile and queues a
/// [`PlayerActionResponse`] so every client mirrors the shot.
#[allow(clippy::type_complexity)]
pub fn server_replay_player_actions(
    mut commands: Commands,
    mut events: ResMut<EventBus>,
    mut players: Query<
        (
            Entity,
            &Position,
            &Rotation,
            &Team,
            &WeaponRef,
            &mut PacketMailbox<PlayerAction>,
            &mut PacketMailbox<PlayerActionResponse>,
        ),
        With<Player>,
    >,
    mut weapons: Query<&mut Weapon>,
) {
    for (player, position, rotation, team, weapon_ref, mut actions, mut responses) in &mut players {
        for action in actions.drain_received() {
            let Ok(mut weapon) = weapons.get_mut(weapon_ref.0) else {
                warn!(?player, "player action for a missing weapon entity");
                continue;
            };
            if action.started_reload {
                start_reload(&mut weapon);
            }
            let Some(ammo) = action.fired_ammo else {
                continue;
            };
            // Invalid fires (cooldown, dry pool) are dropped; the client's
            // prediction already refused them locally.
            if try_fire(&mut weapon, ammo) != FireOutcome::Fired {
                continue;
            }
            let (muzzle, velocity, direction) = muzzle_kinematics(position.0, rotation.0);
            commands.spawn((
                Projectile {
                    ammo,
                    team: team.0,
                },
                Position(muzzle),
                Velocity(velocity),
            ));
            responses.queue_send(PlayerActionResponse {
                fired_ammo: ammo,
                weapon_position: muzzle.to_array(),
                weapon_velocity: velocity.to_array(),
            });
            events.publish(GameEvent::WeaponFired {
                owner: player,
                ammo,
                position: muzzle,
                velocity,
                direction,
                team: team.0,
            });
        }
    }
}

/// Build the job resolving a projectile collision reported by physics.
/// `other` is `None` for level geometry.
pub fn projectile_hit_job(projectile: Entity, other: Option<Entity>) -> Job {
    Job::build()
        .read::<Projectile>()
        .read::<Team>()
        .run(move |w| resolve_projectile_hit(w, projectile, other))
}

fn resolve_projectile_hit(w: &mut JobWorld<'_, '_>, projectile: Entity, other: Option<Entity>) {
    let Some(shot) = w.get::<Projectile>(projectile).copied() else {
        // Already resolved by an earlier contact this tick.
        return;
    };
    let target_team = other.and_then(|e| w.get::<Team>(e).map(|t| t.0));
    if hit_allowed(shot.ammo, shot.team, target_team) {
        w.resource_mut::<EventBus>().publish(GameEvent::ProjectileHit {
            projectile,
            other,
            ammo: shot.ammo,
            team: PaintTeam::from(shot.team),
            shooter_team: shot.team,
        });
    }
    // Destroyed on any contact, splash or not.
    w.despawn(projectile);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn weapon() -> Weapon {
        Weapon::new(Entity::from_raw(1))
    }

    #[test]
    fn fire_decrements_only_the_selected_pool() {
        let mut w = weapon();
        let paint_before = w.paint.count;
        let water_before = w.water.count;

        assert_eq!(try_fire(&mut w, AmmoType::Paint), FireOutcome::Fired);
        assert_eq!(w.paint.count, paint_before - 1);
        assert_eq!(w.water.count, water_before);
    }

    #[test]
    fn fire_is_refused_until_cooldown_elapses() {
        let mut w = weapon();
        assert_eq!(try_fire(&mut w, AmmoType::Paint), FireOutcome::Fired);
        assert_eq!(try_fire(&mut w, AmmoType::Paint), FireOutcome::OnCooldown);

        // Step past 1 / fire_rate.
        let mut remaining = 1.0 / w.fire_rate + 1e-3;
        while remaining > 0.0 {
            step_weapon(&mut w, FIXED_TICK_SECONDS);
            remaining -= FIXED_TICK_SECONDS;
        }
        assert_eq!(try_fire(&mut w, AmmoType::Paint), FireOutcome::Fired);
    }

    #[test]
    fn dry_pool_refuses_without_touching_counts() {
        let mut w = weapon();
        w.paint.count = 0;
        assert_eq!(try_fire(&mut w, AmmoType::Paint), FireOutcome::OutOfAmmo);
        assert_eq!(w.paint.count, 0);
        // The other pool still fires.
        assert_eq!(try_fire(&mut w, AmmoType::Water), FireOutcome::Fired);
    }

    #[test]
    fn fire_aborts_an_in_progress_reload() {
        let mut w = weapon();
        w.paint.count = 3;
        w.water.count = 0;
        assert!(start_reload(&mut w));

        // The shot proceeds as if not reloading; nothing was refilled.
        assert_eq!(try_fire(&mut w, AmmoType::Paint), FireOutcome::Fired);
        assert_eq!(w.reload_clock, 0.0);
        assert!(!w.is_reloading());
        assert_eq!(w.paint.count, 2);
        assert_eq!(w.water.count, 0);
    }

    #[test]
    fn completed_reload_refills_both_pools() {
        let mut w = weapon();
        w.paint.count = 3;
        w.water.count = 0;

        assert!(start_reload(&mut w));
        assert!(!start_reload(&mut w));

        let mut finished = false;
        let mut remaining = w.reload_time + 1e-3;
        while remaining > 0.0 {
            finished |= step_weapon(&mut w, FIXED_TICK_SECONDS);
            remaining -= FIXED_TICK_SECONDS;
        }
        assert!(finished);
        assert_eq!(w.paint.count, w.paint.capacity);
        assert_eq!(w.water.count, w.water.capacity);
        assert!(!w.is_reloading());
    }

    #[test]
    fn full_pools_refuse_a_reload() {
        let mut w = weapon();
        assert!(!start_reload(&mut w));
    }

    #[test]
    fn both_pools_dry_triggers_auto_reload() {
        let mut w = weapon();
        w.paint.count = 0;
        w.water.count = 1;
        assert!(!auto_reload_due(&w));
        w.water.count = 0;
        assert!(auto_reload_due(&w));
        start_reload(&mut w);
        assert!(!auto_reload_due(&w));
    }

    #[test]
    fn hit_matrix() {
        let blue = TeamIndex(0);
        let red = TeamIndex(1);

        // Level geometry always splashes.
        assert!(hit_allowed(AmmoType::Paint, blue, None));
        assert!(hit_allowed(AmmoType::Water, blue, None));
        // Friendly target: water only.
        assert!(hit_allowed(AmmoType::Water, blue, Some(blue)));
        assert!(!hit_allowed(AmmoType::Paint, blue, Some(blue)));
        // Hostile target: paint only.
        assert!(hit_allowed(AmmoType::Paint, blue, Some(red)));
        assert!(!hit_allowed(AmmoType::Water, blue, Some(red)));
    }

    #[test]
    fn muzzle_sits_forward_of_the_shooter() {
        let rotation = Quat::from_rotation_y(std::f32::consts::PI);
        let (muzzle, velocity, direction) = muzzle_kinematics(Vec3::ZERO, rotation);
        // Facing +Z after a half turn.
        assert!((direction - Vec3::Z).length() < 1e-5);
        assert!((muzzle - Vec3::Z * MUZZLE_FORWARD_OFFSET).length() < 1e-5);
        assert!((velocity - Vec3::Z * PROJECTILE_SPEED).length() < 1e-4);
    }

    proptest! {
        // Any interleaving of fires, reloads, and time steps keeps every
        // clock and pool within bounds.
        #[test]
        fn clocks_and_pools_stay_in_range(ops in prop::collection::vec(0u8..4, 0..200)) {
            let mut w = weapon();
            for op in ops {
                match op {
                    0 => { try_fire(&mut w, AmmoType::Paint); }
                    1 => { try_fire(&mut w, AmmoType::Water); }
                    2 => { start_reload(&mut w); }
                    _ => { step_weapon(&mut w, FIXED_TICK_SECONDS); }
                }
                prop_assert!(w.cooldown >= 0.0);
                prop_assert!(w.reload_clock >= 0.0);
                prop_assert!(w.paint.count <= w.paint.capacity);
                prop_assert!(w.water.count <= w.water.capacity);
            }
        }
    }
}
