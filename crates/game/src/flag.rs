//! Flag state machine.
//!
//! States: idle at spawn, carried (attached to a player), dropped
//! (cooldown-gated pickup), delivered (pending re-home). The server owns
//! every transition; clients mirror them from [`FlagPacket`]s without
//! re-validating business rules. Pickup and delivery originate in physics
//! trigger callbacks, so the server mutations run as permission-declared
//! jobs rather than inline.

use crate::adapters::{Adapters, SoundCue};
use crate::components::{
    Attachment, CharacterHeight, DeliveryPoint, Flag, FlagSpawn, Offset, Player, Position,
    Rotation, Team,
};
use crate::events::{EventBus, GameEvent};
use crate::match_flow::{self, MatchInfo};
use crate::Clock;
use bevy_ecs::entity::Entity;
use bevy_ecs::prelude::{Query, Res, ResMut, With, Without};
use crazycanvas_core::{GameMode, TeamIndex};
use crazycanvas_ecs::{Job, JobWorld};
use crazycanvas_net::{FlagPacket, FlagPacketKind, NetworkUid, NetworkUidRegistry, PacketMailbox};
use glam::{Quat, Vec3};
use tracing::warn;

/// Pickup validity rule, identical on both peers.
///
/// Valid iff the post-drop cooldown has elapsed and the flag is neutral or
/// owned by a different team than the picking player.
pub fn pickup_allowed(
    now: f32,
    flag: &Flag,
    flag_team: Option<TeamIndex>,
    player_team: TeamIndex,
) -> bool {
    let cooldown_elapsed = now > flag.dropped_at + flag.pickup_cooldown;
    let team_ok = flag_team.map_or(true, |t| t != player_team);
    cooldown_elapsed && team_ok
}

/// Delivery validity rule, identical on both peers.
///
/// Valid iff the carrier delivers at their own team's base and the flag is
/// neutral or belongs to another team.
pub fn delivery_allowed(
    flag_team: Option<TeamIndex>,
    carrier_team: TeamIndex,
    point_team: TeamIndex,
) -> bool {
    carrier_team == point_team && flag_team.map_or(true, |t| t != carrier_team)
}

/// Transform of a carried flag: a fixed local offset in the carrier's
/// rotated frame.
pub fn carried_transform(carrier_pos: Vec3, carrier_rot: Quat, offset: Vec3) -> (Vec3, Quat) {
    (carrier_pos + carrier_rot * offset, carrier_rot)
}

/// Carry offset derived from the carrier's collision capsule height.
pub fn carry_offset(character_height: f32) -> Vec3 {
    Vec3::new(0.0, 0.5 * character_height + 0.3, -0.25)
}

/// Slave every carried flag to its carrier. Runs on both peers, every frame
/// and every fixed tick; iterates all flags rather than assuming a single
/// one.
pub fn slave_carried_flags(
    mut flags: Query<(&Attachment, &Offset, &mut Position, &mut Rotation), With<Flag>>,
    carriers: Query<(&Position, &Rotation), (With<Player>, Without<Flag>)>,
) {
    for (attachment, offset, mut position, mut rotation) in &mut flags {
        if !attachment.attached {
            continue;
        }
        let Ok((carrier_pos, carrier_rot)) = carriers.get(attachment.holder) else {
            continue;
        };
        let (p, r) = carried_transform(carrier_pos.0, carrier_rot.0, offset.0);
        position.0 = p;
        rotation.0 = r;
    }
}

/// Server-only: mirror each carried flag's logical transform into the
/// physics scene so future trigger tests see it where players see it.
pub fn push_flag_kinematic_targets(
    mut adapters: ResMut<Adapters>,
    flags: Query<(Entity, &Attachment, &Position, &Rotation), With<Flag>>,
) {
    for (entity, attachment, position, rotation) in &flags {
        if attachment.attached {
            adapters
                .physics
                .set_kinematic_target(entity, position.0, rotation.0);
        }
    }
}

/// Server-only respawn sweep, team-flag mode only, once per fixed tick.
///
/// A flag that was picked up and then dropped re-homes to a matching spawn
/// point after its respawn cooldown. Clearing `has_been_picked_up` makes the
/// sweep fire exactly once per drop.
#[allow(clippy::type_complexity)]
pub fn flag_respawn_sweep(
    clock: Res<Clock>,
    info: Res<MatchInfo>,
    mut events: ResMut<EventBus>,
    mut flags: Query<(
        Entity,
        &mut Flag,
        &Attachment,
        Option<&Team>,
        &mut Position,
        &mut Rotation,
        &mut PacketMailbox<FlagPacket>,
    )>,
    spawns: Query<(&Position, &FlagSpawn, Option<&Team>), Without<Flag>>,
) {
    if info.mode != GameMode::CtfTeamFlag {
        return;
    }
    let now = clock.now();
    for (entity, mut flag, attachment, team, mut position, mut rotation, mut mailbox) in &mut flags
    {
        if attachment.attached
            || !flag.has_been_picked_up
            || now <= flag.dropped_at + flag.respawn_cooldown
        {
            continue;
        }
        flag.has_been_picked_up = false;

        let team = team.map(|t| t.0);
        if let Some(home) = spawn_point_for(&spawns, team) {
            position.0 = home;
            rotation.0 = Quat::IDENTITY;
            mailbox.queue_send(FlagPacket::dropped(home.to_array()));
        } else {
            warn!(?entity, "no spawn point for respawning flag");
        }
        events.publish(GameEvent::FlagRespawn {
            flag: entity,
            team,
        });
    }
}

fn spawn_point_for(
    spawns: &Query<(&Position, &FlagSpawn, Option<&Team>), Without<Flag>>,
    team: Option<TeamIndex>,
) -> Option<Vec3> {
    let mut fallback = None;
    for (position, _, spawn_team) in spawns.iter() {
        match (spawn_team.map(|t| t.0), team) {
            (Some(s), Some(t)) if s == t => return Some(position.0),
            (None, _) => fallback = Some(position.0),
            _ => {}
        }
    }
    fallback
}

/// Build the server pickup job scheduled from a flag/player trigger overlap.
pub fn pickup_job(flag: Entity, player: Entity) -> Job {
    Job::build()
        .write::<Flag>()
        .write::<Attachment>()
        .write::<Offset>()
        .read::<Team>()
        .read::<CharacterHeight>()
        .write::<PacketMailbox<FlagPacket>>()
        .run(move |w| server_try_pickup(w, flag, player))
}

fn server_try_pickup(w: &mut JobWorld<'_, '_>, flag: Entity, player: Entity) {
    let now = w.resource::<Clock>().now();
    let Some(flag_state) = w.get::<Flag>(flag).copied() else {
        warn!(?flag, "pickup scheduled for an entity without flag state");
        return;
    };
    let flag_team = w.get::<Team>(flag).map(|t| t.0);
    let Some(player_team) = w.get::<Team>(player).map(|t| t.0) else {
        warn!(?player, "picking player has no team");
        return;
    };
    // Invalid attempts are silently rejected; no state changes.
    if !pickup_allowed(now, &flag_state, flag_team, player_team) {
        return;
    }
    if let Some(attachment) = w.get::<Attachment>(flag) {
        if attachment.attached {
            return;
        }
    }

    let height = w
        .get::<CharacterHeight>(player)
        .copied()
        .unwrap_or_default()
        .0;
    if let Some(mut f) = w.get_mut::<Flag>(flag) {
        f.has_been_picked_up = true;
    }
    if let Some(mut attachment) = w.get_mut::<Attachment>(flag) {
        attachment.holder = player;
        attachment.attached = true;
    }
    if let Some(mut offset) = w.get_mut::<Offset>(flag) {
        offset.0 = carry_offset(height);
    }

    // Carried flags ride along as solid non-query shapes so they stop
    // re-triggering their own pickup volume.
    w.resource_mut::<Adapters>()
        .physics
        .set_trigger_enabled(flag, false);

    let carrier_uid = w
        .resource::<NetworkUidRegistry>()
        .uid(player)
        .unwrap_or(NetworkUid::INVALID);
    if let Some(mut mailbox) = w.get_mut::<PacketMailbox<FlagPacket>>(flag) {
        mailbox.queue_send(FlagPacket::picked_up(carrier_uid));
    }
    w.resource_mut::<EventBus>()
        .publish(GameEvent::FlagPickedUp { flag, player });
}

/// Build the server drop job (administrative drop or delivery fallout).
pub fn drop_job(flag: Entity, at: Option<Vec3>) -> Job {
    Job::build()
        .write::<Flag>()
        .write::<Attachment>()
        .write::<Offset>()
        .write::<Position>()
        .write::<Rotation>()
        .read::<Team>()
        .read::<DeliveryPoint>()
        .read::<CharacterHeight>()
        .write::<PacketMailbox<FlagPacket>>()
        .run(move |w| server_drop_flag(w, flag, at))
}

fn server_drop_flag(w: &mut JobWorld<'_, '_>, flag: Entity, at: Option<Vec3>) {
    let Some(attachment) = w.get::<Attachment>(flag).copied() else {
        return;
    };
    if !attachment.attached {
        return;
    }
    let carrier = attachment.holder;
    let drop_position =
        at.unwrap_or_else(|| w.get::<Position>(flag).copied().unwrap_or_default().0);
    let now = w.resource::<Clock>().now();

    if let Some(mut f) = w.get_mut::<Flag>(flag) {
        f.dropped_at = now;
    }
    if let Some(mut a) = w.get_mut::<Attachment>(flag) {
        a.attached = false;
    }
    if let Some(mut offset) = w.get_mut::<Offset>(flag) {
        offset.0 = Vec3::ZERO;
    }
    if let Some(mut position) = w.get_mut::<Position>(flag) {
        position.0 = drop_position;
    }
    if let Some(mut rotation) = w.get_mut::<Rotation>(flag) {
        rotation.0 = Quat::IDENTITY;
    }

    {
        let mut adapters = w.resource_mut::<Adapters>();
        adapters.physics.set_trigger_enabled(flag, true);
        adapters
            .physics
            .set_kinematic_target(flag, drop_position, Quat::IDENTITY);
    }

    if let Some(mut mailbox) = w.get_mut::<PacketMailbox<FlagPacket>>(flag) {
        mailbox.queue_send(FlagPacket::dropped(drop_position.to_array()));
    }
    w.resource_mut::<EventBus>().publish(GameEvent::FlagDropped {
        flag,
        player: carrier,
    });
}

/// Build the server delivery job scheduled from a flag/base trigger overlap.
/// `rehome` is the neutral spawn position the flag returns to on success;
/// without one the flag is left at the base.
pub fn delivery_job(flag: Entity, delivery_point: Entity, rehome: Option<Vec3>) -> Job {
    Job::build()
        .write::<Flag>()
        .write::<Attachment>()
        .write::<Offset>()
        .write::<Position>()
        .write::<Rotation>()
        .read::<Team>()
        .read::<DeliveryPoint>()
        .read::<CharacterHeight>()
        .write::<PacketMailbox<FlagPacket>>()
        .run(move |w| server_try_deliver(w, flag, delivery_point, rehome))
}

fn server_try_deliver(
    w: &mut JobWorld<'_, '_>,
    flag: Entity,
    delivery_point: Entity,
    rehome: Option<Vec3>,
) {
    let Some(attachment) = w.get::<Attachment>(flag).copied() else {
        return;
    };
    if !attachment.attached {
        return;
    }
    let carrier = attachment.holder;
    let flag_team = w.get::<Team>(flag).map(|t| t.0);
    let Some(carrier_team) = w.get::<Team>(carrier).map(|t| t.0) else {
        warn!(?carrier, "flag carrier has no team");
        return;
    };
    let Some(point) = w.get::<DeliveryPoint>(delivery_point).copied() else {
        warn!(?delivery_point, "delivery scheduled for a non-base entity");
        return;
    };
    if !delivery_allowed(flag_team, carrier_team, point.team) {
        return;
    }

    // Cleared so the team-flag respawn sweep does not also re-home it; the
    // explicit drop below is the authoritative reset.
    if let Some(mut f) = w.get_mut::<Flag>(flag) {
        f.has_been_picked_up = false;
    }
    w.resource_mut::<EventBus>()
        .publish(GameEvent::FlagDelivered {
            flag,
            player: carrier,
            flag_team,
            scoring_team: carrier_team,
        });
    match_flow::on_flag_delivered(w, carrier_team);

    let drop_at = rehome.unwrap_or_else(|| {
        w.get::<Position>(delivery_point)
            .copied()
            .unwrap_or_default()
            .0
    });
    server_drop_flag(w, flag, Some(drop_at));
}

/// Client-side application of authoritative flag packets. Purely cosmetic
/// consumption of the server's decision; no business rules re-validated.
#[allow(clippy::type_complexity)]
pub fn client_apply_flag_packets(
    clock: Res<Clock>,
    registry: Res<NetworkUidRegistry>,
    mut events: ResMut<EventBus>,
    mut adapters: ResMut<Adapters>,
    mut flags: Query<(
        Entity,
        &mut Flag,
        &mut Attachment,
        &mut Offset,
        &mut Position,
        &mut Rotation,
        &mut PacketMailbox<FlagPacket>,
    )>,
    players: Query<&CharacterHeight, (With<Player>, Without<Flag>)>,
) {
    for (entity, mut flag, mut attachment, mut offset, mut position, mut rotation, mut mailbox) in
        &mut flags
    {
        for packet in mailbox.drain_received() {
            match packet.kind {
                FlagPacketKind::PickedUp => {
                    let Some(player) = registry.entity(packet.picked_up_by) else {
                        warn!(uid = ?packet.picked_up_by, "pickup for unknown player uid");
                        continue;
                    };
                    let height = players.get(player).copied().unwrap_or_default().0;
                    attachment.holder = player;
                    attachment.attached = true;
                    offset.0 = carry_offset(height);
                    flag.has_been_picked_up = true;
                    adapters.audio.play_cue(SoundCue::FlagPickedUp);
                    events.publish(GameEvent::FlagPickedUp {
                        flag: entity,
                        player,
                    });
                }
                FlagPacketKind::Dropped => {
                    let carrier = attachment.holder;
                    attachment.attached = false;
                    offset.0 = Vec3::ZERO;
                    position.0 = Vec3::from_array(packet.dropped_position);
                    rotation.0 = Quat::IDENTITY;
                    flag.dropped_at = clock.now();
                    adapters.audio.play_cue(SoundCue::FlagDropped);
                    events.publish(GameEvent::FlagDropped {
                        flag: entity,
                        player: carrier,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_flag() -> Flag {
        Flag {
            dropped_at: 0.0,
            pickup_cooldown: 2.0,
            respawn_cooldown: 10.0,
            has_been_picked_up: false,
        }
    }

    #[test]
    fn pickup_matrix_team_and_cooldown() {
        let flag = base_flag();
        let blue = TeamIndex(0);
        let red = TeamIndex(1);
        let elapsed = 3.0;
        let not_elapsed = 1.0;

        // Only (neutral-or-other-team) x (cooldown elapsed) succeeds.
        assert!(pickup_allowed(elapsed, &flag, None, blue));
        assert!(pickup_allowed(elapsed, &flag, Some(red), blue));
        assert!(!pickup_allowed(elapsed, &flag, Some(blue), blue));
        assert!(!pickup_allowed(not_elapsed, &flag, None, blue));
        assert!(!pickup_allowed(not_elapsed, &flag, Some(red), blue));
        assert!(!pickup_allowed(not_elapsed, &flag, Some(blue), blue));
    }

    #[test]
    fn delivery_matrix() {
        let blue = TeamIndex(0);
        let red = TeamIndex(1);

        // Carrier must be at their own base and the flag must not be theirs.
        assert!(delivery_allowed(None, blue, blue));
        assert!(delivery_allowed(Some(red), blue, blue));
        assert!(!delivery_allowed(Some(blue), blue, blue));
        assert!(!delivery_allowed(Some(red), blue, red));
        assert!(!delivery_allowed(None, blue, red));
    }

    #[test]
    fn carried_transform_is_a_rigid_offset() {
        let carrier_pos = Vec3::new(1.0, 2.0, 3.0);
        let carrier_rot = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let offset = Vec3::new(0.0, 1.2, -0.25);

        let (pos, rot) = carried_transform(carrier_pos, carrier_rot, offset);
        assert_eq!(rot, carrier_rot);
        let expected = carrier_pos + carrier_rot * offset;
        assert!((pos - expected).length() < 1e-6);

        // Detach/re-attach with the same offset reproduces the position.
        let (pos2, _) = carried_transform(carrier_pos, carrier_rot, offset);
        assert!((pos - pos2).length() < 1e-6);
    }
}
