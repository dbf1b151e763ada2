#![warn(missing_docs)]
//! Authoritative match host.
//!
//! Owns the ECS world, the fixed-tick schedule, and every gameplay decision:
//! pickups, deliveries, scoring, weapon replay. Physics and transport are
//! external collaborators; physics reports trigger overlaps and projectile
//! contacts through the `handle_*` entry points (which schedule permission-
//! declared jobs), transport shuttles the packets returned by
//! [`ServerGame::take_outbound`].

use anyhow::{Context, Result};
use bevy_ecs::entity::Entity;
use bevy_ecs::prelude::With;
use bevy_ecs::schedule::{IntoSystemConfigs, Schedules};
use bevy_ecs::world::World;
use crazycanvas_core::tunables::MATCH_BEGIN_COUNTDOWN_TIME;
use crazycanvas_core::{CollisionGroups, GameMode, TeamIndex, FIXED_TICK_SECONDS};
use crazycanvas_ecs::{build_schedules, run_fixed_tick, FixedSimSchedule, JobQueue};
use crazycanvas_game::components::{
    Attachment, CharacterHeight, DeliveryPoint, Flag, FlagSpawn, Offset, Player, Position,
    Rotation, Scale, Team, Velocity, Weapon, WeaponRef,
};
use crazycanvas_game::{
    flag, weapon, Adapters, Broadcasts, Clock, EventBus, GameEvent, MatchInfo, Palette,
};
use crazycanvas_net::{
    ClientPacket, CreateLevelObject, FlagPacket, LevelObjectPayload, NetworkUid,
    NetworkUidRegistry, PacketMailbox, PlayerAction, PlayerActionResponse, ServerPacket,
};
use glam::{Quat, Vec3};
use tracing::{info, instrument, warn};

/// The authoritative game server for one match.
pub struct ServerGame {
    world: World,
    schedules: Schedules,
    countdown_remaining: Option<f32>,
}

impl ServerGame {
    /// A headless server (no-op physics and audio).
    pub fn new(mode: GameMode, max_score: u32) -> Self {
        Self::with_adapters(mode, max_score, Adapters::null())
    }

    /// A server wired to the given collaborators.
    pub fn with_adapters(mode: GameMode, max_score: u32, adapters: Adapters) -> Self {
        let mut world = World::default();
        world.insert_resource(Clock::default());
        world.insert_resource(JobQueue::default());
        world.insert_resource(EventBus::new());
        world.insert_resource(NetworkUidRegistry::default());
        world.insert_resource(MatchInfo::new(mode, max_score));
        world.insert_resource(Palette::default());
        world.insert_resource(Broadcasts::default());
        world.insert_resource(adapters);

        let mut schedules = build_schedules();
        if let Some(fixed) = schedules.get_mut(FixedSimSchedule) {
            fixed.add_systems(
                (
                    weapon::server_replay_player_actions,
                    weapon::update_weapons,
                    flag::flag_respawn_sweep,
                    flag::slave_carried_flags,
                    flag::push_flag_kinematic_targets,
                )
                    .chain(),
            );
        }

        world
            .resource_mut::<EventBus>()
            .publish(GameEvent::MatchInitialized { mode });
        info!(?mode, max_score, "server match created");
        Self {
            world,
            schedules,
            countdown_remaining: None,
        }
    }

    /// Spawn a player avatar plus its weapon and broadcast the create.
    pub fn spawn_player(&mut self, team: TeamIndex, position: Vec3, forward: Vec3) -> Result<Entity> {
        let rotation = facing(forward);
        let player = self
            .world
            .spawn((
                Player,
                Team(team),
                Position(position),
                Rotation(rotation),
                Scale::default(),
                Velocity::default(),
                CharacterHeight::default(),
                PacketMailbox::<PlayerAction>::new(),
                PacketMailbox::<PlayerActionResponse>::new(),
            ))
            .id();
        let weapon = self.world.spawn(Weapon::new(player)).id();
        self.world.entity_mut(player).insert(WeaponRef(weapon));

        let mut registry = self.world.resource_mut::<NetworkUidRegistry>();
        let player_uid = registry
            .register_server_side(player)
            .context("Failed to register player uid")?;
        let weapon_uid = registry
            .register_server_side(weapon)
            .context("Failed to register weapon uid")?;
        self.world
            .resource_mut::<Broadcasts>()
            .push(ServerPacket::Create(CreateLevelObject {
                network_uid: player_uid,
                position: position.to_array(),
                forward: forward.to_array(),
                payload: LevelObjectPayload::Player {
                    client_uid: player_uid,
                    weapon_uid,
                    team,
                },
            }));
        info!(uid = player_uid.0, team = team.0, "player spawned");
        Ok(player)
    }

    /// Spawn a flag, team-owned or neutral, and broadcast the create.
    pub fn spawn_flag(&mut self, position: Vec3, team: Option<TeamIndex>) -> Result<Entity> {
        if self.world.resource::<MatchInfo>().mode == GameMode::CtfCommonFlag {
            let existing = self
                .world
                .query_filtered::<Entity, With<Flag>>()
                .iter(&self.world)
                .count();
            if existing > 0 {
                warn!(existing, "common-flag mode expects a single flag");
            }
        }
        let flag = self
            .world
            .spawn((
                Flag::new(),
                Offset::default(),
                Position(position),
                Rotation::default(),
                PacketMailbox::<FlagPacket>::new(),
            ))
            .id();
        self.world.entity_mut(flag).insert(Attachment::detached(flag));
        if let Some(team) = team {
            self.world.entity_mut(flag).insert(Team(team));
        }

        self.world
            .resource_mut::<Adapters>()
            .physics
            .create_trigger(
                flag,
                CollisionGroups::FLAG,
                CollisionGroups::flag_trigger_mask(),
            );
        let uid = self
            .world
            .resource_mut::<NetworkUidRegistry>()
            .register_server_side(flag)
            .context("Failed to register flag uid")?;
        self.world
            .resource_mut::<Broadcasts>()
            .push(ServerPacket::Create(CreateLevelObject {
                network_uid: uid,
                position: position.to_array(),
                forward: Vec3::NEG_Z.to_array(),
                payload: LevelObjectPayload::Flag {
                    parent_uid: NetworkUid::INVALID,
                    team,
                },
            }));
        info!(uid = uid.0, ?team, "flag spawned");
        Ok(flag)
    }

    /// Spawn a delivery base trigger and broadcast the create.
    pub fn spawn_delivery_point(&mut self, position: Vec3, team: TeamIndex) -> Result<Entity> {
        let point = self
            .world
            .spawn((DeliveryPoint { team }, Position(position), Rotation::default()))
            .id();
        self.world
            .resource_mut::<Adapters>()
            .physics
            .create_trigger(
                point,
                CollisionGroups::BASE,
                CollisionGroups::base_trigger_mask(),
            );
        let uid = self
            .world
            .resource_mut::<NetworkUidRegistry>()
            .register_server_side(point)
            .context("Failed to register delivery point uid")?;
        self.world
            .resource_mut::<Broadcasts>()
            .push(ServerPacket::Create(CreateLevelObject {
                network_uid: uid,
                position: position.to_array(),
                forward: Vec3::NEG_Z.to_array(),
                payload: LevelObjectPayload::DeliveryPoint { team },
            }));
        Ok(point)
    }

    /// Spawn a flag spawn marker and broadcast the create.
    pub fn spawn_flag_spawn(
        &mut self,
        position: Vec3,
        radius: f32,
        team: Option<TeamIndex>,
    ) -> Result<Entity> {
        let spawn = self
            .world
            .spawn((FlagSpawn { radius }, Position(position), Rotation::default()))
            .id();
        if let Some(team) = team {
            self.world.entity_mut(spawn).insert(Team(team));
        }
        let uid = self
            .world
            .resource_mut::<NetworkUidRegistry>()
            .register_server_side(spawn)
            .context("Failed to register flag spawn uid")?;
        self.world
            .resource_mut::<Broadcasts>()
            .push(ServerPacket::Create(CreateLevelObject {
                network_uid: uid,
                position: position.to_array(),
                forward: Vec3::NEG_Z.to_array(),
                payload: LevelObjectPayload::FlagSpawn { radius },
            }));
        Ok(spawn)
    }

    /// Remove a replicated object and broadcast the delete.
    pub fn despawn_object(&mut self, entity: Entity) {
        if let Some(uid) = self
            .world
            .resource_mut::<NetworkUidRegistry>()
            .unregister(entity)
        {
            self.world
                .resource_mut::<Broadcasts>()
                .push(ServerPacket::Delete { network_uid: uid });
        }
        self.world.despawn(entity);
    }

    /// Physics callback: something entered a flag's pickup trigger.
    pub fn handle_flag_trigger_overlap(&mut self, flag: Entity, other: Entity) {
        if !self.has_begun() || self.world.get::<Player>(other).is_none() {
            return;
        }
        self.world
            .resource_mut::<JobQueue>()
            .schedule_asap(flag::pickup_job(flag, other));
    }

    /// Physics callback: something entered a delivery base trigger.
    pub fn handle_delivery_trigger_overlap(&mut self, point: Entity, other: Entity) {
        if !self.has_begun() || self.world.get::<Flag>(other).is_none() {
            return;
        }
        // A delivered flag re-homes to its spawn, not the base it was
        // delivered at.
        let rehome = self.flag_home(other);
        self.world
            .resource_mut::<JobQueue>()
            .schedule_asap(flag::delivery_job(other, point, rehome));
    }

    /// Physics callback: a projectile contacted something (`None` for level
    /// geometry).
    pub fn handle_projectile_hit(&mut self, projectile: Entity, other: Option<Entity>) {
        self.world
            .resource_mut::<JobQueue>()
            .schedule_asap(weapon::projectile_hit_job(projectile, other));
    }

    /// Admin command: force-drop a carried flag in place.
    pub fn admin_drop_flag(&mut self, flag: Entity) {
        info!(?flag, "admin flag drop");
        self.world
            .resource_mut::<JobQueue>()
            .schedule_asap(flag::drop_job(flag, None));
    }

    /// Admin command: reassign a team to a different palette color slot.
    pub fn admin_set_team_color(&mut self, team: TeamIndex, color_slot: usize) {
        info!(team = team.0, color_slot, "admin team recolor");
        self.world
            .resource_mut::<Palette>()
            .0
            .set_team_color(team, color_slot);
    }

    /// Render color of a team, from the palette resource.
    pub fn team_color(&self, team: TeamIndex) -> Vec3 {
        self.world.resource::<Palette>().0.team_color(team)
    }

    /// Begin the pre-match countdown and tell every client to do the same.
    pub fn start_match(&mut self) {
        self.countdown_remaining = Some(MATCH_BEGIN_COUNTDOWN_TIME);
        self.world
            .resource_mut::<Broadcasts>()
            .push(ServerPacket::MatchStart);
        info!("match starting");
    }

    /// Advance one fixed simulation tick.
    #[instrument(skip(self))]
    pub fn tick(&mut self) {
        self.world
            .resource_mut::<Clock>()
            .0
            .step(FIXED_TICK_SECONDS);

        if let Some(remaining) = &mut self.countdown_remaining {
            *remaining -= FIXED_TICK_SECONDS;
            if *remaining <= 0.0 {
                self.countdown_remaining = None;
                self.world.resource_mut::<MatchInfo>().has_begun = true;
                self.world
                    .resource_mut::<Broadcasts>()
                    .push(ServerPacket::MatchBegin);
                info!("match begun");
            }
        }

        let tick = self.world.resource::<Clock>().0.tick;
        run_fixed_tick(&mut self.world, &mut self.schedules, tick);
    }

    /// Deposit a packet received from a client.
    pub fn apply_client_packet(&mut self, player: Entity, packet: ClientPacket) {
        match packet {
            ClientPacket::Action(action) => {
                if !self.has_begun() {
                    warn!(?player, "player action before match begin ignored");
                    return;
                }
                if action.is_empty() {
                    return;
                }
                match self.world.get_mut::<PacketMailbox<PlayerAction>>(player) {
                    Some(mut mailbox) => mailbox.push_received(action),
                    None => warn!(?player, "player action for an entity without a mailbox"),
                }
            }
        }
    }

    /// Flush everything queued for clients: broadcasts plus per-entity
    /// mailbox traffic, addressed by network uid.
    pub fn take_outbound(&mut self) -> Vec<ServerPacket> {
        let mut out = self.world.resource_mut::<Broadcasts>().take();

        let mut flag_traffic = Vec::new();
        {
            let mut query = self.world.query::<(Entity, &mut PacketMailbox<FlagPacket>)>();
            for (entity, mut mailbox) in query.iter_mut(&mut self.world) {
                let packets = mailbox.take_outgoing();
                if !packets.is_empty() {
                    flag_traffic.push((entity, packets));
                }
            }
        }
        let mut response_traffic = Vec::new();
        {
            let mut query = self
                .world
                .query::<(Entity, &mut PacketMailbox<PlayerActionResponse>)>();
            for (entity, mut mailbox) in query.iter_mut(&mut self.world) {
                let packets = mailbox.take_outgoing();
                if !packets.is_empty() {
                    response_traffic.push((entity, packets));
                }
            }
        }

        let registry = self.world.resource::<NetworkUidRegistry>();
        for (entity, packets) in flag_traffic {
            let Some(uid) = registry.uid(entity) else {
                warn!(?entity, "outbound flag packets for an unregistered entity");
                continue;
            };
            out.extend(
                packets
                    .into_iter()
                    .map(|packet| ServerPacket::Flag { flag: uid, packet }),
            );
        }
        for (entity, packets) in response_traffic {
            let Some(uid) = registry.uid(entity) else {
                warn!(?entity, "outbound responses for an unregistered entity");
                continue;
            };
            out.extend(packets.into_iter().map(|response| ServerPacket::ActionResponse {
                player: uid,
                response,
            }));
        }
        out
    }

    /// Reset for a rematch: zero the scores, clear the game-over latch, and
    /// re-home every flag. Players stay where they are; the host decides
    /// when to call [`ServerGame::start_match`] again.
    pub fn reset_match(&mut self) {
        info!("match reset");
        self.countdown_remaining = None;
        self.world.resource_mut::<MatchInfo>().reset_scores();

        let spawns: Vec<(Vec3, Option<TeamIndex>)> = {
            let mut query = self
                .world
                .query_filtered::<(&Position, Option<&Team>), With<FlagSpawn>>();
            query
                .iter(&self.world)
                .map(|(p, t)| (p.0, t.map(|t| t.0)))
                .collect()
        };
        let flags: Vec<(Entity, Option<TeamIndex>, Vec3)> = {
            let mut query = self
                .world
                .query_filtered::<(Entity, Option<&Team>, &Position), With<Flag>>();
            query
                .iter(&self.world)
                .map(|(e, t, p)| (e, t.map(|t| t.0), p.0))
                .collect()
        };
        for (flag, team, current) in flags {
            let home = home_for(&spawns, team).unwrap_or(current);
            if let Some(mut state) = self.world.get_mut::<Flag>(flag) {
                *state = Flag::new();
            }
            if let Some(mut attachment) = self.world.get_mut::<Attachment>(flag) {
                attachment.attached = false;
            }
            if let Some(mut offset) = self.world.get_mut::<Offset>(flag) {
                offset.0 = Vec3::ZERO;
            }
            if let Some(mut position) = self.world.get_mut::<Position>(flag) {
                position.0 = home;
            }
            if let Some(mut rotation) = self.world.get_mut::<Rotation>(flag) {
                rotation.0 = Quat::IDENTITY;
            }
            if let Some(mut mailbox) = self.world.get_mut::<PacketMailbox<FlagPacket>>(flag) {
                mailbox.queue_send(FlagPacket::dropped(home.to_array()));
            }
            self.world
                .resource_mut::<Adapters>()
                .physics
                .set_trigger_enabled(flag, true);
        }
    }

    /// Score of one team.
    pub fn score(&self, team: TeamIndex) -> u32 {
        self.world.resource::<MatchInfo>().score(team)
    }

    /// Active game mode.
    pub fn game_mode(&self) -> GameMode {
        self.world.resource::<MatchInfo>().mode
    }

    /// Whether gameplay is live.
    pub fn has_begun(&self) -> bool {
        self.world.resource::<MatchInfo>().has_begun
    }

    /// Winning team once the match has ended.
    pub fn game_over(&self) -> Option<TeamIndex> {
        self.world.resource::<MatchInfo>().game_over
    }

    /// Drain the gameplay event log.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.world.resource_mut::<EventBus>().drain_log()
    }

    /// Network uid of a server entity.
    pub fn uid_of(&self, entity: Entity) -> Option<NetworkUid> {
        self.world.resource::<NetworkUidRegistry>().uid(entity)
    }

    /// Server entity for a network uid.
    pub fn entity_of(&self, uid: NetworkUid) -> Option<Entity> {
        self.world.resource::<NetworkUidRegistry>().entity(uid)
    }

    /// The underlying world (host glue, tests).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the underlying world.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    fn flag_home(&mut self, flag: Entity) -> Option<Vec3> {
        let team = self.world.get::<Team>(flag).map(|t| t.0);
        let spawns: Vec<(Vec3, Option<TeamIndex>)> = {
            let mut query = self
                .world
                .query_filtered::<(&Position, Option<&Team>), With<FlagSpawn>>();
            query
                .iter(&self.world)
                .map(|(p, t)| (p.0, t.map(|t| t.0)))
                .collect()
        };
        home_for(&spawns, team)
    }
}

fn facing(forward: Vec3) -> Quat {
    let dir = forward.normalize_or_zero();
    if dir == Vec3::ZERO {
        Quat::IDENTITY
    } else {
        Quat::from_rotation_arc(Vec3::NEG_Z, dir)
    }
}

fn home_for(spawns: &[(Vec3, Option<TeamIndex>)], team: Option<TeamIndex>) -> Option<Vec3> {
    let exact = spawns
        .iter()
        .find(|(_, spawn_team)| *spawn_team == team && team.is_some())
        .map(|(p, _)| *p);
    let neutral = spawns
        .iter()
        .find(|(_, spawn_team)| spawn_team.is_none())
        .map(|(p, _)| *p);
    exact.or(neutral)
}
