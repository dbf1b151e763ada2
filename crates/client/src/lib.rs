#![warn(missing_docs)]
//! Replicating game client.
//!
//! Mirrors the authoritative world from server packets, predicts the local
//! player's weapon so firing feels instant, and replays foreign players'
//! actions from server responses. Nothing here decides gameplay rules; an
//! invalid local prediction is simply never confirmed by the server.

use anyhow::Result;
use bevy_ecs::entity::Entity;
use bevy_ecs::prelude::{Commands, Query, ResMut, With, Without};
use bevy_ecs::schedule::{IntoSystemConfigs, Schedules};
use bevy_ecs::world::{Mut, World};
use crazycanvas_core::{AmmoType, GameMode, TeamIndex, FIXED_TICK_SECONDS};
use crazycanvas_ecs::{build_schedules, run_fixed_tick, run_frame, FixedSimSchedule, FrameSchedule, JobQueue};
use crazycanvas_game::components::{
    Attachment, CharacterHeight, DeliveryPoint, Flag, FlagSpawn, ForeignPlayer, LocalPlayer,
    Offset, Player, Position, Projectile, Rotation, Scale, Team, Velocity, Weapon, WeaponRef,
};
use crazycanvas_game::weapon::FireOutcome;
use crazycanvas_game::{
    flag, weapon, Adapters, ClientCountdown, Clock, EventBus, GameEvent, MatchInfo, Palette,
    SoundCue, SpectatorController,
};
use crazycanvas_net::{
    ClientPacket, FlagPacket, LevelObjectPayload, NetworkUid, NetworkUidRegistry, PacketMailbox,
    PlayerAction, PlayerActionResponse, ServerPacket,
};
use glam::{Quat, Vec3};
use tracing::{debug, info, warn};

/// One client's view of a match.
pub struct ClientGame {
    world: World,
    schedules: Schedules,
    local_uid: NetworkUid,
    local_player: Option<Entity>,
    single_player: bool,
}

impl ClientGame {
    /// A multiplayer client that was assigned `local_uid` at connect.
    pub fn new(local_uid: NetworkUid) -> Self {
        Self::build(local_uid, false, MatchInfo::default(), Adapters::null())
    }

    /// A multiplayer client with real collaborators installed.
    pub fn with_adapters(local_uid: NetworkUid, adapters: Adapters) -> Self {
        Self::build(local_uid, false, MatchInfo::default(), adapters)
    }

    /// A single-player session: the local countdown is authoritative and
    /// opens gameplay by itself.
    pub fn single_player(mode: GameMode, max_score: u32) -> Self {
        Self::build(
            NetworkUid::INVALID,
            true,
            MatchInfo::new(mode, max_score),
            Adapters::null(),
        )
    }

    fn build(local_uid: NetworkUid, single_player: bool, info: MatchInfo, adapters: Adapters) -> Self {
        let mut world = World::default();
        world.insert_resource(Clock::default());
        world.insert_resource(JobQueue::default());
        world.insert_resource(EventBus::new());
        world.insert_resource(NetworkUidRegistry::default());
        world.insert_resource(info);
        world.insert_resource(ClientCountdown::default());
        world.insert_resource(SpectatorController::default());
        world.insert_resource(Palette::default());
        world.insert_resource(adapters);

        let mut schedules = build_schedules();
        if let Some(fixed) = schedules.get_mut(FixedSimSchedule) {
            fixed.add_systems(
                (
                    flag::client_apply_flag_packets,
                    apply_foreign_action_responses,
                    weapon::update_weapons,
                    flag::slave_carried_flags,
                )
                    .chain(),
            );
        }
        if let Some(frame) = schedules.get_mut(FrameSchedule) {
            frame.add_systems(flag::slave_carried_flags);
        }

        info!(uid = local_uid.0, single_player, "client created");
        Self {
            world,
            schedules,
            local_uid,
            local_player: None,
            single_player,
        }
    }

    /// Apply one packet from the server. Verification happens first; a
    /// packet failing its limits is rejected wholesale.
    pub fn apply_packet(&mut self, packet: ServerPacket) -> Result<()> {
        packet.verify().map_err(anyhow::Error::msg)?;
        match packet {
            ServerPacket::Create(create) => self.apply_create(create)?,
            ServerPacket::Delete { network_uid } => {
                let Some(entity) = self.world.resource::<NetworkUidRegistry>().entity(network_uid)
                else {
                    warn!(uid = network_uid.0, "delete for an unknown object");
                    return Ok(());
                };
                self.world
                    .resource_mut::<NetworkUidRegistry>()
                    .unregister(entity);
                if self.local_player == Some(entity) {
                    self.local_player = None;
                }
                self.world.despawn(entity);
            }
            ServerPacket::Flag { flag, packet } => {
                let Some(entity) = self.world.resource::<NetworkUidRegistry>().entity(flag) else {
                    warn!(uid = flag.0, "flag packet for an unknown flag");
                    return Ok(());
                };
                match self.world.get_mut::<PacketMailbox<FlagPacket>>(entity) {
                    Some(mut mailbox) => mailbox.push_received(packet),
                    None => warn!(uid = flag.0, "flag packet for a non-flag entity"),
                }
            }
            ServerPacket::TeamScored(scored) => {
                let mut info = self.world.resource_mut::<MatchInfo>();
                if let Some(slot) = info.scores.get_mut(scored.team.0 as usize) {
                    *slot = scored.new_score;
                }
            }
            ServerPacket::MatchStart => self.start_match_countdown(),
            ServerPacket::MatchBegin => {
                self.world.resource_mut::<MatchInfo>().has_begun = true;
                info!("match begun");
            }
            ServerPacket::GameOver { winning_team } => {
                self.world.resource_mut::<MatchInfo>().game_over = Some(winning_team);
                self.world
                    .resource_mut::<Adapters>()
                    .audio
                    .play_cue(SoundCue::GameOver);
                self.world
                    .resource_mut::<EventBus>()
                    .publish(GameEvent::GameOver { winning_team });
            }
            ServerPacket::ActionResponse { player, response } => {
                let Some(entity) = self.world.resource::<NetworkUidRegistry>().entity(player)
                else {
                    warn!(uid = player.0, "action response for an unknown player");
                    return Ok(());
                };
                if self.local_player == Some(entity) {
                    // Already predicted locally.
                    debug!("own action response dropped");
                    return Ok(());
                }
                match self
                    .world
                    .get_mut::<PacketMailbox<PlayerActionResponse>>(entity)
                {
                    Some(mut mailbox) => mailbox.push_received(response),
                    None => warn!(uid = player.0, "action response for a non-player entity"),
                }
            }
        }
        Ok(())
    }

    fn apply_create(&mut self, create: crazycanvas_net::CreateLevelObject) -> Result<()> {
        let position = Vec3::from_array(create.position);
        let rotation = facing(Vec3::from_array(create.forward));
        match create.payload {
            LevelObjectPayload::Player {
                client_uid,
                weapon_uid,
                team,
            } => {
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
                    ))
                    .id();
                let weapon = self.world.spawn(Weapon::new(player)).id();
                self.world.entity_mut(player).insert(WeaponRef(weapon));
                if client_uid == self.local_uid {
                    self.world
                        .entity_mut(player)
                        .insert((LocalPlayer, PacketMailbox::<PlayerAction>::new()));
                    self.local_player = Some(player);
                    info!(uid = client_uid.0, "local player created");
                } else {
                    self.world
                        .entity_mut(player)
                        .insert((ForeignPlayer, PacketMailbox::<PlayerActionResponse>::new()));
                }
                let mut registry = self.world.resource_mut::<NetworkUidRegistry>();
                registry.register(player, create.network_uid)?;
                registry.register(weapon, weapon_uid)?;
            }
            LevelObjectPayload::Flag { parent_uid, team } => {
                let flag = self
                    .world
                    .spawn((
                        Flag::new(),
                        Offset::default(),
                        Position(position),
                        Rotation(rotation),
                        PacketMailbox::<FlagPacket>::new(),
                    ))
                    .id();
                self.world.entity_mut(flag).insert(Attachment::detached(flag));
                if let Some(team) = team {
                    self.world.entity_mut(flag).insert(Team(team));
                }
                self.world
                    .resource_mut::<NetworkUidRegistry>()
                    .register(flag, create.network_uid)?;
                // Late join: the flag may already be carried.
                if parent_uid.is_valid() {
                    if let Some(carrier) =
                        self.world.resource::<NetworkUidRegistry>().entity(parent_uid)
                    {
                        let height = self
                            .world
                            .get::<CharacterHeight>(carrier)
                            .copied()
                            .unwrap_or_default()
                            .0;
                        self.world.entity_mut(flag).insert((
                            Attachment {
                                holder: carrier,
                                attached: true,
                            },
                            Offset(flag::carry_offset(height)),
                        ));
                        if let Some(mut state) = self.world.get_mut::<Flag>(flag) {
                            state.has_been_picked_up = true;
                        }
                    } else {
                        warn!(uid = parent_uid.0, "flag parented to an unknown carrier");
                    }
                }
            }
            LevelObjectPayload::DeliveryPoint { team } => {
                let point = self
                    .world
                    .spawn((DeliveryPoint { team }, Position(position), Rotation(rotation)))
                    .id();
                self.world
                    .resource_mut::<NetworkUidRegistry>()
                    .register(point, create.network_uid)?;
            }
            LevelObjectPayload::FlagSpawn { radius } => {
                let spawn = self
                    .world
                    .spawn((FlagSpawn { radius }, Position(position), Rotation(rotation)))
                    .id();
                self.world
                    .resource_mut::<NetworkUidRegistry>()
                    .register(spawn, create.network_uid)?;
            }
        }
        Ok(())
    }

    /// Start the pre-match countdown (MatchStart packet, or the host in
    /// single-player).
    pub fn start_match_countdown(&mut self) {
        self.world
            .resource_scope(|world, mut countdown: Mut<ClientCountdown>| {
                let mut events = world.resource_mut::<EventBus>();
                countdown.start(&mut events);
            });
    }

    /// Advance one fixed simulation tick.
    pub fn tick(&mut self) {
        self.world
            .resource_mut::<Clock>()
            .0
            .step(FIXED_TICK_SECONDS);
        self.world
            .resource_scope(|world, mut countdown: Mut<ClientCountdown>| {
                let mut events = world.resource_mut::<EventBus>();
                countdown.tick(FIXED_TICK_SECONDS, &mut events);
            });
        if self.single_player && self.world.resource::<ClientCountdown>().begun() {
            self.world.resource_mut::<MatchInfo>().has_begun = true;
        }

        let tick = self.world.resource::<Clock>().0.tick;
        run_fixed_tick(&mut self.world, &mut self.schedules, tick);

        // All intent systems have accreted onto the pending action; close it.
        if let Some(player) = self.local_player {
            if let Some(mut mailbox) = self.world.get_mut::<PacketMailbox<PlayerAction>>(player) {
                mailbox.flush_pending();
            }
        }
    }

    /// Run the cosmetic per-frame schedule.
    pub fn frame(&mut self) {
        run_frame(&mut self.world, &mut self.schedules);
    }

    /// Predict a local fire. Returns whether a shot actually left.
    pub fn local_fire(&mut self, ammo: AmmoType) -> bool {
        if !self.gameplay_live() {
            return false;
        }
        let Some(player) = self.local_player else {
            return false;
        };
        let (Some(position), Some(rotation), Some(team), Some(weapon_ref)) = (
            self.world.get::<Position>(player).copied(),
            self.world.get::<Rotation>(player).copied(),
            self.world.get::<Team>(player).copied(),
            self.world.get::<WeaponRef>(player).copied(),
        ) else {
            return false;
        };
        let outcome = {
            let Some(mut weapon) = self.world.get_mut::<Weapon>(weapon_ref.0) else {
                return false;
            };
            weapon::try_fire(&mut weapon, ammo)
        };
        match outcome {
            FireOutcome::Fired => {
                let (muzzle, velocity, direction) = weapon::muzzle_kinematics(position.0, rotation.0);
                self.world.spawn((
                    Projectile {
                        ammo,
                        team: team.0,
                    },
                    Position(muzzle),
                    Velocity(velocity),
                ));
                self.world
                    .resource_mut::<Adapters>()
                    .audio
                    .play_cue(SoundCue::WeaponFire);
                if let Some(mut mailbox) = self.world.get_mut::<PacketMailbox<PlayerAction>>(player)
                {
                    mailbox.pending_mut().fired_ammo = Some(ammo);
                }
                self.world.resource_mut::<EventBus>().publish(GameEvent::WeaponFired {
                    owner: player,
                    ammo,
                    position: muzzle,
                    velocity,
                    direction,
                    team: team.0,
                });
                true
            }
            FireOutcome::OutOfAmmo => {
                self.world
                    .resource_mut::<Adapters>()
                    .audio
                    .play_cue(SoundCue::OutOfAmmo);
                false
            }
            FireOutcome::OnCooldown => false,
        }
    }

    /// Predict a local reload. Returns whether a reload started.
    pub fn local_reload(&mut self) -> bool {
        if !self.gameplay_live() {
            return false;
        }
        let Some(player) = self.local_player else {
            return false;
        };
        let Some(weapon_ref) = self.world.get::<WeaponRef>(player).copied() else {
            return false;
        };
        let started = {
            let Some(mut weapon) = self.world.get_mut::<Weapon>(weapon_ref.0) else {
                return false;
            };
            weapon::start_reload(&mut weapon)
        };
        if started {
            if let Some(mut mailbox) = self.world.get_mut::<PacketMailbox<PlayerAction>>(player) {
                mailbox.pending_mut().started_reload = true;
            }
        }
        started
    }

    /// Flush the local player's intent packets for the transport layer.
    pub fn take_outbound(&mut self) -> Vec<ClientPacket> {
        let Some(player) = self.local_player else {
            return Vec::new();
        };
        match self.world.get_mut::<PacketMailbox<PlayerAction>>(player) {
            Some(mut mailbox) => mailbox
                .take_outgoing()
                .into_iter()
                .map(ClientPacket::Action)
                .collect(),
            None => Vec::new(),
        }
    }

    /// The local player died or respawned; drives the spectator camera.
    pub fn notify_local_player_alive(&mut self, alive: bool) {
        if let Some(player) = self.local_player {
            self.world
                .resource_mut::<EventBus>()
                .publish(GameEvent::PlayerAliveChanged { player, alive });
        }
        self.world
            .resource_mut::<SpectatorController>()
            .on_local_player_alive_changed(alive);
    }

    /// Cycle the spectated teammate.
    pub fn cycle_spectator(&mut self, delta: i32) {
        self.world.resource_mut::<SpectatorController>().cycle(delta);
    }

    /// Currently spectated teammate, if dead and spectating.
    pub fn spectator_target(&mut self) -> Option<Entity> {
        let roster = self.teammates();
        self.world.resource::<SpectatorController>().target(&roster)
    }

    /// Teammates of the local player in uid order. Dead teammates are
    /// included; spectating a body is allowed.
    fn teammates(&mut self) -> Vec<Entity> {
        let Some(local) = self.local_player else {
            return Vec::new();
        };
        let Some(team) = self.world.get::<Team>(local).copied() else {
            return Vec::new();
        };
        let members: Vec<Entity> = {
            let mut query = self.world.query_filtered::<(Entity, &Team), With<Player>>();
            query
                .iter(&self.world)
                .filter(|(entity, t)| *entity != local && t.0 == team.0)
                .map(|(entity, _)| entity)
                .collect()
        };
        let registry = self.world.resource::<NetworkUidRegistry>();
        let mut roster: Vec<(i32, Entity)> = members
            .into_iter()
            .map(|e| (registry.uid(e).unwrap_or(NetworkUid::INVALID).0, e))
            .collect();
        roster.sort_by_key(|(uid, _)| *uid);
        roster.into_iter().map(|(_, e)| e).collect()
    }

    /// Whether gameplay is live.
    pub fn gameplay_live(&self) -> bool {
        self.world.resource::<MatchInfo>().has_begun
    }

    /// Render color of a team, from the palette resource.
    pub fn team_color(&self, team: TeamIndex) -> Vec3 {
        self.world.resource::<Palette>().0.team_color(team)
    }

    /// Mirrored score of one team.
    pub fn score(&self, team: TeamIndex) -> u32 {
        self.world.resource::<MatchInfo>().score(team)
    }

    /// Winning team, once the server has called the match.
    pub fn game_over(&self) -> Option<TeamIndex> {
        self.world.resource::<MatchInfo>().game_over
    }

    /// The local player entity, once created.
    pub fn local_player(&self) -> Option<Entity> {
        self.local_player
    }

    /// Client entity for a network uid.
    pub fn entity_of(&self, uid: NetworkUid) -> Option<Entity> {
        self.world.resource::<NetworkUidRegistry>().entity(uid)
    }

    /// Drain the gameplay event log.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.world.resource_mut::<EventBus>().drain_log()
    }

    /// The underlying world (host glue, tests).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the underlying world.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

/// Replay foreign players' authoritative fire responses: spawn the cosmetic
/// projectile and fire the event, no rule checks.
#[allow(clippy::type_complexity)]
fn apply_foreign_action_responses(
    mut commands: Commands,
    mut events: ResMut<EventBus>,
    mut adapters: ResMut<Adapters>,
    mut players: Query<
        (Entity, &Team, &mut PacketMailbox<PlayerActionResponse>),
        (With<Player>, Without<LocalPlayer>),
    >,
) {
    for (player, team, mut mailbox) in &mut players {
        for response in mailbox.drain_received() {
            let position = Vec3::from_array(response.weapon_position);
            let velocity = Vec3::from_array(response.weapon_velocity);
            let direction = velocity.normalize_or_zero();
            commands.spawn((
                Projectile {
                    ammo: response.fired_ammo,
                    team: team.0,
                },
                Position(position),
                Velocity(velocity),
            ));
            adapters.audio.play_cue(SoundCue::WeaponFire);
            events.publish(GameEvent::WeaponFired {
                owner: player,
                ammo: response.fired_ammo,
                position,
                velocity,
                direction,
                team: team.0,
            });
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crazycanvas_net::{CreateLevelObject, TeamScored};

    const BLUE: TeamIndex = TeamIndex(0);
    const RED: TeamIndex = TeamIndex(1);

    fn player_create(uid: i32, weapon_uid: i32, team: TeamIndex) -> ServerPacket {
        ServerPacket::Create(CreateLevelObject {
            network_uid: NetworkUid(uid),
            position: [0.0; 3],
            forward: [0.0, 0.0, -1.0],
            payload: LevelObjectPayload::Player {
                client_uid: NetworkUid(uid),
                weapon_uid: NetworkUid(weapon_uid),
                team,
            },
        })
    }

    fn flag_create(uid: i32, parent: NetworkUid, team: Option<TeamIndex>) -> ServerPacket {
        ServerPacket::Create(CreateLevelObject {
            network_uid: NetworkUid(uid),
            position: [5.0, 0.0, 0.0],
            forward: [0.0, 0.0, -1.0],
            payload: LevelObjectPayload::Flag {
                parent_uid: parent,
                team,
            },
        })
    }

    fn live_client() -> ClientGame {
        let mut client = ClientGame::new(NetworkUid(1));
        client.apply_packet(player_create(1, 2, BLUE)).unwrap();
        client.apply_packet(ServerPacket::MatchStart).unwrap();
        client.apply_packet(ServerPacket::MatchBegin).unwrap();
        client
    }

    #[test]
    fn create_distinguishes_local_and_foreign_players() {
        let mut client = ClientGame::new(NetworkUid(1));
        client.apply_packet(player_create(1, 2, BLUE)).unwrap();
        client.apply_packet(player_create(3, 4, RED)).unwrap();

        let local = client.local_player().unwrap();
        assert!(client.world().get::<LocalPlayer>(local).is_some());
        let foreign = client.entity_of(NetworkUid(3)).unwrap();
        assert!(client.world().get::<ForeignPlayer>(foreign).is_some());
        assert_eq!(client.world().get::<Team>(foreign).unwrap().0, RED);
        // The weapon uid resolves too.
        assert!(client.entity_of(NetworkUid(4)).is_some());
    }

    #[test]
    fn invalid_packet_is_rejected_before_any_mutation() {
        let mut client = ClientGame::new(NetworkUid(1));
        let bad = ServerPacket::TeamScored(TeamScored {
            team: TeamIndex(9),
            new_score: 1,
        });
        assert!(client.apply_packet(bad).is_err());
        assert_eq!(client.score(BLUE), 0);
    }

    #[test]
    fn flag_pickup_packet_attaches_without_revalidation() {
        let mut client = live_client();
        client.apply_packet(player_create(3, 4, RED)).unwrap();
        client
            .apply_packet(flag_create(5, NetworkUid::INVALID, None))
            .unwrap();
        let flag_entity = client.entity_of(NetworkUid(5)).unwrap();
        let carrier = client.entity_of(NetworkUid(3)).unwrap();

        client
            .apply_packet(ServerPacket::Flag {
                flag: NetworkUid(5),
                packet: FlagPacket::picked_up(NetworkUid(3)),
            })
            .unwrap();
        client.tick();

        let attachment = client.world().get::<Attachment>(flag_entity).unwrap();
        assert!(attachment.attached);
        assert_eq!(attachment.holder, carrier);
        assert!(client
            .drain_events()
            .iter()
            .any(|e| matches!(e, GameEvent::FlagPickedUp { .. })));
    }

    #[test]
    fn flag_drop_packet_places_the_flag() {
        let mut client = live_client();
        client
            .apply_packet(flag_create(5, NetworkUid::INVALID, None))
            .unwrap();
        let flag_entity = client.entity_of(NetworkUid(5)).unwrap();

        client
            .apply_packet(ServerPacket::Flag {
                flag: NetworkUid(5),
                packet: FlagPacket::dropped([1.0, 2.0, 3.0]),
            })
            .unwrap();
        client.tick();

        assert_eq!(
            client.world().get::<Position>(flag_entity).unwrap().0,
            Vec3::new(1.0, 2.0, 3.0)
        );
        assert!(!client.world().get::<Attachment>(flag_entity).unwrap().attached);
    }

    #[test]
    fn late_join_flag_arrives_already_carried() {
        let mut client = live_client();
        client.apply_packet(player_create(3, 4, RED)).unwrap();
        client
            .apply_packet(flag_create(5, NetworkUid(3), None))
            .unwrap();

        let flag_entity = client.entity_of(NetworkUid(5)).unwrap();
        let attachment = client.world().get::<Attachment>(flag_entity).unwrap();
        assert!(attachment.attached);
        assert_eq!(attachment.holder, client.entity_of(NetworkUid(3)).unwrap());
    }

    #[test]
    fn local_fire_predicts_and_queues_intent() {
        let mut client = live_client();
        assert!(client.local_fire(AmmoType::Paint));
        // Second shot refused by the fire-rate cooldown, nothing queued.
        assert!(!client.local_fire(AmmoType::Paint));
        client.tick();

        let out = client.take_outbound();
        assert_eq!(out.len(), 1);
        let ClientPacket::Action(action) = &out[0];
        assert_eq!(action.fired_ammo, Some(AmmoType::Paint));

        let weapon_entity = client.entity_of(NetworkUid(2)).unwrap();
        let weapon = client.world().get::<Weapon>(weapon_entity).unwrap();
        assert_eq!(weapon.paint.count, weapon.paint.capacity - 1);
    }

    #[test]
    fn fire_before_match_begin_is_refused() {
        let mut client = ClientGame::new(NetworkUid(1));
        client.apply_packet(player_create(1, 2, BLUE)).unwrap();
        client.apply_packet(ServerPacket::MatchStart).unwrap();
        assert!(!client.local_fire(AmmoType::Paint));
        client.tick();
        assert!(client.take_outbound().is_empty());
    }

    #[test]
    fn fire_during_a_predicted_reload_aborts_it() {
        let mut client = live_client();
        let weapon_entity = client.entity_of(NetworkUid(2)).unwrap();
        {
            let mut weapon = client.world_mut().get_mut::<Weapon>(weapon_entity).unwrap();
            weapon.paint.count = 3;
        }
        assert!(client.local_reload());
        assert!(client.local_fire(AmmoType::Paint));
        client.tick();

        let weapon = client.world().get::<Weapon>(weapon_entity).unwrap();
        assert!(!weapon.is_reloading());
        assert_eq!(weapon.paint.count, 2);

        // Both the reload start and the fire reach the server in one action.
        let out = client.take_outbound();
        assert_eq!(out.len(), 1);
        let ClientPacket::Action(action) = &out[0];
        assert!(action.started_reload);
        assert_eq!(action.fired_ammo, Some(AmmoType::Paint));
    }

    #[test]
    fn local_auto_reload_is_sent_as_intent() {
        let mut client = live_client();
        let weapon_entity = client.entity_of(NetworkUid(2)).unwrap();
        {
            let mut weapon = client.world_mut().get_mut::<Weapon>(weapon_entity).unwrap();
            weapon.paint.count = 0;
            weapon.water.count = 0;
        }
        client.tick();

        assert!(client.world().get::<Weapon>(weapon_entity).unwrap().is_reloading());
        let out = client.take_outbound();
        assert_eq!(out.len(), 1);
        let ClientPacket::Action(action) = &out[0];
        assert!(action.started_reload);
        assert_eq!(action.fired_ammo, None);
    }

    #[test]
    fn empty_ticks_send_no_action_packets() {
        let mut client = live_client();
        client.tick();
        client.tick();
        assert!(client.take_outbound().is_empty());
    }

    #[test]
    fn foreign_action_response_replays_the_shot() {
        let mut client = live_client();
        client.apply_packet(player_create(3, 4, RED)).unwrap();
        client
            .apply_packet(ServerPacket::ActionResponse {
                player: NetworkUid(3),
                response: PlayerActionResponse {
                    fired_ammo: AmmoType::Water,
                    weapon_position: [1.0, 0.0, 0.0],
                    weapon_velocity: [0.0, 0.0, -30.0],
                },
            })
            .unwrap();
        client.tick();

        let foreign = client.entity_of(NetworkUid(3)).unwrap();
        assert!(client.drain_events().iter().any(|e| matches!(
            e,
            GameEvent::WeaponFired { owner, ammo: AmmoType::Water, .. } if *owner == foreign
        )));
        let world = client.world_mut();
        let mut query = world.query::<&Projectile>();
        assert_eq!(query.iter(world).count(), 1);
    }

    #[test]
    fn own_action_response_is_ignored() {
        let mut client = live_client();
        client
            .apply_packet(ServerPacket::ActionResponse {
                player: NetworkUid(1),
                response: PlayerActionResponse {
                    fired_ammo: AmmoType::Paint,
                    weapon_position: [0.0; 3],
                    weapon_velocity: [0.0, 0.0, -30.0],
                },
            })
            .unwrap();
        client.tick();
        assert!(client
            .drain_events()
            .iter()
            .all(|e| !matches!(e, GameEvent::WeaponFired { .. })));
    }

    #[test]
    fn single_player_countdown_opens_gameplay() {
        let mut client = ClientGame::single_player(GameMode::CtfCommonFlag, 3);
        client.start_match_countdown();
        assert!(!client.gameplay_live());
        for _ in 0..200 {
            client.tick();
        }
        assert!(client.gameplay_live());
    }

    #[test]
    fn spectator_roster_is_uid_ordered_teammates() {
        let mut client = live_client();
        client.apply_packet(player_create(7, 8, BLUE)).unwrap();
        client.apply_packet(player_create(3, 4, BLUE)).unwrap();
        client.apply_packet(player_create(5, 6, RED)).unwrap();

        client.notify_local_player_alive(false);
        let first = client.spectator_target().unwrap();
        assert_eq!(first, client.entity_of(NetworkUid(3)).unwrap());
        client.cycle_spectator(1);
        assert_eq!(
            client.spectator_target().unwrap(),
            client.entity_of(NetworkUid(7)).unwrap()
        );

        client.notify_local_player_alive(true);
        assert!(client.spectator_target().is_none());
    }
}
