//! Protocol message definitions for client-server replication.
//!
//! All messages use postcard serialization for compact binary encoding.
//! Positions travel as `[f32; 3]` on the wire; gameplay code converts to
//! `glam` types at the boundary.

use crate::registry::NetworkUid;
use crazycanvas_core::team::MAX_NUM_TEAMS;
use crazycanvas_core::{AmmoType, TeamIndex};
use serde::{Deserialize, Serialize};

/// Protocol version for compatibility checking.
pub const PROTOCOL_VERSION: u16 = 1;

/// Position or direction on the wire.
pub type WireVec3 = [f32; 3];

/// Upper bound on a replicated score value; anything above this is a
/// corrupt or hostile packet.
pub const MAX_SCORE_LIMIT: u32 = 1000;

/// Which flag transition a [`FlagPacket`] replicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagPacketKind {
    /// A player picked the flag up.
    PickedUp,
    /// The flag was dropped (or force-dropped after a delivery).
    Dropped,
}

/// Replicates a flag state transition from the authoritative server.
///
/// Fixed layout: `picked_up_by` is only meaningful for `PickedUp` (the
/// invalid uid otherwise), `dropped_position` only for `Dropped`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlagPacket {
    /// Transition discriminator.
    pub kind: FlagPacketKind,
    /// Network uid of the picking player, or [`NetworkUid::INVALID`].
    pub picked_up_by: NetworkUid,
    /// World position the flag was dropped at.
    pub dropped_position: WireVec3,
}

impl FlagPacket {
    /// Build a pickup packet.
    pub fn picked_up(by: NetworkUid) -> Self {
        Self {
            kind: FlagPacketKind::PickedUp,
            picked_up_by: by,
            dropped_position: [0.0; 3],
        }
    }

    /// Build a drop packet.
    pub fn dropped(position: WireVec3) -> Self {
        Self {
            kind: FlagPacketKind::Dropped,
            picked_up_by: NetworkUid::INVALID,
            dropped_position: position,
        }
    }
}

/// Per-kind payload of a [`CreateLevelObject`] packet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LevelObjectPayload {
    /// A player avatar plus its weapon.
    Player {
        /// Uid the receiving client should use for the player entity.
        /// Equal to the receiver's own uid for the local player.
        client_uid: NetworkUid,
        /// Uid of the weapon entity created alongside.
        weapon_uid: NetworkUid,
        /// The avatar's team.
        team: TeamIndex,
    },
    /// A flag, optionally team-owned, optionally already carried.
    Flag {
        /// Carrier uid, or invalid if the flag is free.
        parent_uid: NetworkUid,
        /// Owning team; `None` in common-flag mode.
        team: Option<TeamIndex>,
    },
    /// A delivery base trigger.
    DeliveryPoint {
        /// Team that may deliver here.
        team: TeamIndex,
    },
    /// A flag spawn marker.
    FlagSpawn {
        /// Spawn jitter radius in meters.
        radius: f32,
    },
}

/// Spawns a replicated entity on the client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreateLevelObject {
    /// Identity both peers will use for this object.
    pub network_uid: NetworkUid,
    /// Spawn position.
    pub position: WireVec3,
    /// Facing direction.
    pub forward: WireVec3,
    /// Per-kind payload.
    pub payload: LevelObjectPayload,
}

/// Score update broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamScored {
    /// Team that scored.
    pub team: TeamIndex,
    /// Authoritative new score.
    pub new_score: u32,
}

/// Per-tick input intent from a client. Several systems accrete fields onto
/// the pending packet within one tick before it is flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerAction {
    /// Ammo type fired this tick, if any.
    pub fired_ammo: Option<AmmoType>,
    /// Whether a reload was started this tick.
    pub started_reload: bool,
}

impl PlayerAction {
    /// Whether the packet carries any intent worth sending.
    pub fn is_empty(&self) -> bool {
        self.fired_ammo.is_none() && !self.started_reload
    }
}

/// Authoritative replay of a remote player's fire, broadcast so foreign
/// weapons fire in lockstep on every client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerActionResponse {
    /// Ammo type the server fired.
    pub fired_ammo: AmmoType,
    /// Muzzle position at fire time.
    pub weapon_position: WireVec3,
    /// Projectile velocity.
    pub weapon_velocity: WireVec3,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ServerPacket {
    /// Spawn a replicated entity.
    Create(CreateLevelObject),
    /// Despawn a replicated entity.
    Delete {
        /// Object to remove.
        network_uid: NetworkUid,
    },
    /// Flag transition, addressed by the flag's uid.
    Flag {
        /// Flag the transition applies to.
        flag: NetworkUid,
        /// The transition.
        packet: FlagPacket,
    },
    /// Score update broadcast.
    TeamScored(TeamScored),
    /// Match start: clients begin their countdown.
    MatchStart,
    /// Match begin: gameplay is live.
    MatchBegin,
    /// Match end broadcast.
    GameOver {
        /// Winning team.
        winning_team: TeamIndex,
    },
    /// Foreign-player fire replay, addressed by the player's uid.
    ActionResponse {
        /// Player whose action is replayed.
        player: NetworkUid,
        /// The authoritative outcome.
        response: PlayerActionResponse,
    },
}

impl ServerPacket {
    /// Verify limits and validity. Call on every received packet.
    pub fn verify(&self) -> Result<(), &'static str> {
        match self {
            ServerPacket::Create(create) => {
                if !finite(&create.position) || !finite(&create.forward) {
                    return Err("Non-finite create transform");
                }
                match create.payload {
                    LevelObjectPayload::Player { team, .. } => verify_team(team)?,
                    LevelObjectPayload::Flag {
                        team: Some(team), ..
                    } => verify_team(team)?,
                    LevelObjectPayload::DeliveryPoint { team } => verify_team(team)?,
                    _ => {}
                }
            }
            ServerPacket::Flag { packet, .. } => {
                if !finite(&packet.dropped_position) {
                    return Err("Non-finite drop position");
                }
            }
            ServerPacket::TeamScored(scored) => {
                verify_team(scored.team)?;
                if scored.new_score > MAX_SCORE_LIMIT {
                    return Err("Score above limit");
                }
            }
            ServerPacket::GameOver { winning_team } => verify_team(*winning_team)?,
            ServerPacket::ActionResponse { response, .. } => {
                if !finite(&response.weapon_position) || !finite(&response.weapon_velocity) {
                    return Err("Non-finite action response kinematics");
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Messages sent from client to server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientPacket {
    /// Per-tick input intent.
    Action(PlayerAction),
}

fn verify_team(team: TeamIndex) -> Result<(), &'static str> {
    if (team.0 as usize) < MAX_NUM_TEAMS {
        Ok(())
    } else {
        Err("Team index out of range")
    }
}

fn finite(v: &WireVec3) -> bool {
    v.iter().all(|c| c.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_packet_roundtrip() {
        let packet = ServerPacket::Flag {
            flag: NetworkUid(12),
            packet: FlagPacket::picked_up(NetworkUid(3)),
        };
        let encoded = postcard::to_allocvec(&packet).expect("Failed to encode");
        let decoded: ServerPacket = postcard::from_bytes(&encoded).expect("Failed to decode");
        assert_eq!(packet, decoded);
    }

    #[test]
    fn pickup_packet_carries_invalid_drop_fields() {
        let packet = FlagPacket::picked_up(NetworkUid(5));
        assert_eq!(packet.kind, FlagPacketKind::PickedUp);
        assert_eq!(packet.dropped_position, [0.0; 3]);

        let dropped = FlagPacket::dropped([1.0, 2.0, 3.0]);
        assert_eq!(dropped.picked_up_by, NetworkUid::INVALID);
    }

    #[test]
    fn create_level_object_roundtrip() {
        let packet = ServerPacket::Create(CreateLevelObject {
            network_uid: NetworkUid(1),
            position: [1.0, 0.0, -2.0],
            forward: [0.0, 0.0, 1.0],
            payload: LevelObjectPayload::Player {
                client_uid: NetworkUid(1),
                weapon_uid: NetworkUid(2),
                team: TeamIndex(0),
            },
        });
        let encoded = postcard::to_allocvec(&packet).expect("Failed to encode");
        let decoded: ServerPacket = postcard::from_bytes(&encoded).expect("Failed to decode");
        assert_eq!(packet, decoded);
    }

    #[test]
    fn verify_rejects_bad_team_index() {
        let packet = ServerPacket::TeamScored(TeamScored {
            team: TeamIndex(MAX_NUM_TEAMS as u8),
            new_score: 1,
        });
        assert!(packet.verify().is_err());
    }

    #[test]
    fn verify_rejects_absurd_score() {
        let packet = ServerPacket::TeamScored(TeamScored {
            team: TeamIndex(0),
            new_score: MAX_SCORE_LIMIT + 1,
        });
        assert_eq!(packet.verify().unwrap_err(), "Score above limit");
    }

    #[test]
    fn verify_rejects_non_finite_positions() {
        let packet = ServerPacket::Flag {
            flag: NetworkUid(1),
            packet: FlagPacket::dropped([f32::NAN, 0.0, 0.0]),
        };
        assert!(packet.verify().is_err());
    }

    #[test]
    fn empty_player_action_is_detected() {
        assert!(PlayerAction::default().is_empty());
        assert!(!PlayerAction {
            fired_ammo: Some(AmmoType::Paint),
            started_reload: false,
        }
        .is_empty());
        assert!(!PlayerAction {
            fired_ammo: None,
            started_reload: true,
        }
        .is_empty());
    }
}
