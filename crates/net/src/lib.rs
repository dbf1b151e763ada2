#![warn(missing_docs)]
//! Replication plumbing shared by the client/server: wire packets, the
//! network-UID translation table, and per-entity packet mailboxes.
//!
//! Transport framing (sockets, reliability, encryption) is an external
//! collaborator. This crate assumes inbound packets have already been
//! deposited into mailboxes before the gameplay tick begins, and exposes
//! outbound queues for a separate flush.

mod mailbox;
pub mod protocol;
mod registry;

pub use mailbox::PacketMailbox;
pub use protocol::{
    ClientPacket, CreateLevelObject, FlagPacket, FlagPacketKind, LevelObjectPayload,
    PlayerAction, PlayerActionResponse, ServerPacket, TeamScored, PROTOCOL_VERSION,
};
pub use registry::{NetworkUid, NetworkUidRegistry, RegistryError};

use serde::{Deserialize, Serialize};

/// Schema hash for on-the-wire compatibility checks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaHash(pub u64);

impl SchemaHash {
    /// Default development hash; replace when the protocol stabilizes.
    pub const DEV: Self = Self(0xCC_5EED_CC_5EED);
}

/// Message envelope wrapping a packet for the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    /// Schema hash to reject incompatible builds.
    pub schema: SchemaHash,
    /// Simulation tick the payload references.
    pub tick: u64,
    /// Payload data.
    pub payload: T,
}

impl<T> MessageEnvelope<T> {
    /// Wrap the payload with the development schema hash.
    pub fn dev(payload: T, tick: u64) -> Self {
        Self {
            schema: SchemaHash::DEV,
            tick,
            payload,
        }
    }
}
