//! Bidirectional mapping between local entity handles and network UIDs.
//!
//! Client and server allocate entity handles independently; the network UID
//! is the identity both peers agree on. The server numbers objects after its
//! own entity indices and clients adopt whatever the create packet says.
//! Uses `BTreeMap` for deterministic iteration order.

use bevy_ecs::entity::Entity;
use bevy_ecs::system::Resource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::error;

/// Stable cross-peer identifier for a replicated entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NetworkUid(pub i32);

impl NetworkUid {
    /// Sentinel for "no entity" in fixed-layout packet fields.
    pub const INVALID: Self = Self(-1);

    /// Whether this uid refers to an entity.
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

/// Errors from registry mutation. These indicate replication bugs, not
/// recoverable runtime conditions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The uid is already bound to a different local entity.
    #[error("network uid {0:?} is already mapped to a different entity")]
    UidInUse(NetworkUid),
    /// The entity is already bound to a different uid.
    #[error("entity is already registered as {0:?}")]
    EntityInUse(NetworkUid),
}

/// Process-wide translation table consumed by every packet handler.
///
/// Pure table mutation; no network I/O happens here.
#[derive(Resource, Default)]
pub struct NetworkUidRegistry {
    uid_to_entity: BTreeMap<NetworkUid, Entity>,
    entity_to_uid: BTreeMap<Entity, NetworkUid>,
}

impl NetworkUidRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `entity` to `uid`. Re-registering the same pair is a no-op;
    /// binding either side to a different partner is a programmer error,
    /// logged and returned.
    pub fn register(&mut self, entity: Entity, uid: NetworkUid) -> Result<(), RegistryError> {
        debug_assert!(uid.is_valid(), "cannot register the invalid uid");
        match self.uid_to_entity.get(&uid) {
            Some(existing) if *existing == entity => return Ok(()),
            Some(_) => {
                error!(?uid, "network uid already mapped to a different entity");
                return Err(RegistryError::UidInUse(uid));
            }
            None => {}
        }
        if let Some(existing) = self.entity_to_uid.get(&entity) {
            error!(?existing, "entity already registered under another uid");
            return Err(RegistryError::EntityInUse(*existing));
        }
        self.uid_to_entity.insert(uid, entity);
        self.entity_to_uid.insert(entity, uid);
        Ok(())
    }

    /// Server-side registration: the uid is the entity's own raw index.
    pub fn register_server_side(&mut self, entity: Entity) -> Result<NetworkUid, RegistryError> {
        let uid = NetworkUid(entity.index() as i32);
        self.register(entity, uid)?;
        Ok(uid)
    }

    /// Look up the local entity for a uid. Callers must handle `None`
    /// (packet referencing an object this peer has not spawned yet).
    pub fn entity(&self, uid: NetworkUid) -> Option<Entity> {
        self.uid_to_entity.get(&uid).copied()
    }

    /// Reverse lookup.
    pub fn uid(&self, entity: Entity) -> Option<NetworkUid> {
        self.entity_to_uid.get(&entity).copied()
    }

    /// Remove an entity's binding on despawn.
    pub fn unregister(&mut self, entity: Entity) -> Option<NetworkUid> {
        let uid = self.entity_to_uid.remove(&entity)?;
        self.uid_to_entity.remove(&uid);
        Some(uid)
    }

    /// Number of registered bindings.
    pub fn len(&self) -> usize {
        self.uid_to_entity.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.uid_to_entity.is_empty()
    }
}
