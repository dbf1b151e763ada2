//! Collision group bit flags consumed by the physics collaborator.

use bitflags::bitflags;

/// Number of low bits reserved by the engine substrate for its own groups
/// (static geometry, dynamic bodies, character controllers).
pub const ENGINE_RESERVED_GROUP_BITS: u32 = 4;

bitflags! {
    /// Game-level collision groups, allocated above the engine-reserved bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CollisionGroups: u32 {
        /// Player capsules.
        const PLAYER = 1 << ENGINE_RESERVED_GROUP_BITS;
        /// Flag trigger / carry shapes.
        const FLAG = 1 << (ENGINE_RESERVED_GROUP_BITS + 1);
        /// Delivery base triggers.
        const BASE = 1 << (ENGINE_RESERVED_GROUP_BITS + 2);
        /// Everything else the game spawns (projectiles, props).
        const OTHERS = 1 << (ENGINE_RESERVED_GROUP_BITS + 3);
    }
}

impl CollisionGroups {
    /// Groups a flag trigger shape should overlap-test against.
    pub fn flag_trigger_mask() -> Self {
        CollisionGroups::PLAYER
    }

    /// Groups a delivery base trigger should overlap-test against.
    pub fn base_trigger_mask() -> Self {
        CollisionGroups::FLAG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_are_disjoint_and_above_reserved_bits() {
        let all = [
            CollisionGroups::PLAYER,
            CollisionGroups::FLAG,
            CollisionGroups::BASE,
            CollisionGroups::OTHERS,
        ];
        for (i, a) in all.iter().enumerate() {
            assert!(a.bits() >= 1 << ENGINE_RESERVED_GROUP_BITS);
            for b in &all[i + 1..] {
                assert!((*a & *b).is_empty());
            }
        }
    }
}
