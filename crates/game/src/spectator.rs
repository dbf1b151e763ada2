//! Spectator camera controller for the death interlude.
//!
//! While the local player is dead the camera tracks a teammate; input cycles
//! through the team roster. The raw cycle index is unbounded and only
//! wrapped when a target is picked, so the roster may shrink or grow between
//! cycles without the index going stale.

use bevy_ecs::entity::Entity;
use bevy_ecs::system::Resource;
use glam::Vec3;

/// Default third-person camera offset in the target's local frame.
pub const DEFAULT_CAMERA_OFFSET: Vec3 = Vec3::new(0.0, 2.0, 4.0);

/// Client-side spectator state.
#[derive(Resource, Debug, Clone)]
pub struct SpectatorController {
    spectating: bool,
    index: i32,
    camera_offset: Vec3,
}

impl Default for SpectatorController {
    fn default() -> Self {
        Self {
            spectating: false,
            index: 0,
            camera_offset: DEFAULT_CAMERA_OFFSET,
        }
    }
}

impl SpectatorController {
    /// React to the local player dying or respawning. Death pulls the
    /// camera closer (offset halved) and starts spectating from the first
    /// teammate; respawn restores the offset and exits.
    pub fn on_local_player_alive_changed(&mut self, alive: bool) {
        if alive {
            if self.spectating {
                self.spectating = false;
                self.camera_offset *= 2.0;
            }
        } else if !self.spectating {
            self.spectating = true;
            self.index = 0;
            self.camera_offset *= 0.5;
        }
    }

    /// Cycle the spectated teammate forward (+1) or backward (-1). No-op
    /// while alive.
    pub fn cycle(&mut self, delta: i32) {
        if self.spectating {
            self.index += delta;
        }
    }

    /// Pick the spectated teammate from the current roster. Dead teammates
    /// are legitimate targets; the roster is whoever is on the team.
    pub fn target(&self, teammates: &[Entity]) -> Option<Entity> {
        if !self.spectating || teammates.is_empty() {
            return None;
        }
        let idx = self.index.rem_euclid(teammates.len() as i32) as usize;
        Some(teammates[idx])
    }

    /// Whether the camera is in spectate mode.
    pub fn spectating(&self) -> bool {
        self.spectating
    }

    /// Current camera offset from the tracked target.
    pub fn camera_offset(&self) -> Vec3 {
        self.camera_offset
    }

    /// Camera position for a target at `target_position`.
    pub fn camera_position(&self, target_position: Vec3) -> Vec3 {
        target_position + self.camera_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(n: u32) -> Vec<Entity> {
        (0..n).map(Entity::from_raw).collect()
    }

    #[test]
    fn death_enters_spectate_at_first_teammate_with_halved_offset() {
        let mut spec = SpectatorController::default();
        let mates = roster(3);

        assert_eq!(spec.target(&mates), None);
        spec.on_local_player_alive_changed(false);
        assert!(spec.spectating());
        assert_eq!(spec.target(&mates), Some(mates[0]));
        assert_eq!(spec.camera_offset(), DEFAULT_CAMERA_OFFSET * 0.5);
    }

    #[test]
    fn respawn_exits_and_restores_offset() {
        let mut spec = SpectatorController::default();
        spec.on_local_player_alive_changed(false);
        spec.on_local_player_alive_changed(true);
        assert!(!spec.spectating());
        assert_eq!(spec.camera_offset(), DEFAULT_CAMERA_OFFSET);
    }

    #[test]
    fn repeated_death_notifications_do_not_compound_the_offset() {
        let mut spec = SpectatorController::default();
        spec.on_local_player_alive_changed(false);
        spec.on_local_player_alive_changed(false);
        assert_eq!(spec.camera_offset(), DEFAULT_CAMERA_OFFSET * 0.5);
        spec.on_local_player_alive_changed(true);
        spec.on_local_player_alive_changed(true);
        assert_eq!(spec.camera_offset(), DEFAULT_CAMERA_OFFSET);
    }

    #[test]
    fn cycling_wraps_both_directions() {
        let mut spec = SpectatorController::default();
        let mates = roster(3);
        spec.on_local_player_alive_changed(false);

        spec.cycle(1);
        assert_eq!(spec.target(&mates), Some(mates[1]));
        spec.cycle(1);
        spec.cycle(1);
        assert_eq!(spec.target(&mates), Some(mates[0]));
        spec.cycle(-1);
        assert_eq!(spec.target(&mates), Some(mates[2]));
    }

    #[test]
    fn wrap_tracks_a_changing_roster() {
        let mut spec = SpectatorController::default();
        spec.on_local_player_alive_changed(false);
        spec.cycle(1);
        spec.cycle(1);

        // Index 2 of a 3-roster, index 0 of a 2-roster.
        assert_eq!(spec.target(&roster(3)), Some(Entity::from_raw(2)));
        assert_eq!(spec.target(&roster(2)), Some(Entity::from_raw(0)));
        assert_eq!(spec.target(&[]), None);
    }

    #[test]
    fn cycling_while_alive_is_ignored() {
        let mut spec = SpectatorController::default();
        let mates = roster(3);
        spec.cycle(1);
        spec.on_local_player_alive_changed(false);
        assert_eq!(spec.target(&mates), Some(mates[0]));
    }
}
