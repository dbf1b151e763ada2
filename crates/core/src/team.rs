//! Teams, game modes, and the team color palette.
//!
//! The palette deliberately separates "team" from "color slot": the number of
//! colors shipped with the game is fixed while the number of teams in a match
//! is a configuration choice, so every team-to-color query goes through an
//! indirection table.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Number of distinct team colors shipped with the game.
pub const NUM_TEAM_COLORS_AVAILABLE: usize = 6;

/// Maximum number of teams a match may be configured with.
pub const MAX_NUM_TEAMS: usize = 4;

/// Index of a team within a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamIndex(pub u8);

impl TeamIndex {
    /// Team 0, conventionally "blue".
    pub const BLUE: Self = Self(0);
    /// Team 1, conventionally "red".
    pub const RED: Self = Self(1);
}

/// Ammo flavors carried by every weapon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AmmoType {
    /// Marks enemies.
    Paint,
    /// Cleans teammates.
    Water,
}

impl AmmoType {
    /// Both ammo flavors, in a fixed order.
    pub const ALL: [AmmoType; 2] = [AmmoType::Paint, AmmoType::Water];
}

/// Capture-the-flag variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    /// No active mode.
    None,
    /// One neutral flag contested by all teams.
    CtfCommonFlag,
    /// Each team owns a flag that respawns on a timeout after being dropped.
    CtfTeamFlag,
}

/// Two-color team classification used by paint-splash payloads.
///
/// Team index 0 maps to blue and every other index to red. This is a known
/// two-team shortcut carried over from the original game; consumers that
/// support more teams need the raw [`TeamIndex`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaintTeam {
    /// Team index 0.
    Blue,
    /// Any other team index.
    Red,
}

impl From<TeamIndex> for PaintTeam {
    fn from(team: TeamIndex) -> Self {
        if team.0 == 0 {
            PaintTeam::Blue
        } else {
            PaintTeam::Red
        }
    }
}

/// Stable identifier for a material asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialGuid(pub u64);

/// One entry of the shipped color palette.
#[derive(Debug, Clone, Copy)]
pub struct TeamColor {
    /// Linear RGB color.
    pub color: Vec3,
    /// Material used for team-colored props (flags, bases).
    pub color_material: MaterialGuid,
    /// Material used for player avatars.
    pub player_material: MaterialGuid,
}

/// Team color registry built once during match setup.
///
/// Held as an ECS resource and passed by reference; nothing here is static or
/// globally mutable. Recoloring a team is an explicit admin operation.
#[derive(Debug, Clone)]
pub struct TeamPalette {
    palette: [TeamColor; NUM_TEAM_COLORS_AVAILABLE],
    color_indices: [usize; MAX_NUM_TEAMS],
}

impl TeamPalette {
    /// Build the palette with the default team-to-color assignment
    /// (team N uses color slot N).
    pub fn new() -> Self {
        let palette = std::array::from_fn(|slot| TeamColor {
            color: DEFAULT_COLORS[slot],
            color_material: MaterialGuid(0x1000 + slot as u64),
            player_material: MaterialGuid(0x2000 + slot as u64),
        });
        Self {
            palette,
            color_indices: std::array::from_fn(|team| team % NUM_TEAM_COLORS_AVAILABLE),
        }
    }

    /// Color of a team.
    pub fn team_color(&self, team: TeamIndex) -> Vec3 {
        self.entry(team).color
    }

    /// Material for team-colored props.
    pub fn team_color_material(&self, team: TeamIndex) -> MaterialGuid {
        self.entry(team).color_material
    }

    /// Material for player avatars of a team.
    pub fn team_player_material(&self, team: TeamIndex) -> MaterialGuid {
        self.entry(team).player_material
    }

    /// Reassign a team to a different color slot (admin recolor).
    ///
    /// Out-of-range slots are ignored; teams beyond [`MAX_NUM_TEAMS`] are a
    /// programmer error and panic in debug builds.
    pub fn set_team_color(&mut self, team: TeamIndex, color_slot: usize) {
        debug_assert!((team.0 as usize) < MAX_NUM_TEAMS, "team out of range");
        if color_slot < NUM_TEAM_COLORS_AVAILABLE {
            self.color_indices[team.0 as usize % MAX_NUM_TEAMS] = color_slot;
        }
    }

    fn entry(&self, team: TeamIndex) -> &TeamColor {
        let slot = self.color_indices[team.0 as usize % MAX_NUM_TEAMS];
        &self.palette[slot]
    }
}

impl Default for TeamPalette {
    fn default() -> Self {
        Self::new()
    }
}

const DEFAULT_COLORS: [Vec3; NUM_TEAM_COLORS_AVAILABLE] = [
    Vec3::new(0.0, 0.2, 1.0),  // blue
    Vec3::new(1.0, 0.1, 0.1),  // red
    Vec3::new(0.1, 0.9, 0.2),  // green
    Vec3::new(1.0, 0.8, 0.0),  // yellow
    Vec3::new(0.7, 0.1, 0.9),  // purple
    Vec3::new(1.0, 0.5, 0.0),  // orange
];
