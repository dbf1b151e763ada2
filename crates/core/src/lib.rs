#![warn(missing_docs)]
//! Core primitives shared across the workspace.

pub mod collision;
pub mod team;
pub mod tunables;

use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use collision::CollisionGroups;
pub use team::{AmmoType, GameMode, PaintTeam, TeamIndex, TeamPalette};

/// Fixed tick type (30 TPS => ~33 ms per tick).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimTick(pub u64);

impl SimTick {
    /// First tick in any deterministic timeline.
    pub const ZERO: Self = Self(0);

    /// Advance by `delta` ticks.
    pub fn advance(self, delta: u64) -> Self {
        Self(self.0 + delta)
    }
}

/// Fixed simulation step in seconds.
pub const FIXED_TICK_SECONDS: f32 = 1.0 / 30.0;

/// Monotonic game clock advanced by the fixed simulation step.
///
/// All cooldown and respawn timestamps are expressed in seconds against this
/// clock, never against wall time, so replays stay deterministic.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GameClock {
    /// Seconds elapsed since match creation.
    pub elapsed: f32,
    /// Current fixed tick.
    pub tick: SimTick,
}

impl GameClock {
    /// Clock at the start of a match.
    pub fn new() -> Self {
        Self {
            elapsed: 0.0,
            tick: SimTick::ZERO,
        }
    }

    /// Advance one fixed step.
    pub fn step(&mut self, dt: f32) {
        self.elapsed += dt;
        self.tick = self.tick.advance(1);
    }

    /// Current time in seconds.
    pub fn now(&self) -> f32 {
        self.elapsed
    }
}
