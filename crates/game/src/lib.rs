#![warn(missing_docs)]
//! Game-state core: the flag, weapon, and match state machines that run
//! identically in structure on client and server, plus the event bus and the
//! adapter seams to the physics/audio collaborators.

pub mod adapters;
pub mod components;
pub mod events;
pub mod flag;
pub mod match_flow;
pub mod spectator;
pub mod weapon;

use bevy_ecs::system::Resource;
use crazycanvas_core::{GameClock, TeamPalette};

pub use adapters::{Adapters, AudioAdapter, PhysicsAdapter, SoundCue};
pub use events::{CountdownStep, EventBus, GameEvent};
pub use match_flow::{Broadcasts, ClientCountdown, MatchInfo};
pub use spectator::SpectatorController;

/// The match clock as an ECS resource. Advanced once per fixed tick by the
/// host; every cooldown comparison reads it.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct Clock(pub GameClock);

impl Clock {
    /// Current time in seconds.
    pub fn now(&self) -> f32 {
        self.0.now()
    }
}

/// The team color registry as an ECS resource. Hosts read it when building
/// materials for replicated objects; admin recolor commands mutate it.
#[derive(Resource, Debug, Clone, Default)]
pub struct Palette(pub TeamPalette);
