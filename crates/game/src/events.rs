//! In-process event bus.
//!
//! Fire-and-forget, synchronous delivery to registered handlers; a handler
//! returning `true` consumes the event and stops propagation. Every
//! published event is also appended to a log drained by UI glue and tests.

use bevy_ecs::entity::Entity;
use bevy_ecs::system::Resource;
use crazycanvas_core::{AmmoType, GameMode, PaintTeam, TeamIndex};
use glam::Vec3;

/// One step of the pre-match countdown stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStep {
    /// Whole seconds remaining (5 down to 0).
    Seconds(u8),
    /// Sentinel telling the UI to hide the countdown display.
    Hide,
}

/// Discrete gameplay occurrences produced and consumed by the core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameEvent {
    /// A player picked up a flag (authoritative on server, mirrored on
    /// client packet receipt).
    FlagPickedUp {
        /// The flag.
        flag: Entity,
        /// The new carrier.
        player: Entity,
    },
    /// A carried flag was dropped.
    FlagDropped {
        /// The flag.
        flag: Entity,
        /// The previous carrier.
        player: Entity,
    },
    /// A flag was delivered at a base.
    FlagDelivered {
        /// The flag.
        flag: Entity,
        /// The delivering carrier.
        player: Entity,
        /// The flag's owning team, if any.
        flag_team: Option<TeamIndex>,
        /// Team credited with the score.
        scoring_team: TeamIndex,
    },
    /// A team flag re-homed after its respawn timeout.
    FlagRespawn {
        /// The flag.
        flag: Entity,
        /// Owning team, or `None` for a neutral flag.
        team: Option<TeamIndex>,
    },
    /// Match created with the given mode.
    MatchInitialized {
        /// Active game mode.
        mode: GameMode,
    },
    /// Countdown step for UI/audio.
    MatchCountdown {
        /// The step.
        step: CountdownStep,
    },
    /// Match ended.
    GameOver {
        /// Winning team.
        winning_team: TeamIndex,
    },
    /// A weapon fired (predicted locally or replayed authoritatively).
    WeaponFired {
        /// Owning player.
        owner: Entity,
        /// Ammo flavor.
        ammo: AmmoType,
        /// Muzzle position.
        position: Vec3,
        /// Projectile velocity.
        velocity: Vec3,
        /// Normalized aim direction.
        direction: Vec3,
        /// Shooter's team.
        team: TeamIndex,
    },
    /// A projectile splashed something it is allowed to mark.
    ProjectileHit {
        /// The projectile.
        projectile: Entity,
        /// The struck entity, or `None` for level geometry.
        other: Option<Entity>,
        /// Ammo flavor.
        ammo: AmmoType,
        /// Two-color representation of the shooter's team.
        team: PaintTeam,
        /// Raw shooter team index, for consumers supporting more than two
        /// teams.
        shooter_team: TeamIndex,
    },
    /// A reload completed and both pools were refilled.
    WeaponReloadFinished {
        /// Owning player.
        owner: Entity,
    },
    /// A player died or respawned (produced by the alive-tracking
    /// collaborator, consumed by the spectator controller).
    PlayerAliveChanged {
        /// The player.
        player: Entity,
        /// Whether they are now alive.
        alive: bool,
    },
}

type Handler = Box<dyn FnMut(&GameEvent) -> bool + Send + Sync>;

/// Synchronous in-process event bus.
#[derive(Resource, Default)]
pub struct EventBus {
    handlers: Vec<Handler>,
    log: Vec<GameEvent>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Handlers run in registration order; returning
    /// `true` consumes the event.
    pub fn subscribe(&mut self, handler: impl FnMut(&GameEvent) -> bool + Send + Sync + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Publish an event: append to the log, then deliver to handlers until
    /// one consumes it.
    pub fn publish(&mut self, event: GameEvent) {
        tracing::debug!(?event, "event published");
        self.log.push(event);
        for handler in &mut self.handlers {
            if handler(&event) {
                break;
            }
        }
    }

    /// Drain the event log (UI glue, tests).
    pub fn drain_log(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.log)
    }

    /// Peek at the log without draining.
    pub fn log(&self) -> &[GameEvent] {
        &self.log
    }
}
