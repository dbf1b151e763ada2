//! Adapter seams to the physics and audio collaborators.
//!
//! The core never talks to the physics SDK or the audio device directly; it
//! calls these traits. Hosts install real implementations, tests install the
//! recording doubles.

use bevy_ecs::entity::Entity;
use bevy_ecs::system::Resource;
use crazycanvas_core::CollisionGroups;
use glam::{Quat, Vec3};
use std::sync::{Arc, Mutex};

/// Sound cues the core may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    /// Local weapon fired.
    WeaponFire,
    /// Fire attempt with an empty pool.
    OutOfAmmo,
    /// Reload completed.
    ReloadFinished,
    /// Flag picked up.
    FlagPickedUp,
    /// Flag dropped.
    FlagDropped,
    /// Countdown beep.
    CountdownBeep,
    /// Match over sting.
    GameOver,
}

/// Contract the core requires from the physics SDK wrapper.
pub trait PhysicsAdapter: Send + Sync {
    /// Register a trigger volume with its collision group and overlap mask.
    fn create_trigger(&mut self, entity: Entity, group: CollisionGroups, mask: CollisionGroups);

    /// Switch a flag shape between trigger+query (free) and solid+non-query
    /// (carried, rides along without re-triggering).
    fn set_trigger_enabled(&mut self, entity: Entity, enabled: bool);

    /// Drive a kinematic body toward a transform decided by game logic.
    fn set_kinematic_target(&mut self, entity: Entity, position: Vec3, rotation: Quat);
}

/// Contract the core requires from the audio subsystem.
pub trait AudioAdapter: Send + Sync {
    /// Play a one-shot sound effect.
    fn play_cue(&mut self, cue: SoundCue);
}

/// Installed adapters, held as one resource so jobs can reach both.
#[derive(Resource)]
pub struct Adapters {
    /// Physics collaborator.
    pub physics: Box<dyn PhysicsAdapter>,
    /// Audio collaborator.
    pub audio: Box<dyn AudioAdapter>,
}

impl Adapters {
    /// No-op adapters for headless hosts.
    pub fn null() -> Self {
        Self {
            physics: Box::new(NullPhysics),
            audio: Box::new(NullAudio),
        }
    }

    /// Recording adapters plus the handles to inspect what was recorded.
    pub fn recording() -> (Self, RecordingHandles) {
        let physics = RecordingPhysics::default();
        let audio = RecordingAudio::default();
        let handles = RecordingHandles {
            created_triggers: physics.created_triggers.clone(),
            trigger_calls: physics.trigger_calls.clone(),
            kinematic_targets: physics.kinematic_targets.clone(),
            cues: audio.cues.clone(),
        };
        (
            Self {
                physics: Box::new(physics),
                audio: Box::new(audio),
            },
            handles,
        )
    }
}

/// Physics adapter that drops every call.
pub struct NullPhysics;

impl PhysicsAdapter for NullPhysics {
    fn create_trigger(&mut self, _entity: Entity, _group: CollisionGroups, _mask: CollisionGroups) {
    }
    fn set_trigger_enabled(&mut self, _entity: Entity, _enabled: bool) {}
    fn set_kinematic_target(&mut self, _entity: Entity, _position: Vec3, _rotation: Quat) {}
}

/// Audio adapter that drops every call.
pub struct NullAudio;

impl AudioAdapter for NullAudio {
    fn play_cue(&mut self, _cue: SoundCue) {}
}

/// Shared views into the recording adapters' call logs.
#[derive(Clone)]
pub struct RecordingHandles {
    /// `(entity, group, mask)` per trigger registration.
    pub created_triggers: Arc<Mutex<Vec<(Entity, CollisionGroups, CollisionGroups)>>>,
    /// `(entity, enabled)` per trigger switch.
    pub trigger_calls: Arc<Mutex<Vec<(Entity, bool)>>>,
    /// `(entity, position, rotation)` per kinematic push.
    pub kinematic_targets: Arc<Mutex<Vec<(Entity, Vec3, Quat)>>>,
    /// Played cues in order.
    pub cues: Arc<Mutex<Vec<SoundCue>>>,
}

/// Physics double that records calls for assertions.
#[derive(Default)]
pub struct RecordingPhysics {
    created_triggers: Arc<Mutex<Vec<(Entity, CollisionGroups, CollisionGroups)>>>,
    trigger_calls: Arc<Mutex<Vec<(Entity, bool)>>>,
    kinematic_targets: Arc<Mutex<Vec<(Entity, Vec3, Quat)>>>,
}

impl PhysicsAdapter for RecordingPhysics {
    fn create_trigger(&mut self, entity: Entity, group: CollisionGroups, mask: CollisionGroups) {
        self.created_triggers
            .lock()
            .unwrap()
            .push((entity, group, mask));
    }

    fn set_trigger_enabled(&mut self, entity: Entity, enabled: bool) {
        self.trigger_calls.lock().unwrap().push((entity, enabled));
    }

    fn set_kinematic_target(&mut self, entity: Entity, position: Vec3, rotation: Quat) {
        self.kinematic_targets
            .lock()
            .unwrap()
            .push((entity, position, rotation));
    }
}

/// Audio double that records cues for assertions.
#[derive(Default)]
pub struct RecordingAudio {
    cues: Arc<Mutex<Vec<SoundCue>>>,
}

impl AudioAdapter for RecordingAudio {
    fn play_cue(&mut self, cue: SoundCue) {
        self.cues.lock().unwrap().push(cue);
    }
}
