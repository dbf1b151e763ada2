//! One-shot jobs with explicit component access declarations.
//!
//! A job is the unit of gameplay work triggered from a non-system context
//! (physics overlap callbacks, admin commands). Every job declares the set
//! of component types it touches and with which access mode; the scheduler
//! uses those declarations to decide which jobs could run in parallel, and
//! the [`JobWorld`] accessor enforces them at runtime. Touching an
//! undeclared component type is a contract violation and panics immediately
//! rather than racing silently.

use bevy_ecs::component::Component;
use bevy_ecs::entity::Entity;
use bevy_ecs::system::Resource;
use bevy_ecs::world::{Mut, World};
use std::any::TypeId;

/// How a job or system may touch a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Membership tracking only; no component data is returned.
    NoDirectAccess,
    /// Shared read access.
    Read,
    /// Exclusive read/write access.
    ReadWrite,
}

/// One declared `{component type, access mode}` pair.
#[derive(Debug, Clone, Copy)]
pub struct ComponentAccess {
    type_id: TypeId,
    type_name: &'static str,
    mode: AccessMode,
}

impl ComponentAccess {
    /// Declare tag-only membership access to `T`.
    pub fn tag<T: Component>() -> Self {
        Self::new::<T>(AccessMode::NoDirectAccess)
    }

    /// Declare read access to `T`.
    pub fn read<T: Component>() -> Self {
        Self::new::<T>(AccessMode::Read)
    }

    /// Declare read/write access to `T`.
    pub fn write<T: Component>() -> Self {
        Self::new::<T>(AccessMode::ReadWrite)
    }

    fn new<T: Component>(mode: AccessMode) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            mode,
        }
    }

    /// Access mode of this declaration.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Whether two declarations on the same type conflict (`ReadWrite`
    /// against anything).
    pub fn conflicts_with(&self, other: &Self) -> bool {
        self.type_id == other.type_id
            && (self.mode == AccessMode::ReadWrite || other.mode == AccessMode::ReadWrite)
    }
}

/// Permission-checked world view handed to a running job.
pub struct JobWorld<'w, 'a> {
    world: &'w mut World,
    accesses: &'a [ComponentAccess],
}

impl<'w, 'a> JobWorld<'w, 'a> {
    /// Read a component; panics if the job did not declare at least `Read`
    /// on `T`.
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.check::<T>(AccessMode::Read);
        self.world.get::<T>(entity)
    }

    /// Mutate a component; panics if the job did not declare `ReadWrite`
    /// on `T`.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<Mut<'_, T>> {
        self.check::<T>(AccessMode::ReadWrite);
        self.world.get_mut::<T>(entity)
    }

    /// Membership test; any declaration on `T` (including tag-only)
    /// suffices.
    pub fn contains<T: Component>(&self, entity: Entity) -> bool {
        self.check::<T>(AccessMode::NoDirectAccess);
        self.world.get::<T>(entity).is_some()
    }

    /// Shared access to a resource. Resources sit outside the per-component
    /// permission model; the serialized drain keeps them race-free.
    pub fn resource<R: Resource>(&self) -> &R {
        self.world.resource::<R>()
    }

    /// Exclusive access to a resource.
    pub fn resource_mut<R: Resource>(&mut self) -> Mut<'_, R> {
        self.world.resource_mut::<R>()
    }

    /// Despawn an entity. Structural changes sit outside the per-component
    /// permission model; the serialized drain keeps them race-free.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        self.world.despawn(entity)
    }

    fn check<T: Component>(&self, needed: AccessMode) {
        let id = TypeId::of::<T>();
        let granted = self
            .accesses
            .iter()
            .filter(|a| a.type_id == id)
            .map(|a| a.mode)
            .max_by_key(|m| match m {
                AccessMode::NoDirectAccess => 0u8,
                AccessMode::Read => 1,
                AccessMode::ReadWrite => 2,
            });
        let ok = match (granted, needed) {
            (Some(_), AccessMode::NoDirectAccess) => true,
            (Some(AccessMode::Read) | Some(AccessMode::ReadWrite), AccessMode::Read) => true,
            (Some(AccessMode::ReadWrite), AccessMode::ReadWrite) => true,
            _ => false,
        };
        assert!(
            ok,
            "job accessed {} as {:?} without declaring it",
            std::any::type_name::<T>(),
            needed
        );
    }
}

type JobFn = Box<dyn FnOnce(&mut JobWorld<'_, '_>) + Send + Sync>;

/// A one-shot unit of gameplay work with declared component access.
pub struct Job {
    accesses: Vec<ComponentAccess>,
    run: JobFn,
}

impl Job {
    /// Start declaring a new job.
    pub fn build() -> JobBuilder {
        JobBuilder {
            accesses: Vec::new(),
        }
    }

    /// Declared accesses of this job.
    pub fn accesses(&self) -> &[ComponentAccess] {
        &self.accesses
    }

    /// Whether this job could not run concurrently with `other`.
    pub fn conflicts_with(&self, other: &Job) -> bool {
        self.accesses
            .iter()
            .any(|a| other.accesses.iter().any(|b| a.conflicts_with(b)))
    }
}

/// Builder collecting a job's access declarations.
pub struct JobBuilder {
    accesses: Vec<ComponentAccess>,
}

impl JobBuilder {
    /// Declare tag-only access to `T`.
    pub fn tag<T: Component>(mut self) -> Self {
        self.accesses.push(ComponentAccess::tag::<T>());
        self
    }

    /// Declare read access to `T`.
    pub fn read<T: Component>(mut self) -> Self {
        self.accesses.push(ComponentAccess::read::<T>());
        self
    }

    /// Declare read/write access to `T`.
    pub fn write<T: Component>(mut self) -> Self {
        self.accesses.push(ComponentAccess::write::<T>());
        self
    }

    /// Attach the closure and finish the job.
    pub fn run(self, f: impl FnOnce(&mut JobWorld<'_, '_>) + Send + Sync + 'static) -> Job {
        Job {
            accesses: self.accesses,
            run: Box::new(f),
        }
    }
}

/// Queue of jobs awaiting the next phase boundary.
///
/// Execution is serialized per drain, which trivially satisfies the
/// "no conflicting accesses run concurrently" guarantee; the declarations
/// are what a parallel scheduler would partition on, and
/// [`JobQueue::conflict_count`] exposes that partitioning for diagnostics.
#[derive(Resource, Default)]
pub struct JobQueue {
    pending: Vec<Job>,
}

impl JobQueue {
    /// Schedule a job to run before the next phase boundary.
    pub fn schedule_asap(&mut self, job: Job) {
        tracing::trace!(accesses = job.accesses.len(), "job scheduled");
        self.pending.push(job);
    }

    /// Number of queued jobs.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Count of queued job pairs that must not run concurrently.
    pub fn conflict_count(&self) -> usize {
        let mut count = 0;
        for (i, a) in self.pending.iter().enumerate() {
            for b in &self.pending[i + 1..] {
                if a.conflicts_with(b) {
                    count += 1;
                }
            }
        }
        count
    }

    fn take(&mut self) -> Vec<Job> {
        std::mem::take(&mut self.pending)
    }
}

/// Drain and run all queued jobs, including jobs scheduled by jobs.
pub fn drain_jobs(world: &mut World) {
    loop {
        let batch = world.resource_mut::<JobQueue>().take();
        if batch.is_empty() {
            break;
        }
        for job in batch {
            let mut view = JobWorld {
                world,
                accesses: &job.accesses,
            };
            (job.run)(&mut view);
        }
    }
}
