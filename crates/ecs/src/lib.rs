#![warn(missing_docs)]
//! ECS schedule helpers wrapping `bevy_ecs` for deterministic staging, plus
//! the permission-declared job queue used by gameplay code that runs outside
//! the system phases (collision callbacks, admin commands).

pub mod job;

use bevy_ecs::schedule::{Schedule, ScheduleLabel, Schedules};
use bevy_ecs::world::World;
use crazycanvas_core::SimTick;

pub use job::{drain_jobs, AccessMode, ComponentAccess, Job, JobBuilder, JobQueue, JobWorld};

/// Label for the fixed-step gameplay schedule. All state mutation that must
/// replicate identically on both peers runs here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ScheduleLabel)]
pub struct FixedSimSchedule;

/// Label for the per-render-frame schedule (cosmetic slaving, countdown UI
/// timers). Never authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ScheduleLabel)]
pub struct FrameSchedule;

/// Build the baseline deterministic schedules.
pub fn build_schedules() -> Schedules {
    let mut schedules = Schedules::default();
    let mut fixed = Schedule::new(FixedSimSchedule);
    fixed.set_apply_final_deferred(true);
    schedules.insert(fixed);
    let mut frame = Schedule::new(FrameSchedule);
    frame.set_apply_final_deferred(true);
    schedules.insert(frame);
    schedules
}

/// Run the fixed schedule for a given tick, then drain the job queue.
///
/// Jobs scheduled "ASAP" from inside systems are guaranteed to have run by
/// the time this returns, i.e. before the next phase boundary, but a system
/// must not assume a job it scheduled has completed before the system itself
/// returns.
pub fn run_fixed_tick(world: &mut World, schedules: &mut Schedules, tick: SimTick) {
    tracing::trace!(tick = tick.0, "running fixed schedule");
    if let Some(schedule) = schedules.get_mut(FixedSimSchedule) {
        schedule.run(world);
    }
    job::drain_jobs(world);
}

/// Run the per-frame schedule, then drain the job queue.
pub fn run_frame(world: &mut World, schedules: &mut Schedules) {
    if let Some(schedule) = schedules.get_mut(FrameSchedule) {
        schedule.run(world);
    }
    job::drain_jobs(world);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::system::{ResMut, Resource};

    #[derive(Resource, Default)]
    struct Counter(u32);

    #[test]
    fn fixed_schedule_runs_added_systems() {
        let mut world = World::default();
        world.insert_resource(Counter::default());
        world.insert_resource(JobQueue::default());
        let mut schedules = build_schedules();

        if let Some(schedule) = schedules.get_mut(FixedSimSchedule) {
            schedule.add_systems(|mut counter: ResMut<Counter>| {
                counter.0 += 1;
            });
        }

        run_fixed_tick(&mut world, &mut schedules, SimTick::ZERO);
        assert_eq!(world.resource::<Counter>().0, 1);
    }

    #[test]
    fn frame_schedule_is_independent_of_fixed() {
        let mut world = World::default();
        world.insert_resource(Counter::default());
        world.insert_resource(JobQueue::default());
        let mut schedules = build_schedules();

        if let Some(schedule) = schedules.get_mut(FrameSchedule) {
            schedule.add_systems(|mut counter: ResMut<Counter>| {
                counter.0 += 10;
            });
        }

        run_fixed_tick(&mut world, &mut schedules, SimTick::ZERO);
        assert_eq!(world.resource::<Counter>().0, 0);
        run_frame(&mut world, &mut schedules);
        assert_eq!(world.resource::<Counter>().0, 10);
    }
}
