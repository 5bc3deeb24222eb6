//! Time-limited entities.
//!
//! A [`Lifetime`] holds the entity's remaining seconds. [`expire`] schedules
//! a per-entity job that subtracts the frame's delta time and, once the
//! value crosses below zero, records a destroy command into the barrier's
//! buffer. The entity is not removed until the barrier replays: time-driven
//! state transitions funnel through the deferred-mutation path rather than
//! touching the store from inside a job.

use crate::barrier::Barrier;
use crate::query::Query;
use crate::schedule::{JobHandle, JobScheduler};
use crate::time::FrameTime;
use crate::world::World;

/// Remaining time, in seconds, before the entity is destroyed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lifetime {
    pub remaining: f32,
}

impl Lifetime {
    pub fn from_seconds(remaining: f32) -> Self {
        Lifetime { remaining }
    }
}

/// Schedules a job that counts every [`Lifetime`] down by the frame time
/// and queues expired entities for destruction at `barrier`. The job is
/// registered as a producer of the barrier.
///
/// An entity whose countdown stays below zero keeps queueing destroys until
/// the barrier replays, so barriers feeding this system should update every
/// frame.
pub fn expire(
    world: &World,
    scheduler: &JobScheduler,
    barrier: &mut Barrier,
    time: &FrameTime,
    dependencies: &[JobHandle],
) -> JobHandle {
    let chunks = Query::new().write::<Lifetime>().snapshot(world);
    let buffer = barrier.buffer();
    let delta_seconds = time.delta_seconds;

    let handle = scheduler.for_each_entity(chunks, dependencies, move |lane, entity, chunk, slot| {
        let Some(mut lifetimes) = chunk.components_mut::<Lifetime>() else {
            return;
        };
        let lifetime = &mut lifetimes[slot];
        lifetime.remaining -= delta_seconds;

        if lifetime.remaining < 0.0 {
            buffer.writer(lane).destroy(entity);
        }
    });

    barrier.add_dependency(handle.clone());
    handle
}
