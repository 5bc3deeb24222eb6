//! Grid spawners.
//!
//! A spawner entity carries a prefab reference and a grid size. Each
//! invocation of [`run_spawners`] schedules a job that, for every spawner,
//! records one instantiate plus one position write per grid cell into the
//! barrier's command buffer, then records the destruction of the spawner
//! itself. Nothing is created until the barrier replays: a spawner expands
//! entirely through the deferred-mutation path.

use glam::{Mat4, Vec3};

use crate::barrier::Barrier;
use crate::entity::Entity;
use crate::query::Query;
use crate::schedule::{JobHandle, JobScheduler};
use crate::world::World;

/// World-space position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Translation {
    pub value: Vec3,
}

/// An entity's object-to-world transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalToWorld {
    pub value: Mat4,
}

impl Default for LocalToWorld {
    fn default() -> Self {
        LocalToWorld {
            value: Mat4::IDENTITY,
        }
    }
}

/// Expands into a `count_x` by `count_y` grid of prefab instances, then
/// destroys itself.
#[derive(Clone, Copy, Debug)]
pub struct Spawner {
    pub prefab: Entity,
    pub count_x: u32,
    pub count_y: u32,
}

/// Spacing between spawned grid cells, in local units.
pub const GRID_SPACING: f32 = 1.3;

/// Schedules a job that expands every [`Spawner`] through `barrier`'s
/// command buffer and registers the job as a producer of that barrier.
///
/// For each spawner the job records, in order: one instantiate and one
/// [`Translation`] write per grid cell, then one destroy of the spawner
/// entity.
pub fn run_spawners(
    world: &World,
    scheduler: &JobScheduler,
    barrier: &mut Barrier,
    dependencies: &[JobHandle],
) -> JobHandle {
    let chunks = Query::new()
        .read::<Spawner>()
        .read::<LocalToWorld>()
        .snapshot(world);
    let buffer = barrier.buffer();

    let handle = scheduler.for_each_entity(chunks, dependencies, move |lane, entity, chunk, slot| {
        let Some(spawners) = chunk.components::<Spawner>() else {
            return;
        };
        let Some(transforms) = chunk.components::<LocalToWorld>() else {
            return;
        };
        let spawner = spawners[slot];
        let local_to_world = transforms[slot];

        let writer = buffer.writer(lane);
        for x in 0..spawner.count_x {
            for y in 0..spawner.count_y {
                let instance = writer.instantiate(spawner.prefab);
                let position = local_to_world.value.transform_point3(Vec3::new(
                    x as f32 * GRID_SPACING,
                    0.0,
                    y as f32 * GRID_SPACING,
                ));
                writer.set_component(instance, Translation { value: position });
            }
        }
        writer.destroy(entity);
    });

    barrier.add_dependency(handle.clone());
    handle
}
