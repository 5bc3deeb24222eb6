//! Rotation components and their update systems.
//!
//! Two equivalent systems are provided: [`spin`] transforms one entity at a
//! time, while [`spin_chunks`] visits whole chunks and walks the component
//! arrays directly. They produce identical results; the chunk form trades a
//! little setup for array-at-a-time access.

use glam::{Quat, Vec3};
use itertools::izip;

use crate::query::Query;
use crate::schedule::{JobHandle, JobScheduler};
use crate::time::FrameTime;
use crate::world::World;

/// An orientation, updated every frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rotation {
    pub value: Quat,
}

impl Default for Rotation {
    fn default() -> Self {
        Rotation {
            value: Quat::IDENTITY,
        }
    }
}

/// How fast an entity spins about the world up axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotationSpeed {
    pub radians_per_second: f32,
}

impl RotationSpeed {
    /// A speed from degrees per second, the unit used by authoring data.
    pub fn from_degrees(degrees_per_second: f32) -> Self {
        RotationSpeed {
            radians_per_second: degrees_per_second.to_radians(),
        }
    }
}

fn step(rotation: Quat, speed: &RotationSpeed, delta_seconds: f32) -> Quat {
    rotation.normalize()
        * Quat::from_axis_angle(Vec3::Y, speed.radians_per_second * delta_seconds)
}

/// Schedules a per-entity job advancing every [`Rotation`] by its
/// [`RotationSpeed`] over the frame.
pub fn spin(
    world: &World,
    scheduler: &JobScheduler,
    time: &FrameTime,
    dependencies: &[JobHandle],
) -> JobHandle {
    let chunks = Query::new()
        .write::<Rotation>()
        .read::<RotationSpeed>()
        .snapshot(world);
    let delta_seconds = time.delta_seconds;

    scheduler.for_each_entity(chunks, dependencies, move |_lane, _entity, chunk, slot| {
        let Some(speeds) = chunk.components::<RotationSpeed>() else {
            return;
        };
        let Some(mut rotations) = chunk.components_mut::<Rotation>() else {
            return;
        };
        rotations[slot].value = step(rotations[slot].value, &speeds[slot], delta_seconds);
    })
}

/// Schedules a chunk-visitor job equivalent to [`spin`], reading and writing
/// the chunk's component arrays in place.
pub fn spin_chunks(
    world: &World,
    scheduler: &JobScheduler,
    time: &FrameTime,
    dependencies: &[JobHandle],
) -> JobHandle {
    let chunks = Query::new()
        .write::<Rotation>()
        .read::<RotationSpeed>()
        .snapshot(world);
    let delta_seconds = time.delta_seconds;

    scheduler.for_each_chunk(chunks, dependencies, move |_lane, chunk| {
        let Some(speeds) = chunk.components::<RotationSpeed>() else {
            return;
        };
        let Some(mut rotations) = chunk.components_mut::<Rotation>() else {
            return;
        };
        for (rotation, speed) in izip!(rotations.iter_mut(), speeds.iter()) {
            rotation.value = step(rotation.value, speed, delta_seconds);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_system_forms_agree() {
        let scheduler = JobScheduler::with_threads(2).unwrap();
        let time = FrameTime::from_seconds(0.25);

        let mut per_entity = World::new();
        let mut per_chunk = World::new();
        for world in [&mut per_entity, &mut per_chunk] {
            world.extend((0..32).map(|i| {
                (
                    Rotation::default(),
                    RotationSpeed::from_degrees(45.0 + i as f32),
                )
            }));
        }

        let a = spin(&per_entity, &scheduler, &time, &[]);
        let b = spin_chunks(&per_chunk, &scheduler, &time, &[]);
        scheduler.wait(&a).unwrap();
        scheduler.wait(&b).unwrap();

        let collect = |world: &World| -> Vec<Rotation> {
            Query::new()
                .read::<Rotation>()
                .iter_chunks(world)
                .flat_map(|c| c.components::<Rotation>().unwrap().to_vec())
                .collect()
        };
        let lhs = collect(&per_entity);
        let rhs = collect(&per_chunk);
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn rotation_advances_about_the_up_axis() {
        let scheduler = JobScheduler::with_threads(1).unwrap();
        let mut world = World::new();
        let entity = world.push((
            Rotation::default(),
            RotationSpeed {
                radians_per_second: std::f32::consts::FRAC_PI_2,
            },
        ));

        let time = FrameTime::from_seconds(1.0);
        let handle = spin(&world, &scheduler, &time, &[]);
        scheduler.wait(&handle).unwrap();

        let rotation = world.get_component::<Rotation>(entity).unwrap();
        let expected = Quat::from_axis_angle(Vec3::Y, std::f32::consts::FRAC_PI_2);
        assert!(rotation.value.abs_diff_eq(expected, 1e-5));
    }
}
