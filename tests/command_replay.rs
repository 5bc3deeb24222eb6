use std::sync::Arc;

use cohort::prelude::*;
use cohort::spawn::{self, LocalToWorld, Spawner, Translation};
use glam::{Mat4, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Pos(f32, f32, f32);
#[derive(Clone, Copy, Debug, PartialEq)]
struct Marker(u32);

#[test]
fn replay_applies_lanes_in_order() {
    let mut world = World::new();
    let entity = world.push((Marker(0),));

    // Writes race in recording time but replay in lane order, so the
    // highest lane's value must win.
    let buffer = CommandBuffer::new(3);
    buffer.writer(2).set_component(entity, Marker(2));
    buffer.writer(0).set_component(entity, Marker(0));
    buffer.writer(1).set_component(entity, Marker(1));

    buffer.replay(&mut world).unwrap();
    assert_eq!(*world.get_component::<Marker>(entity).unwrap(), Marker(2));
}

#[test]
fn replay_preserves_fifo_order_within_a_lane() {
    let mut world = World::new();
    let entity = world.push((Marker(0),));

    let buffer = CommandBuffer::new(1);
    let writer = buffer.writer(0);
    for value in 1..=5 {
        writer.set_component(entity, Marker(value));
    }

    buffer.replay(&mut world).unwrap();
    assert_eq!(*world.get_component::<Marker>(entity).unwrap(), Marker(5));
}

#[test]
fn placeholders_resolve_across_later_lanes() {
    let mut world = World::new();
    let prefab = world.push((Pos(0., 0., 0.),));

    let buffer = CommandBuffer::new(2);
    let spawned = buffer.writer(0).instantiate(prefab);
    buffer.writer(1).set_component(spawned, Pos(7., 7., 7.));

    buffer.replay(&mut world).unwrap();

    assert_eq!(world.len(), 2);
    let mut query = Query::new().read::<Pos>();
    let positions: Vec<Pos> = query
        .iter_chunks(&world)
        .flat_map(|c| c.components::<Pos>().unwrap().to_vec())
        .collect();
    assert!(positions.contains(&Pos(7., 7., 7.)));
}

#[test]
fn destroy_through_placeholder() {
    let mut world = World::new();
    let prefab = world.push((Pos(0., 0., 0.),));

    let buffer = CommandBuffer::new(1);
    let writer = buffer.writer(0);
    let spawned = writer.instantiate(prefab);
    writer.destroy(spawned);

    buffer.replay(&mut world).unwrap();

    // The instantiated entity was created and then destroyed in the same
    // replay; only the prefab remains.
    assert_eq!(world.len(), 1);
    assert!(world.contains(prefab));
}

#[test]
fn consumed_buffer_rejects_replay_and_applies_nothing() {
    let mut world = World::new();
    let entity = world.push((Marker(1),));

    let buffer = CommandBuffer::new(1);
    buffer.writer(0).set_component(entity, Marker(2));
    buffer.replay(&mut world).unwrap();

    assert_eq!(buffer.replay(&mut world), Err(CommandError::Consumed));
    assert_eq!(*world.get_component::<Marker>(entity).unwrap(), Marker(2));
}

#[test]
fn destroying_a_stale_entity_fails_the_replay() {
    let mut world = World::new();
    let entity = world.push((Marker(1),));

    let buffer = CommandBuffer::new(1);
    buffer.writer(0).destroy(entity);
    world.despawn(entity).unwrap();

    assert_eq!(
        buffer.replay(&mut world),
        Err(CommandError::Apply(EntityError::Stale(entity)))
    );
}

#[test]
fn concurrent_recording_from_jobs() {
    let scheduler = JobScheduler::with_threads(4).unwrap();
    let mut world = World::new();
    let prefab = world.push((Pos(0., 0., 0.),));

    let buffer = Arc::new(CommandBuffer::new(8));
    let handles: Vec<_> = (0..8)
        .map(|lane| {
            let buffer = buffer.clone();
            scheduler.schedule(
                move || {
                    let writer = buffer.writer(lane);
                    let spawned = writer.instantiate(prefab);
                    writer.set_component(spawned, Pos(lane as f32, 0., 0.));
                },
                &[],
            )
        })
        .collect();
    for handle in &handles {
        scheduler.wait(handle).unwrap();
    }

    assert_eq!(buffer.len(), 16);
    buffer.replay(&mut world).unwrap();
    assert_eq!(world.len(), 9);
}

#[test]
fn spawner_records_one_instantiate_and_write_per_cell_plus_its_own_destroy() {
    let scheduler = JobScheduler::with_threads(2).unwrap();
    let mut world = World::new();
    let mut barrier = Barrier::new(8);

    let prefab = world.push((Translation {
        value: Vec3::splat(99.0),
    },));
    let spawner = world.push((
        Spawner {
            prefab,
            count_x: 2,
            count_y: 2,
        },
        LocalToWorld {
            value: Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)),
        },
    ));

    let buffer = barrier.buffer();
    let handle = spawn::run_spawners(&world, &scheduler, &mut barrier, &[]);
    scheduler.wait(&handle).unwrap();

    // 4 instantiates, 4 position writes, 1 destroy.
    assert_eq!(buffer.len(), 9);

    barrier.update(&mut world, &scheduler).unwrap();

    assert!(!world.contains(spawner));
    assert!(world.contains(prefab));
    // Prefab plus the 2x2 grid.
    assert_eq!(world.len(), 5);

    let positions: Vec<Vec3> = Query::new()
        .read::<Translation>()
        .iter_chunks(&world)
        .flat_map(|c| c.components::<Translation>().unwrap().to_vec())
        .map(|t| t.value)
        .filter(|v| *v != Vec3::splat(99.0))
        .collect();

    let expected: Vec<Vec3> = (0..2)
        .flat_map(|x| {
            (0..2).map(move |y| {
                Vec3::new(
                    10.0 + x as f32 * spawn::GRID_SPACING,
                    0.0,
                    y as f32 * spawn::GRID_SPACING,
                )
            })
        })
        .collect();
    for position in &expected {
        assert!(
            positions.iter().any(|p| p.abs_diff_eq(*position, 1e-5)),
            "missing grid cell at {position:?}, got {positions:?}"
        );
    }
    assert_eq!(positions.len(), expected.len());
}
