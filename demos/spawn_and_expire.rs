//! A spawner entity expands into a grid of short-lived spinning cubes,
//! which then expire through the lifetime system. All structural changes
//! flow through the end-of-frame barrier.

use cohort::lifetime::{self, Lifetime};
use cohort::motion::{spin_chunks, Rotation, RotationSpeed};
use cohort::prelude::*;
use cohort::spawn::{self, LocalToWorld, Spawner, Translation};
use glam::Vec3;

fn main() -> Result<(), BarrierError> {
    tracing_subscriber::fmt::init();

    let scheduler = JobScheduler::new()?;
    let mut world = World::new();
    let mut barrier = Barrier::new(64);

    let prefab = world.push((
        Translation { value: Vec3::ZERO },
        Rotation::default(),
        RotationSpeed::from_degrees(180.0),
        Lifetime::from_seconds(2.0),
    ));
    world.push((
        Spawner {
            prefab,
            count_x: 4,
            count_y: 4,
        },
        LocalToWorld::default(),
    ));

    let time = FrameTime::from_seconds(1.0 / 30.0);
    let mut frame = 0u32;
    loop {
        let spawned = spawn::run_spawners(&world, &scheduler, &mut barrier, &[]);
        let rotated = spin_chunks(&world, &scheduler, &time, &[spawned.clone()]);
        lifetime::expire(&world, &scheduler, &mut barrier, &time, &[spawned, rotated]);

        barrier.update(&mut world, &scheduler)?;

        if frame % 10 == 0 {
            println!("frame {frame:3}: {} live entities", world.len());
        }
        frame += 1;

        if world.is_empty() {
            println!("frame {frame:3}: all entities expired");
            break;
        }
    }

    Ok(())
}
