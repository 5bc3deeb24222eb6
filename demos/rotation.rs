//! Spins a grid of entities, alternating between the per-entity and the
//! chunk-visitor forms of the rotation system.

use cohort::motion::{spin, spin_chunks, Rotation, RotationSpeed};
use cohort::prelude::*;

fn main() -> Result<(), SchedulerError> {
    tracing_subscriber::fmt::init();

    let scheduler = JobScheduler::new()?;
    let mut world = World::new();

    let entities = world.extend((0..64).map(|i| {
        (
            Rotation::default(),
            RotationSpeed::from_degrees(30.0 + 5.0 * i as f32),
        )
    }));
    let sample = entities[0];

    let time = FrameTime::from_seconds(1.0 / 60.0);
    for frame in 0..120 {
        // Both forms produce identical results; odd frames use the
        // chunk-visitor flavour.
        let handle = if frame % 2 == 0 {
            spin(&world, &scheduler, &time, &[])
        } else {
            spin_chunks(&world, &scheduler, &time, &[])
        };
        scheduler.wait(&handle)?;

        if frame % 30 == 0 {
            let rotation = world
                .get_component::<Rotation>(sample)
                .expect("sample entity is live");
            println!("frame {frame:3}: sample rotation {:?}", rotation.value);
        }
    }

    Ok(())
}
