//! Cohort is a minimal archetype ECS: chunked component storage, lazy chunk
//! queries, a dependency-graph job scheduler, and deferred structural
//! mutation through command buffers replayed at barriers.
//!
//! # Getting started
//!
//! ```rust
//! use cohort::prelude::*;
//!
//! // Define our entity data types. Components are plain old data.
//! #[derive(Clone, Copy, Debug, PartialEq)]
//! struct Position {
//!     x: f32,
//!     y: f32,
//! }
//!
//! #[derive(Clone, Copy, Debug, PartialEq)]
//! struct Velocity {
//!     dx: f32,
//!     dy: f32,
//! }
//!
//! // Create a world to store our entities.
//! let mut world = World::new();
//!
//! // Create entities with `Position` and `Velocity` data.
//! world.extend(
//!     (0..999).map(|_| (Position { x: 0.0, y: 0.0 }, Velocity { dx: 0.0, dy: 0.0 })),
//! );
//!
//! // Create a query matching all chunks with `Position` and `Velocity`
//! // and walk their component arrays in place.
//! let mut query = Query::new().write::<Position>().read::<Velocity>();
//! for chunk in query.iter_chunks(&world) {
//!     let mut positions = chunk.components_mut::<Position>().unwrap();
//!     let velocities = chunk.components::<Velocity>().unwrap();
//!     for (pos, vel) in positions.iter_mut().zip(velocities.iter()) {
//!         pos.x += vel.dx;
//!         pos.y += vel.dy;
//!     }
//! }
//! ```
//!
//! # Jobs
//!
//! The same work can run on worker threads. A job is scheduled against a
//! query snapshot and ordered against other jobs with dependency handles:
//!
//! ```rust
//! # use cohort::prelude::*;
//! # #[derive(Clone, Copy, Debug, PartialEq)]
//! # struct Position { x: f32, y: f32 }
//! # #[derive(Clone, Copy, Debug, PartialEq)]
//! # struct Velocity { dx: f32, dy: f32 }
//! # let mut world = World::new();
//! # world.push((Position { x: 0.0, y: 0.0 }, Velocity { dx: 1.0, dy: 0.0 }));
//! let scheduler = JobScheduler::new()?;
//!
//! let chunks = Query::new().write::<Position>().read::<Velocity>().snapshot(&world);
//! let integrate = scheduler.for_each_chunk(chunks, &[], |_lane, chunk| {
//!     let mut positions = chunk.components_mut::<Position>().unwrap();
//!     let velocities = chunk.components::<Velocity>().unwrap();
//!     for (pos, vel) in positions.iter_mut().zip(velocities.iter()) {
//!         pos.x += vel.dx;
//!         pos.y += vel.dy;
//!     }
//! });
//!
//! // Designated synchronization point: block until the job completes.
//! scheduler.wait(&integrate)?;
//! # Ok::<(), cohort::SchedulerError>(())
//! ```
//!
//! # Deferred mutation
//!
//! Jobs never create or destroy entities directly. They record structural
//! changes into a command buffer owned by a [`Barrier`](barrier::Barrier),
//! which waits for its producers and replays the commands on the main
//! thread:
//!
//! ```rust
//! # use cohort::prelude::*;
//! # #[derive(Clone, Copy, Debug, PartialEq)]
//! # struct Position { x: f32, y: f32 }
//! # let mut world = World::new();
//! let scheduler = JobScheduler::new()?;
//! let mut barrier = Barrier::new(64);
//!
//! let prefab = world.push((Position { x: 0.0, y: 0.0 },));
//! let chunks = Query::new().read::<Position>().snapshot(&world);
//!
//! let buffer = barrier.buffer();
//! let spawn = scheduler.for_each_entity(chunks, &[], move |lane, _entity, _chunk, _slot| {
//!     let writer = buffer.writer(lane);
//!     let clone = writer.instantiate(prefab);
//!     writer.set_component(clone, Position { x: 1.0, y: 1.0 });
//! });
//! barrier.add_dependency(spawn);
//!
//! barrier.update(&mut world, &scheduler)?;
//! assert_eq!(world.len(), 2);
//! # Ok::<(), cohort::BarrierError>(())
//! ```

pub mod barrier;
pub mod borrow;
pub mod command;
pub mod entity;
pub mod error;
pub mod lifetime;
pub mod motion;
pub mod query;
pub mod schedule;
pub mod spawn;
pub mod storage;
pub mod time;
pub mod world;

pub use crate::error::{BarrierError, CommandError, EntityError, SchedulerError};

pub mod prelude {
    pub use crate::barrier::Barrier;
    pub use crate::command::{CommandBuffer, CommandWriter, Placeholder, Target};
    pub use crate::entity::Entity;
    pub use crate::error::{BarrierError, CommandError, EntityError, SchedulerError};
    pub use crate::query::Query;
    pub use crate::schedule::{JobHandle, JobScheduler};
    pub use crate::storage::chunk::Chunk;
    pub use crate::storage::Component;
    pub use crate::time::FrameTime;
    pub use crate::world::{ComponentBundle, World};
}
