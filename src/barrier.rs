//! Barriers: the synchronization points where deferred mutation lands.
//!
//! A barrier owns exactly one [`CommandBuffer`] per update cycle. Producer
//! jobs record into the buffer and register their handles with
//! [`Barrier::add_dependency`]; when the barrier updates it waits for every
//! producer, replays the buffer on the calling thread, and installs a fresh
//! buffer for the next cycle.

use std::sync::Arc;

use crate::command::CommandBuffer;
use crate::error::BarrierError;
use crate::schedule::{JobHandle, JobScheduler};
use crate::world::World;

pub struct Barrier {
    buffer: Arc<CommandBuffer>,
    producers: Vec<JobHandle>,
    writers: usize,
}

impl Barrier {
    /// Constructs a barrier whose buffers carry `writers` lanes per cycle.
    /// The lane count bounds how many chunks one producing snapshot may
    /// contain; see [`CommandBuffer::new`].
    pub fn new(writers: usize) -> Self {
        Barrier {
            buffer: Arc::new(CommandBuffer::new(writers)),
            producers: Vec::new(),
            writers,
        }
    }

    /// A shared handle to the cycle's command buffer, for capture by
    /// producer jobs.
    pub fn buffer(&self) -> Arc<CommandBuffer> {
        self.buffer.clone()
    }

    /// Registers a producer job. The barrier will not replay the current
    /// buffer until every registered handle has completed.
    pub fn add_dependency(&mut self, handle: JobHandle) {
        self.producers.push(handle);
    }

    /// Waits for all producers, replays the buffer in submission order on
    /// the calling thread, and begins a fresh recording cycle.
    pub fn update(
        &mut self,
        world: &mut World,
        scheduler: &JobScheduler,
    ) -> Result<(), BarrierError> {
        for handle in self.producers.drain(..) {
            scheduler.wait(&handle)?;
        }

        let buffer = std::mem::replace(
            &mut self.buffer,
            Arc::new(CommandBuffer::new(self.writers)),
        );
        buffer.replay(world)?;
        Ok(())
    }
}

impl std::fmt::Debug for Barrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Barrier")
            .field("producers", &self.producers.len())
            .field("buffer", &self.buffer)
            .finish()
    }
}
