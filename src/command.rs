//! Deferred structural mutation.
//!
//! Jobs may not touch the world's structure; only the main thread may
//! create or destroy entities. Instead, a job records its structural changes
//! into a [`CommandBuffer`] through a [`CommandWriter`], and a
//! [barrier](crate::barrier::Barrier) replays the buffer on the main thread
//! once every producer job has completed.
//!
//! A buffer is partitioned into writer lanes, one per cooperating job, so
//! appends need no shared lock. Replay drains the lanes in order (lane
//! index first, then each lane's FIFO order), which gives every recording a
//! single deterministic total order regardless of how the producer jobs were
//! interleaved at run time.
//!
//! Entities created by a buffer exist only as [`Placeholder`] ids until
//! replay; commands recorded against a placeholder are resolved to the real
//! entity id as the buffer replays.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crossbeam_queue::SegQueue;
use tracing::trace;

use crate::entity::Entity;
use crate::error::{CommandError, EntityError};
use crate::storage::Component;
use crate::world::World;

/// A pending entity id, minted by [`CommandWriter::instantiate`] and valid
/// only within the buffer that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placeholder(pub(crate) u32);

/// The subject of a deferred command: either a live entity or a placeholder
/// created earlier in the same buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Live(Entity),
    Deferred(Placeholder),
}

impl From<Entity> for Target {
    fn from(entity: Entity) -> Self {
        Target::Live(entity)
    }
}

impl From<Placeholder> for Target {
    fn from(placeholder: Placeholder) -> Self {
        Target::Deferred(placeholder)
    }
}

/// A deferred component write, type-erased so commands of different
/// component types share one queue.
trait ComponentWrite: Send {
    fn apply(self: Box<Self>, world: &mut World, target: Entity) -> Result<(), EntityError>;
    fn component_name(&self) -> &'static str;
}

struct SetComponent<C: Component> {
    value: C,
}

impl<C: Component> ComponentWrite for SetComponent<C> {
    fn apply(self: Box<Self>, world: &mut World, target: Entity) -> Result<(), EntityError> {
        world.set_component(target, self.value)
    }

    fn component_name(&self) -> &'static str {
        std::any::type_name::<C>()
    }
}

enum Command {
    Instantiate { prefab: Entity, result: Placeholder },
    Set { target: Target, write: Box<dyn ComponentWrite> },
    Destroy { target: Target },
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Instantiate { prefab, result } => {
                write!(f, "Instantiate({:?} -> {:?})", prefab, result)
            }
            Command::Set { target, write } => {
                write!(f, "Set<{}>({:?})", write.component_name(), target)
            }
            Command::Destroy { target } => write!(f, "Destroy({:?})", target),
        }
    }
}

const RECORDING: u8 = 0;
const REPLAYING: u8 = 1;
const CONSUMED: u8 = 2;

/// An append-only log of deferred structural operations, replayed exactly
/// once at a barrier.
pub struct CommandBuffer {
    lanes: Vec<SegQueue<Command>>,
    next_placeholder: AtomicU32,
    state: AtomicU8,
}

impl CommandBuffer {
    /// Constructs a buffer with `writers` lanes. Lane indices are handed to
    /// producer jobs; chunk-visitor jobs use their snapshot lane index, so a
    /// buffer needs at least as many lanes as the largest snapshot it
    /// serves.
    pub fn new(writers: usize) -> Self {
        CommandBuffer {
            lanes: (0..writers).map(|_| SegQueue::new()).collect(),
            next_placeholder: AtomicU32::new(0),
            state: AtomicU8::new(RECORDING),
        }
    }

    /// The number of writer lanes.
    pub fn writers(&self) -> usize {
        self.lanes.len()
    }

    /// The number of commands recorded so far, across all lanes.
    pub fn len(&self) -> usize {
        self.lanes.iter().map(|lane| lane.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A writer recording onto lane `lane`. Writers for distinct lanes may
    /// be used concurrently from different job threads.
    ///
    /// # Panics
    ///
    /// Panics if `lane` is out of range or if the buffer is no longer
    /// recording.
    pub fn writer(&self, lane: usize) -> CommandWriter<'_> {
        assert!(
            lane < self.lanes.len(),
            "lane {} out of range for a command buffer with {} writers",
            lane,
            self.lanes.len()
        );
        self.assert_recording();
        CommandWriter { buffer: self, lane }
    }

    /// Replays every recorded command against `world`, in lane-then-sequence
    /// order, then marks the buffer consumed.
    ///
    /// Replaying a consumed buffer fails with [`CommandError::Consumed`] and
    /// applies nothing. A failed command stops the replay and still consumes
    /// the buffer: commands are programmer errors, not recoverable state.
    pub fn replay(&self, world: &mut World) -> Result<(), CommandError> {
        if self
            .state
            .compare_exchange(RECORDING, REPLAYING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CommandError::Consumed);
        }

        trace!(commands = self.len(), lanes = self.lanes.len(), "replaying command buffer");

        let result = self.apply_lanes(world);
        self.state.store(CONSUMED, Ordering::Release);
        result
    }

    fn apply_lanes(&self, world: &mut World) -> Result<(), CommandError> {
        let placeholders = self.next_placeholder.load(Ordering::Acquire) as usize;
        let mut resolved: Vec<Option<Entity>> = vec![None; placeholders];

        for lane in &self.lanes {
            while let Some(command) = lane.pop() {
                match command {
                    Command::Instantiate { prefab, result } => {
                        let entity = world.instantiate(prefab)?;
                        resolved[result.0 as usize] = Some(entity);
                    }
                    Command::Set { target, write } => {
                        let entity = resolve(target, &resolved)?;
                        write.apply(world, entity)?;
                    }
                    Command::Destroy { target } => {
                        let entity = resolve(target, &resolved)?;
                        world.despawn(entity)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn assert_recording(&self) {
        assert_eq!(
            self.state.load(Ordering::Acquire),
            RECORDING,
            "command buffer is no longer recording"
        );
    }

    fn record(&self, lane: usize, command: Command) {
        self.assert_recording();
        self.lanes[lane].push(command);
    }
}

impl fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("writers", &self.lanes.len())
            .field("commands", &self.len())
            .finish()
    }
}

fn resolve(target: Target, resolved: &[Option<Entity>]) -> Result<Entity, CommandError> {
    match target {
        Target::Live(entity) => Ok(entity),
        Target::Deferred(placeholder) => resolved
            .get(placeholder.0 as usize)
            .copied()
            .flatten()
            .ok_or(CommandError::UnresolvedPlaceholder(placeholder)),
    }
}

/// Records commands onto one lane of a [`CommandBuffer`].
#[derive(Clone, Copy)]
pub struct CommandWriter<'a> {
    buffer: &'a CommandBuffer,
    lane: usize,
}

impl<'a> CommandWriter<'a> {
    /// Queues the creation of a new entity cloned from `prefab`, returning a
    /// placeholder id that later commands on this buffer may target.
    pub fn instantiate(&self, prefab: Entity) -> Placeholder {
        let placeholder = Placeholder(self.buffer.next_placeholder.fetch_add(1, Ordering::AcqRel));
        self.buffer.record(
            self.lane,
            Command::Instantiate {
                prefab,
                result: placeholder,
            },
        );
        placeholder
    }

    /// Queues an overwrite of a component value on a live entity or a
    /// placeholder.
    pub fn set_component<C: Component>(&self, target: impl Into<Target>, value: C) {
        self.buffer.record(
            self.lane,
            Command::Set {
                target: target.into(),
                write: Box::new(SetComponent { value }),
            },
        );
    }

    /// Queues the destruction of a live entity or a placeholder.
    pub fn destroy(&self, target: impl Into<Target>) {
        self.buffer.record(
            self.lane,
            Command::Destroy {
                target: target.into(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Pos(f32, f32, f32);
    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Vel(f32, f32, f32);

    #[test]
    fn simple_replay() {
        let _ = tracing_subscriber::fmt::try_init();

        let mut world = World::new();
        let prefab = world.push((Pos(1., 2., 3.), Vel(0.1, 0.2, 0.3)));

        let buffer = CommandBuffer::new(1);
        let writer = buffer.writer(0);
        let spawned = writer.instantiate(prefab);
        writer.set_component(spawned, Pos(4., 5., 6.));
        assert_eq!(buffer.len(), 2);

        buffer.replay(&mut world).unwrap();

        assert_eq!(world.len(), 2);
        assert!(buffer.is_empty());
    }

    #[test]
    fn replay_after_consume_is_an_error() {
        let mut world = World::new();
        let entity = world.push((Pos(0., 0., 0.),));

        let buffer = CommandBuffer::new(1);
        buffer.writer(0).destroy(entity);

        buffer.replay(&mut world).unwrap();
        assert_eq!(buffer.replay(&mut world), Err(CommandError::Consumed));
    }

    #[test]
    #[should_panic(expected = "no longer recording")]
    fn recording_after_replay_panics() {
        let mut world = World::new();
        let entity = world.push((Pos(0., 0., 0.),));

        let buffer = CommandBuffer::new(1);
        let _ = buffer.replay(&mut world);
        buffer.writer(0).destroy(entity);
    }

    #[test]
    fn unresolved_placeholder_is_an_error() {
        let mut world = World::new();
        let prefab = world.push((Pos(0., 0., 0.),));

        // Lane 1 references a placeholder whose instantiate lives on lane 2
        // and therefore replays after it.
        let buffer = CommandBuffer::new(3);
        let placeholder = Placeholder(buffer.next_placeholder.fetch_add(1, Ordering::AcqRel));
        buffer
            .writer(1)
            .set_component(Target::Deferred(placeholder), Pos(1., 1., 1.));
        buffer.record(
            2,
            Command::Instantiate {
                prefab,
                result: placeholder,
            },
        );

        assert_eq!(
            buffer.replay(&mut world),
            Err(CommandError::UnresolvedPlaceholder(placeholder))
        );
    }
}
