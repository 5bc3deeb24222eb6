//! The crate's error taxonomy.
//!
//! Everything here represents a programmer error in the calling code. None of
//! these conditions are recoverable at runtime; callers are expected to
//! propagate them with `?` and fail the frame.

use thiserror::Error;

use crate::command::Placeholder;
use crate::entity::Entity;

/// Errors raised by entity store operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EntityError {
    /// The entity was destroyed, or its index slot has since been reused by a
    /// newer entity with a higher generation.
    #[error("entity {0:?} is stale or has been destroyed")]
    Stale(Entity),

    /// The entity is live, but its archetype does not contain the requested
    /// component type.
    #[error("entity {entity:?} has no component of type {component}")]
    MissingComponent {
        entity: Entity,
        component: &'static str,
    },
}

/// Errors raised by the job scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `wait` was called from a thread inside the scheduler's own worker
    /// pool. Blocking a worker on another job can deadlock the pool, so this
    /// is rejected outright.
    #[error("waiting on a job handle from inside a job may deadlock the worker pool")]
    WaitInsideJob,

    /// The awaited job panicked while running.
    #[error("a scheduled job panicked while running")]
    JobPanicked,

    /// The worker thread pool could not be constructed.
    #[error("failed to build the worker thread pool")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),
}

/// Errors raised while replaying a command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The buffer has already been replayed. Each buffer is replayed exactly
    /// once; a barrier installs a fresh buffer every update cycle.
    #[error("command buffer has already been consumed")]
    Consumed,

    /// A command referenced a placeholder whose instantiate command had not
    /// yet replayed. Placeholders resolve in replay order: commands on the
    /// same lane after the instantiate, or on any later lane, may use them.
    #[error("placeholder {0:?} was referenced before its instantiate command replayed")]
    UnresolvedPlaceholder(Placeholder),

    /// A command failed to apply against the world.
    #[error(transparent)]
    Apply(#[from] EntityError),
}

/// Errors raised by a barrier update.
#[derive(Debug, Error)]
pub enum BarrierError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Command(#[from] CommandError),
}
