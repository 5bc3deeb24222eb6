//! Chunk queries.
//!
//! A [`Query`] names the component types a piece of work reads, writes and
//! excludes, and enumerates the chunks whose archetype satisfies that
//! filter. Matching happens at the archetype level and is cached
//! incrementally: archetypes are only ever appended to a world, so a query
//! remembers how many it has seen and evaluates just the new ones.
//!
//! The read/write declarations are advisory. They drive
//! [`Query::conflicts_with`] and let callers plan job dependency edges, but
//! nothing here stops an undeclared access; that mistake surfaces later as
//! a failed column borrow.

use std::sync::Arc;

use bit_set::BitSet;
use smallvec::SmallVec;

use crate::storage::archetype::ArchetypeIndex;
use crate::storage::chunk::Chunk;
use crate::storage::{Component, ComponentTypeId};
use crate::world::World;

/// Provides an efficient means to enumerate the chunks matching a component
/// filter.
#[derive(Debug, Default)]
pub struct Query {
    reads: SmallVec<[ComponentTypeId; 4]>,
    writes: SmallVec<[ComponentTypeId; 4]>,
    excludes: SmallVec<[ComponentTypeId; 4]>,
    matched: Vec<ArchetypeIndex>,
    matched_set: BitSet,
    seen: usize,
}

impl Query {
    /// Constructs a query with an empty filter, matching every archetype.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires read access to `T`.
    pub fn read<T: Component>(mut self) -> Self {
        self.reads.push(ComponentTypeId::of::<T>());
        self
    }

    /// Requires write access to `T`.
    pub fn write<T: Component>(mut self) -> Self {
        self.writes.push(ComponentTypeId::of::<T>());
        self
    }

    /// Excludes archetypes containing `T`.
    pub fn without<T: Component>(mut self) -> Self {
        self.excludes.push(ComponentTypeId::of::<T>());
        self
    }

    /// The component types this query declares read access to.
    pub fn reads(&self) -> &[ComponentTypeId] {
        &self.reads
    }

    /// The component types this query declares write access to.
    pub fn writes(&self) -> &[ComponentTypeId] {
        &self.writes
    }

    /// Iterates the chunks currently matching the filter.
    ///
    /// Enumeration is lazy and restartable; iteration order is stable for
    /// the lifetime of the query against a given world. Chunks added after
    /// the iterator is created are not guaranteed to be visible.
    pub fn iter_chunks<'a>(&'a mut self, world: &'a World) -> impl Iterator<Item = &'a Arc<Chunk>> {
        self.evaluate(world);
        self.matched
            .iter()
            .filter_map(move |index| world.archetype(*index))
            .flat_map(|archetype| archetype.chunks().iter())
            .filter(|chunk| !chunk.is_empty())
    }

    /// Collects shared handles to the chunks currently matching the filter,
    /// for handing to a scheduled job.
    ///
    /// The snapshot pins chunks, not rows: chunks (and archetypes) created
    /// after this call are not visible to the job, while rows inside the
    /// pinned chunks reflect whatever state the job observes at run time.
    pub fn snapshot(&mut self, world: &World) -> Vec<Arc<Chunk>> {
        self.iter_chunks(world).cloned().collect()
    }

    /// Returns `true` if running this query concurrently with `other`,
    /// without a dependency edge between them, could race: the two declare
    /// overlapping access to some component type with at least one side
    /// writing, and they have matched at least one archetype in common.
    ///
    /// Both queries must have been evaluated against the same world (via
    /// [`Query::iter_chunks`] or [`Query::snapshot`]) for the archetype
    /// overlap check to be meaningful.
    pub fn conflicts_with(&self, other: &Query) -> bool {
        let type_conflict = self
            .writes
            .iter()
            .any(|t| other.writes.contains(t) || other.reads.contains(t))
            || other.writes.iter().any(|t| self.reads.contains(t));

        type_conflict && !self.matched_set.is_disjoint(&other.matched_set)
    }

    fn evaluate(&mut self, world: &World) {
        let archetypes = world.archetypes();
        for archetype in &archetypes[self.seen.min(archetypes.len())..] {
            let layout = archetype.layout();
            let matches = self
                .reads
                .iter()
                .chain(self.writes.iter())
                .all(|t| layout.has_component_by_id(*t))
                && !self
                    .excludes
                    .iter()
                    .any(|t| layout.has_component_by_id(*t));

            if matches {
                self.matched.push(archetype.index());
                self.matched_set.insert(archetype.index().0 as usize);
            }
        }
        self.seen = archetypes.len();
    }
}
