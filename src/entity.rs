//! Entity identity and allocation.
//!
//! An [`Entity`] is an opaque id with no intrinsic data: an index into the
//! allocator's slot table plus a generation counter. Destroyed indices are
//! recycled with an incremented generation, so a handle held across a destroy
//! can be detected as stale instead of silently aliasing the new occupant.

use std::fmt;

use crate::error::EntityError;
use crate::storage::archetype::{ArchetypeIndex, ChunkIndex};

/// An opaque identifier for an entity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    /// The index of the entity's slot in the allocator.
    pub fn index(self) -> u32 {
        self.index
    }

    /// The generation the slot had when this entity was allocated.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    alive: bool,
}

/// Allocates entity ids and validates handles against slot generations.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh entity id, reusing a destroyed index if one is
    /// available.
    pub fn allocate(&mut self) -> Entity {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            Entity {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                alive: true,
            });
            Entity {
                index,
                generation: 0,
            }
        }
    }

    /// Releases an entity id. The slot's generation is bumped so that any
    /// handle still referring to the old occupant fails validation.
    pub fn deallocate(&mut self, entity: Entity) -> Result<(), EntityError> {
        if !self.is_live(entity) {
            return Err(EntityError::Stale(entity));
        }

        let slot = &mut self.slots[entity.index as usize];
        slot.alive = false;
        slot.generation += 1;
        self.free.push(entity.index);
        Ok(())
    }

    /// Returns `true` if the handle refers to the slot's current occupant.
    pub fn is_live(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index as usize)
            .map(|slot| slot.alive && slot.generation == entity.generation)
            .unwrap_or(false)
    }
}

/// The storage location of an entity's component data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    archetype: ArchetypeIndex,
    chunk: ChunkIndex,
    slot: usize,
}

impl EntityLocation {
    pub(crate) fn new(archetype: ArchetypeIndex, chunk: ChunkIndex, slot: usize) -> Self {
        EntityLocation {
            archetype,
            chunk,
            slot,
        }
    }

    /// The entity's archetype.
    pub fn archetype(&self) -> ArchetypeIndex {
        self.archetype
    }

    /// The chunk within the archetype.
    pub fn chunk(&self) -> ChunkIndex {
        self.chunk
    }

    /// The entity's row within the chunk.
    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// A map of entity indices to their storage locations.
#[derive(Debug, Default)]
pub struct LocationMap {
    locations: Vec<Option<EntityLocation>>,
    len: usize,
}

impl LocationMap {
    /// The number of located entities.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, entity: Entity) -> Option<EntityLocation> {
        self.locations
            .get(entity.index as usize)
            .copied()
            .flatten()
    }

    pub fn set(&mut self, entity: Entity, location: EntityLocation) {
        let index = entity.index as usize;
        if index >= self.locations.len() {
            self.locations.resize(index + 1, None);
        }
        if self.locations[index].replace(location).is_none() {
            self.len += 1;
        }
    }

    pub fn remove(&mut self, entity: Entity) -> Option<EntityLocation> {
        let removed = self
            .locations
            .get_mut(entity.index as usize)
            .and_then(Option::take);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }
}
