//! Archetypes are sets of entities which all contain exactly the same set of
//! component types.
//!
//! Entities in the same archetype have their components stored next to each
//! other in fixed-capacity chunks, so systems can walk whole component arrays
//! instead of chasing per-entity pointers. All entity filtering happens at
//! the archetype level; decisions are never made per entity.

use std::ops::{Index, IndexMut};
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::debug;

use super::chunk::Chunk;
use super::{new_column, AnyColumn, Component, ComponentTypeId};
use crate::entity::Entity;

/// The maximum number of bytes one component column may occupy within a
/// chunk. Chunk capacity is derived from this budget and the layout's
/// largest component.
pub(crate) const CHUNK_MAX_BYTES: usize = 16 * 1024;

/// The index of an archetype in a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ArchetypeIndex(pub u32);

impl Index<ArchetypeIndex> for Vec<Archetype> {
    type Output = Archetype;

    fn index(&self, index: ArchetypeIndex) -> &Self::Output {
        &self[index.0 as usize]
    }
}

impl IndexMut<ArchetypeIndex> for Vec<Archetype> {
    fn index_mut(&mut self, index: ArchetypeIndex) -> &mut Self::Output {
        &mut self[index.0 as usize]
    }
}

/// The index of a chunk within an archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ChunkIndex(pub u32);

/// Describes the component types attached to an entity, together with the
/// constructors needed to build storage for them.
#[derive(Clone, Default)]
pub struct EntityLayout {
    components: SmallVec<[ComponentTypeId; 5]>,
    constructors: SmallVec<[fn(usize) -> Box<dyn AnyColumn>; 5]>,
    sizes: SmallVec<[usize; 5]>,
}

impl EntityLayout {
    /// Constructs a new empty entity layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a component type to the layout.
    ///
    /// # Panics
    ///
    /// Panics if the layout already contains the component type; only one
    /// component of a given type may be attached to a single entity.
    pub fn register_component<T: Component>(&mut self) {
        let type_id = ComponentTypeId::of::<T>();
        assert!(
            !self.components.contains(&type_id),
            "only one component of a given type may be attached to a single entity"
        );
        self.components.push(type_id);
        self.constructors.push(new_column::<T>);
        self.sizes.push(std::mem::size_of::<T>());
    }

    /// Returns a copy of this layout without the given component type.
    pub(crate) fn without(&self, type_id: ComponentTypeId) -> EntityLayout {
        let mut layout = EntityLayout::new();
        for (i, id) in self.components.iter().enumerate() {
            if *id != type_id {
                layout.components.push(*id);
                layout.constructors.push(self.constructors[i]);
                layout.sizes.push(self.sizes[i]);
            }
        }
        layout
    }

    /// The component types in the layout.
    pub fn component_types(&self) -> &[ComponentTypeId] {
        &self.components
    }

    /// Returns `true` if the layout contains the given component type.
    pub fn has_component<T: Component>(&self) -> bool {
        self.has_component_by_id(ComponentTypeId::of::<T>())
    }

    /// Returns `true` if the layout contains the given component type.
    pub fn has_component_by_id(&self, type_id: ComponentTypeId) -> bool {
        self.components.contains(&type_id)
    }

    /// Returns `true` if the layout holds exactly the given set of component
    /// types, in any order.
    pub fn matches(&self, components: &[ComponentTypeId]) -> bool {
        components.len() == self.components.len()
            && self.components.iter().all(|t| components.contains(t))
    }

    pub(crate) fn constructors(&self) -> impl Iterator<Item = (ComponentTypeId, fn(usize) -> Box<dyn AnyColumn>)> + '_ {
        self.components
            .iter()
            .copied()
            .zip(self.constructors.iter().copied())
    }

    /// The number of entities a single chunk of this layout holds.
    pub fn entities_per_chunk(&self) -> usize {
        let stride = self
            .sizes
            .iter()
            .copied()
            .max()
            .unwrap_or(0)
            .max(std::mem::size_of::<Entity>());
        (CHUNK_MAX_BYTES / stride).max(1)
    }
}

impl std::fmt::Debug for EntityLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.components.iter().map(|c| c.name()))
            .finish()
    }
}

/// A collection of entities which all share one [`EntityLayout`], stored as
/// a list of fixed-capacity chunks.
#[derive(Debug)]
pub struct Archetype {
    index: ArchetypeIndex,
    layout: Arc<EntityLayout>,
    chunks: Vec<Arc<Chunk>>,
}

impl Archetype {
    pub(crate) fn new(index: ArchetypeIndex, layout: EntityLayout) -> Self {
        debug!(archetype = index.0, layout = ?layout, "created archetype");
        Archetype {
            index,
            layout: Arc::new(layout),
            chunks: Vec::new(),
        }
    }

    /// The index of the archetype.
    pub fn index(&self) -> ArchetypeIndex {
        self.index
    }

    /// The layout shared by every entity in the archetype.
    pub fn layout(&self) -> &Arc<EntityLayout> {
        &self.layout
    }

    /// The archetype's chunks.
    pub fn chunks(&self) -> &[Arc<Chunk>] {
        &self.chunks
    }

    /// A chunk by index.
    pub fn chunk(&self, index: ChunkIndex) -> Option<&Arc<Chunk>> {
        self.chunks.get(index.0 as usize)
    }

    /// The number of entities stored in the archetype.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finds a chunk with spare capacity, allocating a new one if every
    /// existing chunk is full.
    pub(crate) fn find_or_create_chunk(&mut self) -> (ChunkIndex, Arc<Chunk>) {
        if let Some(index) = self.chunks.iter().position(|chunk| !chunk.is_full()) {
            return (ChunkIndex(index as u32), self.chunks[index].clone());
        }

        let chunk = Arc::new(Chunk::new(&self.layout));
        let index = ChunkIndex(self.chunks.len() as u32);
        debug!(
            archetype = self.index.0,
            chunk = index.0,
            capacity = chunk.capacity(),
            "created chunk"
        );
        self.chunks.push(chunk.clone());
        (index, chunk)
    }
}
