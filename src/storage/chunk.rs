//! Fixed-capacity component storage.
//!
//! A chunk holds the component arrays for up to `capacity` entities of one
//! archetype, laid out contiguously per component type. Chunks never mix
//! layouts. Column access goes through runtime-checked borrows so chunks can
//! be shared with jobs on worker threads; structural mutation (push and
//! remove) is reserved to the world on the main thread.

use smallvec::SmallVec;

use super::archetype::EntityLayout;
use super::{AnyColumn, Column, Component, ComponentTypeId};
use crate::borrow::{AtomicRefCell, Ref, RefMut};
use crate::entity::Entity;

pub struct Chunk {
    capacity: usize,
    entities: AtomicRefCell<Vec<Entity>>,
    columns: SmallVec<[(ComponentTypeId, Box<dyn AnyColumn>); 5]>,
}

impl Chunk {
    pub(crate) fn new(layout: &EntityLayout) -> Self {
        let capacity = layout.entities_per_chunk();
        Chunk {
            capacity,
            entities: AtomicRefCell::new(Vec::with_capacity(capacity)),
            columns: layout
                .constructors()
                .map(|(type_id, construct)| (type_id, construct(capacity)))
                .collect(),
        }
    }

    /// The maximum number of entities the chunk can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of entities currently stored in the chunk.
    pub fn len(&self) -> usize {
        self.entities.get().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// The ids of the entities stored in the chunk, in slot order.
    pub fn entities(&self) -> Ref<'_, [Entity]> {
        self.entities.get().map(|entities| entities.as_slice())
    }

    /// The entity stored at `slot`.
    pub fn entity(&self, slot: usize) -> Option<Entity> {
        self.entities.get().get(slot).copied()
    }

    /// A shared view of the chunk's `T` column, or `None` if the chunk's
    /// archetype has no such component.
    ///
    /// # Panics
    ///
    /// Panics if the column is exclusively borrowed. A conflicting borrow
    /// means two jobs overlapping in write access were scheduled without a
    /// dependency edge between them.
    pub fn components<T: Component>(&self) -> Option<Ref<'_, [T]>> {
        self.typed_column::<T>().map(|column| column.slice())
    }

    /// An exclusive view of the chunk's `T` column, or `None` if the chunk's
    /// archetype has no such component.
    ///
    /// # Panics
    ///
    /// Panics if the column is borrowed in any way; see [`Chunk::components`].
    pub fn components_mut<T: Component>(&self) -> Option<RefMut<'_, [T]>> {
        self.typed_column::<T>().map(|column| column.slice_mut())
    }

    fn typed_column<T: Component>(&self) -> Option<&Column<T>> {
        let type_id = ComponentTypeId::of::<T>();
        self.columns
            .iter()
            .find(|(id, _)| *id == type_id)
            .and_then(|(_, column)| column.downcast_ref::<Column<T>>())
    }

    pub(crate) fn column(&self, type_id: ComponentTypeId) -> Option<&dyn AnyColumn> {
        self.columns
            .iter()
            .find(|(id, _)| *id == type_id)
            .map(|(_, column)| column.as_ref())
    }

    pub(crate) fn columns(
        &self,
    ) -> impl Iterator<Item = (ComponentTypeId, &dyn AnyColumn)> + '_ {
        self.columns.iter().map(|(id, column)| (*id, column.as_ref()))
    }

    /// Appends a component value to its column. The caller must push one
    /// value for every column before pushing the entity id, keeping all
    /// columns aligned with the entity list.
    pub(crate) fn push_component<T: Component>(&self, value: T) {
        self.typed_column::<T>()
            .expect("component type missing from chunk layout")
            .push(value);
    }

    /// Appends an entity id, committing the row. Returns the new row's slot.
    pub(crate) fn push_entity(&self, entity: Entity) -> usize {
        let mut entities = self.entities.get_mut();
        entities.push(entity);
        debug_assert!(
            self.columns.iter().all(|(_, c)| c.len() == entities.len()),
            "column lengths diverged from the entity list"
        );
        entities.len() - 1
    }

    /// Removes the row at `slot` across the entity list and every column,
    /// swapping the last row into its place. Returns the entity that was
    /// moved into `slot`, if any, so the caller can fix up its location.
    pub(crate) fn swap_remove(&self, slot: usize) -> Option<Entity> {
        for (_, column) in &self.columns {
            column.swap_remove(slot);
        }
        self.swap_remove_entity(slot)
    }

    /// Removes only the entity id at `slot`, for callers that have already
    /// moved the column values out (archetype migration). Returns the entity
    /// moved into `slot`, if any.
    pub(crate) fn swap_remove_entity(&self, slot: usize) -> Option<Entity> {
        let mut entities = self.entities.get_mut();
        entities.swap_remove(slot);
        entities.get(slot).copied()
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field(
                "components",
                &self
                    .columns
                    .iter()
                    .map(|(id, _)| id.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
