//! The entity store.
//!
//! A [`World`] owns all component data, grouped into archetypes and laid out
//! in fixed-capacity chunks. Structural mutation (creating and destroying
//! entities, adding and removing components) requires `&mut World` and is
//! therefore main-thread-only by construction; jobs mutate component values
//! in place through chunk views and defer structural changes to a
//! [command buffer](crate::command::CommandBuffer).

use std::any::type_name;
use std::sync::Arc;

use tracing::trace;

use crate::borrow::{Ref, RefMut};
use crate::entity::{Entity, EntityAllocator, EntityLocation, LocationMap};
use crate::error::EntityError;
use crate::storage::archetype::{Archetype, ArchetypeIndex, ChunkIndex, EntityLayout};
use crate::storage::chunk::Chunk;
use crate::storage::{Component, ComponentTypeId};

/// A set of components that can be inserted together as one entity.
///
/// Implemented for tuples of up to five component types. An entity's initial
/// bundle determines its starting archetype.
pub trait ComponentBundle: Send + Sync + 'static {
    /// The layout of an entity built from this bundle.
    fn layout() -> EntityLayout;

    /// Pushes each component onto its column in `chunk`. The world pushes
    /// the entity id afterwards to commit the row.
    fn push_into(self, chunk: &Chunk);
}

impl ComponentBundle for () {
    fn layout() -> EntityLayout {
        EntityLayout::new()
    }

    fn push_into(self, _: &Chunk) {}
}

macro_rules! impl_bundle_tuple {
    ( $( $ty:ident => $id:ident ),+ ) => {
        impl<$( $ty: Component ),+> ComponentBundle for ($( $ty, )+) {
            fn layout() -> EntityLayout {
                let mut layout = EntityLayout::new();
                $( layout.register_component::<$ty>(); )+
                layout
            }

            fn push_into(self, chunk: &Chunk) {
                #![allow(non_snake_case)]
                let ($( $id, )+) = self;
                $( chunk.push_component($id); )+
            }
        }
    };
}

impl_bundle_tuple!(A => a);
impl_bundle_tuple!(A => a, B => b);
impl_bundle_tuple!(A => a, B => b, C => c);
impl_bundle_tuple!(A => a, B => b, C => c, D => d);
impl_bundle_tuple!(A => a, B => b, C => c, D => d, E => e);

/// The entity store: owns entities, their component data and the archetype
/// index.
#[derive(Debug, Default)]
pub struct World {
    allocator: EntityAllocator,
    locations: LocationMap,
    archetypes: Vec<Archetype>,
}

impl World {
    /// Constructs a new empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of live entities.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Returns `true` if the handle refers to a live entity.
    pub fn contains(&self, entity: Entity) -> bool {
        self.allocator.is_live(entity)
    }

    /// The world's archetypes, in creation order. New archetypes are only
    /// ever appended, which is what lets queries cache their matches.
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    /// An archetype by index.
    pub fn archetype(&self, index: ArchetypeIndex) -> Option<&Archetype> {
        self.archetypes.get(index.0 as usize)
    }

    /// Creates a single entity from a component bundle.
    pub fn push<B: ComponentBundle>(&mut self, bundle: B) -> Entity {
        self.extend(Some(bundle))[0]
    }

    /// Creates one entity per bundle, all in the same archetype. Returns the
    /// new ids in insertion order.
    pub fn extend<B, I>(&mut self, bundles: I) -> Vec<Entity>
    where
        B: ComponentBundle,
        I: IntoIterator<Item = B>,
    {
        let archetype = self.find_or_create_archetype(B::layout());
        let mut created = Vec::new();

        for bundle in bundles {
            let (chunk_index, chunk) = self.archetypes[archetype].find_or_create_chunk();
            let entity = self.allocator.allocate();
            bundle.push_into(&chunk);
            let slot = chunk.push_entity(entity);
            self.locations
                .set(entity, EntityLocation::new(archetype, chunk_index, slot));
            created.push(entity);
        }

        trace!(count = created.len(), archetype = archetype.0, "pushed entities");
        created
    }

    /// Destroys an entity, recycling its id with a bumped generation.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), EntityError> {
        let location = self.location(entity)?;
        let chunk = self.chunk_at(location);

        self.locations.remove(entity);
        if let Some(moved) = chunk.swap_remove(location.slot()) {
            self.locations.set(
                moved,
                EntityLocation::new(location.archetype(), location.chunk(), location.slot()),
            );
        }
        self.allocator.deallocate(entity)?;

        trace!(?entity, "despawned entity");
        Ok(())
    }

    /// Random-access fetch of one of an entity's components.
    pub fn get_component<T: Component>(&self, entity: Entity) -> Result<Ref<'_, T>, EntityError> {
        let location = self.location(entity)?;
        let slot = location.slot();
        self.chunk_ref_at(location)
            .components::<T>()
            .map(|slice| slice.map(|s| &s[slot]))
            .ok_or(EntityError::MissingComponent {
                entity,
                component: type_name::<T>(),
            })
    }

    /// Random-access exclusive fetch of one of an entity's components.
    pub fn get_component_mut<T: Component>(
        &self,
        entity: Entity,
    ) -> Result<RefMut<'_, T>, EntityError> {
        let location = self.location(entity)?;
        let slot = location.slot();
        self.chunk_ref_at(location)
            .components_mut::<T>()
            .map(|slice| slice.map(|s| &mut s[slot]))
            .ok_or(EntityError::MissingComponent {
                entity,
                component: type_name::<T>(),
            })
    }

    /// Overwrites an existing component value in place. Fails if the
    /// entity's archetype lacks the component type.
    pub fn set_component<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<(), EntityError> {
        *self.get_component_mut(entity)? = value;
        Ok(())
    }

    /// Adds a component to an entity, migrating it to the extended
    /// archetype. If the entity already has the component, its value is
    /// overwritten in place instead.
    pub fn add_component<T: Component>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> Result<(), EntityError> {
        let location = self.location(entity)?;
        let layout = self.archetypes[location.archetype()].layout().clone();

        if layout.has_component::<T>() {
            return self.set_component(entity, component);
        }

        let mut target_layout = (*layout).clone();
        target_layout.register_component::<T>();
        let target = self.find_or_create_archetype(target_layout);

        let (dst_index, dst_chunk) = self.move_row(location, target);
        dst_chunk.push_component(component);
        self.commit_move(entity, location, target, dst_index, &dst_chunk);
        Ok(())
    }

    /// Removes a component from an entity, migrating it to the reduced
    /// archetype. The removed value is dropped.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<(), EntityError> {
        let location = self.location(entity)?;
        let layout = self.archetypes[location.archetype()].layout().clone();

        if !layout.has_component::<T>() {
            return Err(EntityError::MissingComponent {
                entity,
                component: type_name::<T>(),
            });
        }

        let target_layout = layout.without(ComponentTypeId::of::<T>());
        let target = self.find_or_create_archetype(target_layout);

        let (dst_index, dst_chunk) = self.move_row(location, target);
        self.commit_move(entity, location, target, dst_index, &dst_chunk);
        Ok(())
    }

    /// Creates a new entity with a copy of every component of `prefab`.
    pub fn instantiate(&mut self, prefab: Entity) -> Result<Entity, EntityError> {
        let location = self.location(prefab)?;
        let src_chunk = self.chunk_at(location);
        let (dst_index, dst_chunk) =
            self.archetypes[location.archetype()].find_or_create_chunk();

        for (type_id, column) in src_chunk.columns() {
            let dst = dst_chunk
                .column(type_id)
                .expect("instantiate target chunk shares the prefab's layout");
            column.duplicate(location.slot(), dst);
        }

        let entity = self.allocator.allocate();
        let slot = dst_chunk.push_entity(entity);
        self.locations.set(
            entity,
            EntityLocation::new(location.archetype(), dst_index, slot),
        );

        trace!(?prefab, ?entity, "instantiated entity");
        Ok(entity)
    }

    fn location(&self, entity: Entity) -> Result<EntityLocation, EntityError> {
        if !self.allocator.is_live(entity) {
            return Err(EntityError::Stale(entity));
        }
        self.locations
            .get(entity)
            .ok_or(EntityError::Stale(entity))
    }

    fn chunk_at(&self, location: EntityLocation) -> Arc<Chunk> {
        self.archetypes[location.archetype()]
            .chunk(location.chunk())
            .cloned()
            .expect("entity location refers to a missing chunk")
    }

    fn chunk_ref_at(&self, location: EntityLocation) -> &Chunk {
        self.archetypes[location.archetype()]
            .chunk(location.chunk())
            .expect("entity location refers to a missing chunk")
    }

    fn find_or_create_archetype(&mut self, layout: EntityLayout) -> ArchetypeIndex {
        if let Some(archetype) = self
            .archetypes
            .iter()
            .find(|a| a.layout().matches(layout.component_types()))
        {
            return archetype.index();
        }

        let index = ArchetypeIndex(self.archetypes.len() as u32);
        self.archetypes.push(Archetype::new(index, layout));
        index
    }

    /// Moves the column values of the row at `location` into a chunk of the
    /// `target` archetype. Values for component types absent from the target
    /// layout are dropped. The entity id itself is not moved yet.
    fn move_row(
        &mut self,
        location: EntityLocation,
        target: ArchetypeIndex,
    ) -> (ChunkIndex, Arc<Chunk>) {
        let src_chunk = self.chunk_at(location);
        let (dst_index, dst_chunk) = self.archetypes[target].find_or_create_chunk();

        for (type_id, column) in src_chunk.columns() {
            match dst_chunk.column(type_id) {
                Some(dst) => column.transfer(location.slot(), dst),
                None => column.swap_remove(location.slot()),
            }
        }

        (dst_index, dst_chunk)
    }

    /// Commits an archetype migration: moves the entity id to the target
    /// chunk and fixes up the location of both the migrated entity and the
    /// row swapped into its old slot.
    fn commit_move(
        &mut self,
        entity: Entity,
        location: EntityLocation,
        target: ArchetypeIndex,
        dst_index: ChunkIndex,
        dst_chunk: &Chunk,
    ) {
        let src_chunk = self.chunk_at(location);
        let slot = dst_chunk.push_entity(entity);
        self.locations
            .set(entity, EntityLocation::new(target, dst_index, slot));

        if let Some(moved) = src_chunk.swap_remove_entity(location.slot()) {
            self.locations.set(
                moved,
                EntityLocation::new(location.archetype(), location.chunk(), location.slot()),
            );
        }

        trace!(
            ?entity,
            from = location.archetype().0,
            to = target.0,
            "migrated entity"
        );
    }
}
