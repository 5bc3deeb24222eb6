//! Component storage primitives.
//!
//! Component data lives in type-erased columns inside fixed-capacity chunks.
//! A column is a `Vec<T>` behind an [`AtomicRefCell`], erased behind the
//! [`AnyColumn`] trait so chunks can hold heterogeneous component sets and
//! move rows between archetypes without knowing the concrete types.

pub mod archetype;
pub mod chunk;

use std::any::{type_name, TypeId};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use downcast_rs::{impl_downcast, Downcast};

use crate::borrow::{AtomicRefCell, Ref, RefMut};

/// A plain-old-data component type.
///
/// Components carry no behavior. The `Clone` bound exists so a prefab
/// entity's row can be duplicated when it is instantiated.
pub trait Component: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Component for T {}

/// A runtime identifier for a component type, with the type name captured
/// for diagnostics.
#[derive(Copy, Clone, Debug, Eq)]
pub struct ComponentTypeId {
    type_id: TypeId,
    name: &'static str,
}

impl ComponentTypeId {
    /// Gets the component type id that represents type `T`.
    pub fn of<T: Component>() -> Self {
        ComponentTypeId {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The component's type name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ComponentTypeId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl PartialOrd for ComponentTypeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComponentTypeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.type_id.cmp(&other.type_id)
    }
}

impl Hash for ComponentTypeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A type-erased component column.
pub(crate) trait AnyColumn: Downcast + Send + Sync {
    fn len(&self) -> usize;

    /// Removes the value at `slot`, swapping the last value into its place.
    fn swap_remove(&self, slot: usize);

    /// Moves the value at `slot` into `target`, which must be a column of the
    /// same component type. Used during archetype migration.
    fn transfer(&self, slot: usize, target: &dyn AnyColumn);

    /// Clones the value at `slot` onto the end of `target`, which must be a
    /// column of the same component type. `target` may be this column.
    fn duplicate(&self, slot: usize, target: &dyn AnyColumn);
}

impl_downcast!(AnyColumn);

/// A typed component column: the backing storage for one component type
/// within one chunk.
pub(crate) struct Column<T: Component> {
    items: AtomicRefCell<Vec<T>>,
}

impl<T: Component> Column<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Column {
            items: AtomicRefCell::new(Vec::with_capacity(capacity)),
        }
    }

    pub(crate) fn push(&self, value: T) {
        self.items.get_mut().push(value);
    }

    pub(crate) fn slice(&self) -> Ref<'_, [T]> {
        self.items.get().map(|items| items.as_slice())
    }

    pub(crate) fn slice_mut(&self) -> RefMut<'_, [T]> {
        self.items.get_mut().map(|items| items.as_mut_slice())
    }
}

/// Constructs a boxed, empty column for `T`. Stored as a fn pointer inside
/// [`archetype::EntityLayout`] so layouts can build chunks without generics.
pub(crate) fn new_column<T: Component>(capacity: usize) -> Box<dyn AnyColumn> {
    Box::new(Column::<T>::with_capacity(capacity))
}

impl<T: Component> AnyColumn for Column<T> {
    fn len(&self) -> usize {
        self.items.get().len()
    }

    fn swap_remove(&self, slot: usize) {
        self.items.get_mut().swap_remove(slot);
    }

    fn transfer(&self, slot: usize, target: &dyn AnyColumn) {
        let target = target
            .downcast_ref::<Column<T>>()
            .expect("transfer between columns of different component types");
        let value = self.items.get_mut().swap_remove(slot);
        target.push(value);
    }

    fn duplicate(&self, slot: usize, target: &dyn AnyColumn) {
        let target = target
            .downcast_ref::<Column<T>>()
            .expect("duplicate between columns of different component types");
        // The read borrow is released before pushing so that duplicating a
        // row into its own chunk does not conflict with itself.
        let value = self.items.get()[slot].clone();
        target.push(value);
    }
}
