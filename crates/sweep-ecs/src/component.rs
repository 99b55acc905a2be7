//! Component types and their registration.
//!
//! Storing a type in a [`World`](crate::World) takes two explicit steps:
//! the type opts in by implementing [`Component`] (by hand or with
//! `#[derive(Component)]`), and the world is told about it with
//! `World::register`. Operations on a type the world has not registered
//! fail with [`WorldError::UnregisteredComponent`](crate::WorldError).

use std::{any::TypeId, fmt};

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;

/// Marker trait for types that can be stored as components.
///
/// `DEFERRED` selects the pool kind `World::register` creates: `true` buffers
/// removals until the pool is flushed.
///
/// ```ignore
/// #[derive(Component)]
/// struct Position { x: f32, y: f32 }
///
/// #[derive(Component)]
/// #[component(deferred)]
/// struct Projectile { ttl: u32 }
/// ```
pub trait Component: 'static {
    const DEFERRED: bool = false;
}

/// Registry-local identifier for a component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u32);

impl ComponentId {
    /// Rebuild an id from [`ComponentId::as_raw`].
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Raw registry index.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

/// What the registry knows about a registered component.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    id: ComponentId,
    name: &'static str,
    type_id: TypeId,
    deferred: bool,
}

impl ComponentInfo {
    /// Id assigned at registration.
    #[must_use]
    pub const fn id(&self) -> ComponentId {
        self.id
    }

    /// Type name, for diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether removals of this component are buffered until a flush.
    #[must_use]
    pub const fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Whether this entry describes `T`.
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

/// Maps component types to ids, in registration order.
#[derive(Default)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentId, FxBuildHasher>,
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` with the given pool kind.
    ///
    /// Registering an already known type returns its existing id and keeps
    /// the pool kind chosen the first time.
    pub fn register<T: Component>(&mut self, deferred: bool) -> ComponentId {
        let type_id = TypeId::of::<T>();
        if let Some(&id) = self.by_type.get(&type_id) {
            return id;
        }

        let id = ComponentId(self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            id,
            name: std::any::type_name::<T>(),
            type_id,
            deferred,
        });
        self.by_type.insert(type_id, id);
        id
    }

    /// Id of `T`, if registered.
    #[must_use]
    pub fn get_id<T: Component>(&self) -> Option<ComponentId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Info for a registered id.
    #[must_use]
    pub fn get_info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Registered types in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.infos.iter()
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("count", &self.len())
            .field("components", &self.infos)
            .finish()
    }
}
