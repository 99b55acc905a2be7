//! World - entity ids plus one pool per registered component type.
//!
//! Each pool is either immediate or deferred ([`Pool`]). Removing a
//! component from a deferred pool, or destroying an entity while the entity
//! pool is deferred, only queues the removal: the data stays readable until
//! the matching flush. This lets a tick iterate a pool and request removals
//! of what it sees without invalidating the iteration.

use std::any::{Any, type_name};

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::{
    buffered::Pool,
    component::{Component, ComponentId, ComponentRegistry},
    entity::{Entity, EntityAllocator},
    error::{FlushError, StorageError, WorldError, WorldResult},
    storage::{SparseSet, Storage, StorageConfig},
};

/// Pool holding every `T` component, keyed by entity.
pub type ComponentPool<T> = Pool<SparseSet<Entity, T>>;

/// Construction options for a [`World`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorldConfig {
    /// Buffer entity destruction until [`World::flush_entities`].
    pub deferred_entities: bool,
    /// Applied to the entity pool and to every component pool.
    pub storage: StorageConfig,
}

/// Type-erased view of a component pool, for the operations the world runs
/// over all pools at once.
trait ErasedPool: Any {
    fn has(&self, entity: Entity) -> bool;
    fn request_remove(&mut self, entity: Entity);
    fn flush_pending(&mut self) -> Result<usize, FlushError<Entity>>;
    fn pending_count(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedPool for ComponentPool<T> {
    fn has(&self, entity: Entity) -> bool {
        self.contains(entity)
    }

    fn request_remove(&mut self, entity: Entity) {
        self.remove([entity]);
    }

    fn flush_pending(&mut self) -> Result<usize, FlushError<Entity>> {
        self.flush()
    }

    fn pending_count(&self) -> usize {
        self.pending_len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A set of components inserted together by [`World::spawn_with`].
///
/// Implemented for tuples of up to eight components.
pub trait Bundle {
    fn insert_into(self, world: &mut World, entity: Entity) -> WorldResult<()>;
}

macro_rules! impl_bundle {
    ($($name:ident),+) => {
        impl<$($name: Component),+> Bundle for ($($name,)+) {
            #[allow(non_snake_case)]
            fn insert_into(self, world: &mut World, entity: Entity) -> WorldResult<()> {
                let ($($name,)+) = self;
                $(world.insert(entity, $name)?;)+
                Ok(())
            }
        }
    };
}

impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);

/// Container for entities and their components.
pub struct World {
    ids: EntityAllocator,
    /// Physically present entities, including destroyed ones still pending.
    entities: Pool<SparseSet<Entity>>,
    components: ComponentRegistry,
    /// Indexed by `ComponentId`.
    pools: Vec<Box<dyn ErasedPool>>,
    config: WorldConfig,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Empty world with immediate entity destruction.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Empty world built from `config`.
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        let set = SparseSet::with_config(&config.storage);
        let entities = if config.deferred_entities {
            Pool::deferred(set, &config.storage)
        } else {
            Pool::immediate(set)
        };

        Self {
            ids: EntityAllocator::with_capacity(config.storage.capacity),
            entities,
            components: ComponentRegistry::new(),
            pools: Vec::new(),
            config,
        }
    }

    /// Options the world was built with.
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    // ==================== Registration ====================

    /// Register `T` with the pool kind its [`Component::DEFERRED`] selects.
    pub fn register<T: Component>(&mut self) -> ComponentId {
        self.register_with::<T>(T::DEFERRED)
    }

    /// Register `T` with a pool that removes immediately.
    pub fn register_immediate<T: Component>(&mut self) -> ComponentId {
        self.register_with::<T>(false)
    }

    /// Register `T` with a pool that buffers removals until flushed.
    pub fn register_deferred<T: Component>(&mut self) -> ComponentId {
        self.register_with::<T>(true)
    }

    fn register_with<T: Component>(&mut self, deferred: bool) -> ComponentId {
        let id = self.components.register::<T>(deferred);
        if id.index() < self.pools.len() {
            return id;
        }

        let set = SparseSet::<Entity, T>::with_config(&self.config.storage);
        let pool: ComponentPool<T> = if deferred {
            Pool::deferred(set, &self.config.storage)
        } else {
            Pool::immediate(set)
        };
        self.pools.push(Box::new(pool));

        debug!(component = type_name::<T>(), ?id, deferred, "registered component");
        id
    }

    /// Whether `T` has a pool.
    #[must_use]
    pub fn is_registered<T: Component>(&self) -> bool {
        self.components.get_id::<T>().is_some()
    }

    /// Registered component types.
    #[must_use]
    pub const fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    // ==================== Entity Operations ====================

    /// Create a new entity without components.
    pub fn spawn(&mut self) -> Entity {
        let entity = self.ids.allocate();
        if let Err(StorageError::PendingRemoval(_)) = self.entities.insert(entity, ()) {
            // The slot's generation wrapped onto a handle whose destruction is
            // still queued. Settle the queue so the handle can be stored again.
            debug!(%entity, "spawned handle is pending destruction; flushing entities");
            if let Err(err) = self.entities.flush() {
                warn!(%err, "stale entities dropped while flushing for spawn");
            }
            if let Err(err) = self.entities.insert(entity, ()) {
                warn!(%err, "entity could not be stored after flushing");
            }
        }
        entity
    }

    /// Create an entity and insert every component of `bundle`.
    ///
    /// If any component is rejected the entity is destroyed again and the
    /// error returned.
    pub fn spawn_with<B: Bundle>(&mut self, bundle: B) -> WorldResult<Entity> {
        let entity = self.spawn();
        if let Err(err) = bundle.insert_into(self, entity) {
            self.destroy(entity);
            return Err(err);
        }
        Ok(entity)
    }

    /// Destroy an entity and remove all of its components.
    ///
    /// The handle is invalid as soon as this returns. Components held in
    /// deferred pools, and the entity itself when the entity pool is
    /// deferred, stay physically present until flushed.
    ///
    /// Returns `false` if the entity was not alive.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if !self.ids.is_alive(entity) {
            return false;
        }

        for pool in &mut self.pools {
            if pool.has(entity) {
                pool.request_remove(entity);
            }
        }
        self.entities.remove([entity]);
        self.ids.deallocate(entity);

        trace!(%entity, "destroyed entity");
        true
    }

    /// Destroy every entity in `entities`, returning how many were alive.
    pub fn destroy_all<I>(&mut self, entities: I) -> usize
    where
        I: IntoIterator<Item = Entity>,
    {
        entities
            .into_iter()
            .filter(|&entity| self.destroy(entity))
            .count()
    }

    /// Whether the handle is still valid (spawned and not destroyed).
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.ids.is_alive(entity)
    }

    /// Number of physically stored entities, including destroyed entities
    /// whose removal is still pending.
    #[must_use]
    pub fn alive(&self) -> usize {
        self.entities.len()
    }

    /// Physically stored entities, in storage order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        self.entities.keys()
    }

    // ==================== Component Operations ====================

    /// Insert or replace a component, returning the previous value.
    pub fn insert<T: Component>(&mut self, entity: Entity, component: T) -> WorldResult<Option<T>> {
        if !self.ids.is_alive(entity) {
            return Err(WorldError::DeadEntity(entity));
        }
        let pool = self.pool_mut::<T>()?;
        Ok(pool.insert(entity, component)?)
    }

    /// Component `T` of `entity`, including one pending removal.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.pool::<T>()?.get(entity)
    }

    /// Mutable access to component `T` of `entity`.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.pool_mut::<T>().ok()?.get_mut(entity)
    }

    /// Whether `T` is physically stored for `entity`, pending or not.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.pool::<T>().is_some_and(|pool| pool.contains(entity))
    }

    /// Remove `T` from every entity in `entities` that has it.
    pub fn remove<T, I>(&mut self, entities: I) -> WorldResult<()>
    where
        T: Component,
        I: IntoIterator<Item = Entity>,
    {
        let pool = self.pool_mut::<T>()?;
        let present: SmallVec<[Entity; 8]> = entities
            .into_iter()
            .filter(|&entity| pool.contains(entity))
            .collect();
        pool.remove(present);
        Ok(())
    }

    /// Remove `T` from a single entity.
    pub fn erase<T: Component>(&mut self, entity: Entity) -> WorldResult<()> {
        self.remove::<T, _>([entity])
    }

    /// Iterate `(entity, component)` pairs of `T` in storage order.
    ///
    /// Empty if `T` is not registered.
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.pool::<T>()
            .into_iter()
            .flat_map(|pool| pool.get_ref().iter())
    }

    /// The pool backing `T`, if registered.
    #[must_use]
    pub fn pool<T: Component>(&self) -> Option<&ComponentPool<T>> {
        let id = self.components.get_id::<T>()?;
        self.pools.get(id.index())?.as_any().downcast_ref()
    }

    fn pool_mut<T: Component>(&mut self) -> WorldResult<&mut ComponentPool<T>> {
        let unregistered = || WorldError::UnregisteredComponent {
            name: type_name::<T>(),
        };
        let id = self.components.get_id::<T>().ok_or_else(unregistered)?;
        self.pools
            .get_mut(id.index())
            .and_then(|pool| pool.as_any_mut().downcast_mut())
            .ok_or_else(unregistered)
    }

    // ==================== Flushing ====================

    /// Apply pending removals of `T`. Returns the number removed.
    pub fn flush<T: Component>(&mut self) -> WorldResult<usize> {
        Ok(self.pool_mut::<T>()?.flush()?)
    }

    /// Apply pending entity destructions. Returns the number removed.
    pub fn flush_entities(&mut self) -> WorldResult<usize> {
        Ok(self.entities.flush()?)
    }

    /// Flush every component pool, then the entity pool.
    ///
    /// All pools are flushed even if some report stale entities; the stale
    /// entities of every pool are returned together.
    pub fn flush_all(&mut self) -> WorldResult<usize> {
        let mut outcome = FlushError {
            removed: 0,
            stale: Vec::new(),
        };

        for pool in &mut self.pools {
            absorb(&mut outcome, pool.flush_pending());
        }
        absorb(&mut outcome, self.entities.flush());

        if outcome.stale.is_empty() {
            Ok(outcome.removed)
        } else {
            Err(outcome.into())
        }
    }

    /// Removals queued across the entity pool and every component pool.
    #[must_use]
    pub fn pending_removals(&self) -> usize {
        self.entities.pending_len()
            + self
                .pools
                .iter()
                .map(|pool| pool.pending_count())
                .sum::<usize>()
    }
}

fn absorb(outcome: &mut FlushError<Entity>, result: Result<usize, FlushError<Entity>>) {
    match result {
        Ok(removed) => outcome.removed += removed,
        Err(err) => outcome.merge(err),
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("alive", &self.alive())
            .field("component_types", &self.components.len())
            .field("pending_removals", &self.pending_removals())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Generation;

    #[derive(Debug, Clone, Copy, PartialEq, crate::Component)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq, crate::Component)]
    #[component(deferred)]
    struct Health(u32);

    #[derive(Debug, Clone, Copy, PartialEq, crate::Component)]
    struct Letter(char);

    #[derive(Debug)]
    struct Unregistered;
    impl Component for Unregistered {}

    fn world() -> World {
        let mut world = World::new();
        world.register::<Position>();
        world.register::<Health>();
        world
    }

    #[test]
    fn test_unregistered_component_is_rejected() {
        let mut world = world();
        let entity = world.spawn();

        let err = world.insert(entity, Unregistered).unwrap_err();
        assert!(matches!(err, WorldError::UnregisteredComponent { .. }));
        assert!(world.erase::<Unregistered>(entity).is_err());
        assert!(world.get::<Unregistered>(entity).is_none());
        assert!(!world.is_registered::<Unregistered>());
    }

    #[test]
    fn test_deferred_erase_stays_visible_until_flush() {
        let mut world = world();
        let entity = world.spawn_with((Health(42),)).unwrap();

        world.erase::<Health>(entity).unwrap();
        assert_eq!(world.get::<Health>(entity), Some(&Health(42)));
        assert!(world.pool::<Health>().unwrap().is_pending(entity));

        assert_eq!(world.flush::<Health>().unwrap(), 1);
        assert_eq!(world.get::<Health>(entity), None);
        assert!(world.is_alive(entity));
    }

    #[test]
    fn test_immediate_erase() {
        let mut world = world();
        let entity = world.spawn_with((Position { x: 1.0, y: 2.0 },)).unwrap();

        world.erase::<Position>(entity).unwrap();

        assert!(!world.has::<Position>(entity));
        assert_eq!(world.flush::<Position>().unwrap(), 0);
    }

    #[test]
    fn test_reinsert_pending_component_needs_flush() {
        let mut world = world();
        let entity = world.spawn_with((Health(1),)).unwrap();

        world.erase::<Health>(entity).unwrap();
        let err = world.insert(entity, Health(2)).unwrap_err();
        assert_eq!(err, WorldError::Storage(StorageError::PendingRemoval(entity)));

        world.flush::<Health>().unwrap();
        assert_eq!(world.insert(entity, Health(2)).unwrap(), None);
        assert_eq!(world.get::<Health>(entity), Some(&Health(2)));
    }

    #[test]
    fn test_deferred_entity_destruction() {
        let mut world = World::with_config(WorldConfig {
            deferred_entities: true,
            ..WorldConfig::default()
        });
        world.register::<Letter>();

        for letter in 'a'..='z' {
            world.spawn_with((Letter(letter),)).unwrap();
        }
        let doomed: Vec<Entity> = world.iter::<Letter>().map(|(entity, _)| entity).collect();

        assert_eq!(world.destroy_all(doomed.iter().copied()), 26);
        assert_eq!(world.alive(), 26);
        assert!(doomed.iter().all(|&entity| !world.is_alive(entity)));
        assert_eq!(world.iter::<Letter>().count(), 0);

        assert_eq!(world.flush_entities().unwrap(), 26);
        assert_eq!(world.alive(), 0);
    }

    #[test]
    fn test_destroy_with_deferred_component() {
        let mut world = world();
        let entity = world
            .spawn_with((Position { x: 0.0, y: 0.0 }, Health(3)))
            .unwrap();

        assert!(world.destroy(entity));
        assert!(!world.destroy(entity));
        assert!(!world.has::<Position>(entity));
        assert!(world.has::<Health>(entity));
        assert_eq!(world.alive(), 0);

        assert_eq!(world.flush_all().unwrap(), 1);
        assert!(!world.has::<Health>(entity));
    }

    #[test]
    fn test_dead_entity_rejects_insert() {
        let mut world = world();
        let entity = world.spawn();
        world.destroy(entity);

        assert_eq!(
            world.insert(entity, Position { x: 0.0, y: 0.0 }),
            Err(WorldError::DeadEntity(entity))
        );
    }

    #[test]
    fn test_spawn_with_unregistered_rolls_back() {
        let mut world = world();

        let result = world.spawn_with((Position { x: 0.0, y: 0.0 }, Unregistered));

        assert!(result.is_err());
        assert_eq!(world.alive(), 0);
        assert_eq!(world.iter::<Position>().count(), 0);
    }

    #[test]
    fn test_iteration_survives_removal_requests() {
        let mut world = world();
        let entities: Vec<Entity> = (0..5)
            .map(|hp| world.spawn_with((Health(hp),)).unwrap())
            .collect();

        let even: Vec<Entity> = world
            .iter::<Health>()
            .filter(|(_, health)| health.0 % 2 == 0)
            .map(|(entity, _)| entity)
            .collect();
        world.remove::<Health, _>(even).unwrap();
        assert_eq!(world.iter::<Health>().count(), 5);
        assert_eq!(world.pending_removals(), 3);

        world.flush_all().unwrap();
        let left: Vec<u32> = world.iter::<Health>().map(|(_, health)| health.0).collect();
        assert_eq!(left, vec![1, 3]);
        assert_eq!(world.get::<Health>(entities[1]), Some(&Health(1)));
    }

    #[test]
    fn test_get_mut_updates_in_place() {
        let mut world = world();
        let entity = world.spawn_with((Position { x: 1.0, y: 1.0 },)).unwrap();

        if let Some(position) = world.get_mut::<Position>(entity) {
            position.x = 5.0;
        }

        assert_eq!(world.get::<Position>(entity), Some(&Position { x: 5.0, y: 1.0 }));
    }

    #[test]
    fn test_register_uses_first_pool_kind() {
        let mut world = World::new();

        let first = world.register_immediate::<Health>();
        let second = world.register::<Health>();

        assert_eq!(first, second);
        assert!(!world.pool::<Health>().unwrap().is_deferred());
    }

    #[test]
    fn test_flush_all_aggregates_stale_entities() {
        let mut world = World::with_config(WorldConfig {
            deferred_entities: true,
            ..WorldConfig::default()
        });
        world.register::<Health>();
        world.register_deferred::<Letter>();

        let kept = world.spawn_with((Health(1), Letter('k'))).unwrap();
        let doomed = world.spawn_with((Health(2), Letter('d'))).unwrap();
        let ghost = Entity::new(99, Generation::FIRST);
        let phantom = Entity::new(98, Generation::FIRST);

        world.erase::<Health>(kept).unwrap();
        world.pool_mut::<Health>().unwrap().remove([ghost]);
        world.pool_mut::<Letter>().unwrap().remove([phantom]);
        assert!(world.destroy(doomed));

        let err = world.flush_all().unwrap_err();
        assert_eq!(
            err,
            WorldError::Flush(FlushError {
                removed: 4,
                stale: vec![ghost, phantom],
            })
        );
        assert_eq!(world.pending_removals(), 0);
        assert_eq!(world.alive(), 1);
        assert!(!world.has::<Health>(kept));
        assert!(world.has::<Letter>(kept));
    }

    #[test]
    fn test_spawn_over_pending_handle_flushes_entities() {
        let mut world = World::with_config(WorldConfig {
            deferred_entities: true,
            ..WorldConfig::default()
        });

        let first = world.spawn();
        assert!(world.destroy(first));

        // Stage the handle the recycled slot will get next as pending, as if
        // its generation had wrapped around.
        let reused = Entity::new(first.index(), first.generation().bump());
        world.entities.insert(reused, ()).unwrap();
        world.entities.remove([reused]);

        let entity = world.spawn();

        assert_eq!(entity, reused);
        assert!(world.is_alive(entity));
        assert!(world.entities().contains(&entity));
        assert_eq!(world.pending_removals(), 0);
        assert_eq!(world.alive(), 1);
    }
}
