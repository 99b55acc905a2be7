#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::len_without_is_empty)]

//! Sweep ECS - entity registry with deferred-removal storages.
//!
//! # Key Concepts
//!
//! - **Storage**: an indexed container exposing the [`Storage`] capability set
//! - **Buffered**: a decorator that queues removals until [`Buffered::flush`]
//! - **Pool**: a storage that is either immediate or buffered, chosen at runtime
//! - **World**: entity ids plus one pool per registered [`Component`]
//!
//! # Deferred Removal
//!
//! ```ignore
//! #[derive(Component)]
//! #[component(deferred)]
//! struct Health(u32);
//!
//! let mut world = World::new();
//! world.register::<Health>();
//!
//! let player = world.spawn_with((Health(20),))?;
//! world.erase::<Health>(player)?;
//!
//! // Still readable, e.g. by an iteration that is in progress
//! assert!(world.get::<Health>(player).is_some());
//!
//! // Once per tick
//! world.flush_all()?;
//! assert!(world.get::<Health>(player).is_none());
//! ```

// Lets `#[derive(Component)]` name `::sweep_ecs` from inside this crate.
#[allow(unused_extern_crates)]
extern crate self as sweep_ecs;

mod buffered;
mod component;
mod entity;
mod error;
mod storage;
mod world;

pub use buffered::{Buffered, Pool};
pub use component::{Component, ComponentId, ComponentInfo, ComponentRegistry};
pub use entity::{Entity, EntityAllocator, EntityIndex, Generation};
pub use error::{FlushError, StorageError, StorageResult, WorldError, WorldResult};
pub use storage::{DeletionPolicy, Key, SparseSet, Storage, StorageConfig};
pub use sweep_ecs_derive::Component;
pub use world::{Bundle, ComponentPool, World, WorldConfig};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Buffered, Component, Entity, Pool, SparseSet, Storage, World, WorldConfig};
}
