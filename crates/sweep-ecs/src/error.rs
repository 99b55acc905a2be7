//! Error types for storages, flushes and the world.

use std::fmt;

use thiserror::Error;

use crate::entity::Entity;

/// Errors raised by storage operations that pass through a decorator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError<K: fmt::Debug> {
    /// The key is queued for removal and cannot be written until the next flush.
    #[error("key {0:?} is pending removal; flush before inserting it again")]
    PendingRemoval(K),
}

/// Result type for storage operations.
pub type StorageResult<T, K> = Result<T, StorageError<K>>;

/// Report of a flush that could not resolve every pending key.
///
/// Every pending key is attempted; the ones that were already gone from the
/// wrapped storage are collected in `stale`, in request order.
#[derive(Debug, Error, PartialEq, Eq)]
#[error(
    "flush removed {removed} key(s) but {} pending key(s) were already gone: {stale:?}",
    .stale.len()
)]
pub struct FlushError<K: fmt::Debug> {
    /// Number of keys that were physically removed.
    pub removed: usize,
    /// Pending keys that no longer resolved to a position.
    pub stale: Vec<K>,
}

impl<K: fmt::Debug> FlushError<K> {
    /// Fold another report into this one.
    pub fn merge(&mut self, other: Self) {
        self.removed += other.removed;
        self.stale.extend(other.stale);
    }
}

/// Errors raised by [`World`](crate::World) operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    /// The component type was used before `World::register` was called for it.
    #[error("component `{name}` is not registered with this world")]
    UnregisteredComponent {
        /// Type name of the component.
        name: &'static str,
    },

    /// The entity was never spawned or has already been destroyed.
    #[error("entity {0} is not alive")]
    DeadEntity(Entity),

    /// The entity's component is queued for removal.
    #[error(transparent)]
    Storage(#[from] StorageError<Entity>),

    /// One or more pools found stale entities while flushing.
    #[error(transparent)]
    Flush(#[from] FlushError<Entity>),
}

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
