//! Deferred-removal decorator for storages.
//!
//! [`Buffered`] wraps a [`Storage`] and turns its removal entry point into a
//! queue. Removed keys stay physically present, so positions and key slices
//! borrowed before the removal request stay meaningful, until the owner calls
//! [`Buffered::flush`] at a point of its choosing (typically once per tick).
//!
//! ```text
//! remove([2, 4])          flush()
//!   keys:    [1 2 3 4 5]    keys:    [1 3 5]
//!   pending: [2 4]          pending: []
//! ```
//!
//! Dropping a decorator flushes whatever is still pending. Moving it (or
//! `std::mem::take` when the storage is `Default`) hands the pending list to
//! the new owner together with the storage.

use std::ops::Range;

use hashbrown::HashSet;
use rustc_hash::FxBuildHasher;
use tracing::{debug, trace, warn};

use crate::{
    error::{FlushError, StorageError, StorageResult},
    storage::{Storage, StorageConfig},
};

/// Storage decorator that delays removals until flushed.
///
/// Every operation other than removal is forwarded to the wrapped storage.
/// A key moves `live -> pending -> removed`; there is no way back from
/// pending, so re-inserting a pending key is rejected with
/// [`StorageError::PendingRemoval`] and a second removal request for it is a
/// no-op.
pub struct Buffered<S: Storage> {
    storage: S,
    /// Keys in the order their removal was requested.
    pending: Vec<S::Key>,
    /// Membership of `pending`, for duplicate and insert checks.
    queued: HashSet<S::Key, FxBuildHasher>,
}

impl<S: Storage> Buffered<S> {
    /// Wrap a fresh or already populated storage.
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, &StorageConfig::default())
    }

    /// Wrap `storage`, reserving room in both the storage and the pending
    /// list from the same config.
    pub fn with_config(mut storage: S, config: &StorageConfig) -> Self {
        storage.reserve(config.capacity.saturating_sub(storage.len()));
        Self {
            storage,
            pending: Vec::with_capacity(config.pending_capacity),
            queued: HashSet::with_capacity_and_hasher(config.pending_capacity, FxBuildHasher),
        }
    }

    /// Read-only access to the wrapped storage.
    pub const fn get_ref(&self) -> &S {
        &self.storage
    }

    /// Keys awaiting removal, in request order.
    pub fn pending(&self) -> &[S::Key] {
        &self.pending
    }

    /// Number of keys awaiting removal.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether `key` is queued for removal.
    pub fn is_pending(&self, key: S::Key) -> bool {
        self.queued.contains(&key)
    }

    /// Physically remove every pending key, in request order, then clear the
    /// pending list.
    ///
    /// Returns the number of keys removed. A pending key that no longer
    /// resolves (it was removed behind the decorator's back) does not stop
    /// the flush: it is skipped, and all such keys are reported together in
    /// the [`FlushError`] once every other key has been processed. The
    /// pending list is empty afterwards in both cases.
    pub fn flush(&mut self) -> Result<usize, FlushError<S::Key>> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        let mut removed = 0;
        let mut stale = Vec::new();

        for key in self.pending.drain(..) {
            match self.storage.find(key) {
                Some(position) => {
                    self.storage.remove_at(position..position + 1);
                    removed += 1;
                }
                None => stale.push(key),
            }
        }
        self.queued.clear();

        debug!(removed, stale = stale.len(), "flushed pending removals");

        if stale.is_empty() {
            Ok(removed)
        } else {
            Err(FlushError { removed, stale })
        }
    }
}

impl<S: Storage + Default> Default for Buffered<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: Storage> Storage for Buffered<S> {
    type Key = S::Key;
    type Value = S::Value;

    fn len(&self) -> usize {
        self.storage.len()
    }

    fn find(&self, key: S::Key) -> Option<usize> {
        self.storage.find(key)
    }

    fn get(&self, key: S::Key) -> Option<&S::Value> {
        self.storage.get(key)
    }

    fn get_mut(&mut self, key: S::Key) -> Option<&mut S::Value> {
        self.storage.get_mut(key)
    }

    fn insert(&mut self, key: S::Key, value: S::Value) -> StorageResult<Option<S::Value>, S::Key> {
        if self.is_pending(key) {
            return Err(StorageError::PendingRemoval(key));
        }
        self.storage.insert(key, value)
    }

    /// Only the decorator itself removes physically, from [`Buffered::flush`].
    fn remove_at(&mut self, positions: Range<usize>) {
        let keys = self.storage.keys()[positions].to_vec();
        self.remove(keys);
    }

    /// Queue `keys` for removal without touching the wrapped storage.
    fn remove<I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S::Key>,
    {
        for key in keys {
            if self.queued.insert(key) {
                self.pending.push(key);
            } else {
                trace!(?key, "removal already pending");
            }
        }
    }

    fn keys(&self) -> &[S::Key] {
        self.storage.keys()
    }

    fn reserve(&mut self, additional: usize) {
        self.storage.reserve(additional);
    }
}

impl<S: Storage> Drop for Buffered<S> {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            warn!(%err, "stale keys dropped while flushing on drop");
        }
    }
}

impl<S: Storage + std::fmt::Debug> std::fmt::Debug for Buffered<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffered")
            .field("storage", &self.storage)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

/// A storage whose removals are either applied immediately or buffered.
///
/// Lets a caller pick the removal policy per storage at runtime while keeping
/// one concrete type.
#[derive(Debug)]
pub enum Pool<S: Storage> {
    Immediate(S),
    Deferred(Buffered<S>),
}

impl<S: Storage> Pool<S> {
    /// Pool that removes as soon as asked.
    pub fn immediate(storage: S) -> Self {
        Self::Immediate(storage)
    }

    /// Pool that buffers removals until [`Pool::flush`].
    pub fn deferred(storage: S, config: &StorageConfig) -> Self {
        Self::Deferred(Buffered::with_config(storage, config))
    }

    /// Whether removals are buffered.
    pub const fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    /// Read-only access to the underlying storage.
    pub fn get_ref(&self) -> &S {
        match self {
            Self::Immediate(storage) => storage,
            Self::Deferred(buffered) => buffered.get_ref(),
        }
    }

    /// Whether `key` is queued for removal.
    pub fn is_pending(&self, key: S::Key) -> bool {
        match self {
            Self::Immediate(_) => false,
            Self::Deferred(buffered) => buffered.is_pending(key),
        }
    }

    /// Number of keys awaiting removal.
    pub fn pending_len(&self) -> usize {
        match self {
            Self::Immediate(_) => 0,
            Self::Deferred(buffered) => buffered.pending_len(),
        }
    }

    /// Apply pending removals. Always `Ok(0)` for an immediate pool.
    pub fn flush(&mut self) -> Result<usize, FlushError<S::Key>> {
        match self {
            Self::Immediate(_) => Ok(0),
            Self::Deferred(buffered) => buffered.flush(),
        }
    }
}

impl<S: Storage> Storage for Pool<S> {
    type Key = S::Key;
    type Value = S::Value;

    fn len(&self) -> usize {
        self.get_ref().len()
    }

    fn find(&self, key: S::Key) -> Option<usize> {
        self.get_ref().find(key)
    }

    fn get(&self, key: S::Key) -> Option<&S::Value> {
        self.get_ref().get(key)
    }

    fn get_mut(&mut self, key: S::Key) -> Option<&mut S::Value> {
        match self {
            Self::Immediate(storage) => storage.get_mut(key),
            Self::Deferred(buffered) => buffered.get_mut(key),
        }
    }

    fn insert(&mut self, key: S::Key, value: S::Value) -> StorageResult<Option<S::Value>, S::Key> {
        match self {
            Self::Immediate(storage) => storage.insert(key, value),
            Self::Deferred(buffered) => buffered.insert(key, value),
        }
    }

    fn remove_at(&mut self, positions: Range<usize>) {
        match self {
            Self::Immediate(storage) => storage.remove_at(positions),
            Self::Deferred(buffered) => buffered.remove_at(positions),
        }
    }

    fn remove<I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S::Key>,
    {
        match self {
            Self::Immediate(storage) => storage.remove(keys),
            Self::Deferred(buffered) => buffered.remove(keys),
        }
    }

    fn keys(&self) -> &[S::Key] {
        self.get_ref().keys()
    }

    fn reserve(&mut self, additional: usize) {
        match self {
            Self::Immediate(storage) => storage.reserve(additional),
            Self::Deferred(buffered) => buffered.reserve(additional),
        }
    }
}
