//! Entity handles with generational indices.
//!
//! An index is recycled once its entity is released, and the generation is
//! bumped so handles to the released entity stop comparing equal to the new one.

use std::fmt;

/// Generation counter for a recycled slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Generation(u32);

impl Generation {
    /// First generation of a fresh slot.
    pub const FIRST: Self = Self(0);

    /// Generation that replaces this one once the slot is released.
    #[must_use]
    pub const fn bump(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Raw counter value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.0)
    }
}

/// Raw slot index of an entity.
pub type EntityIndex = u32;

/// Opaque handle naming one entity in a [`World`](crate::World).
///
/// Two handles are equal only when both the slot index and the generation
/// match, so a handle to a destroyed entity never aliases its successor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    index: EntityIndex,
    generation: Generation,
}

impl Entity {
    /// Build a handle from its parts.
    #[must_use]
    pub const fn new(index: EntityIndex, generation: Generation) -> Self {
        Self { index, generation }
    }

    /// Slot index of the handle.
    #[must_use]
    pub const fn index(self) -> EntityIndex {
        self.index
    }

    /// Generation of the handle.
    #[must_use]
    pub const fn generation(self) -> Generation {
        self.generation
    }

    /// Pack into a single `u64`, generation in the high half.
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.generation.0 as u64) << 32) | (self.index as u64)
    }

    /// Inverse of [`Entity::to_bits`].
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: Generation((bits >> 32) as u32),
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation.0)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation.0)
    }
}

/// Hands out entity handles and recycles released slots.
///
/// The allocator only tracks handle validity. Whether an entity is still
/// physically stored is decided by the entity pool of the owning world, which
/// may defer its removal past the moment the handle is released here.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    /// Current generation of every slot ever handed out.
    generations: Vec<Generation>,
    /// Released slots, reused last-in first-out.
    free: Vec<EntityIndex>,
    alive: u32,
}

impl EntityAllocator {
    /// Allocator with no slots.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            generations: Vec::new(),
            free: Vec::new(),
            alive: 0,
        }
    }

    /// Allocator with room for `capacity` slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            generations: Vec::with_capacity(capacity),
            free: Vec::new(),
            alive: 0,
        }
    }

    /// Hand out a handle, reusing a released slot when one is available.
    pub fn allocate(&mut self) -> Entity {
        self.alive += 1;

        if let Some(index) = self.free.pop() {
            return Entity::new(index, self.generations[index as usize]);
        }

        let index = self.generations.len() as EntityIndex;
        self.generations.push(Generation::FIRST);
        Entity::new(index, Generation::FIRST)
    }

    /// Release a handle. Returns `false` if it was already invalid.
    pub fn deallocate(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }

        let slot = &mut self.generations[entity.index() as usize];
        *slot = slot.bump();
        self.free.push(entity.index());
        self.alive -= 1;
        true
    }

    /// Whether `entity` is the current handle of its slot.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.generations
            .get(entity.index() as usize)
            .is_some_and(|generation| *generation == entity.generation())
    }

    /// Number of handles that are currently valid.
    #[must_use]
    pub const fn alive_count(&self) -> u32 {
        self.alive
    }
}
