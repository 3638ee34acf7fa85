//! Entity handles and allocation.
//!
//! An [`Entity`] pairs a slot *index* with a *generation* counter. The
//! generation is bumped every time a slot is released, so a handle is valid
//! exactly while the allocator's generation for its slot equals the handle's.

use std::collections::VecDeque;
use std::fmt;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A generational entity handle.
///
/// Ordering compares the index first and the generation second, which makes
/// handles usable as `BTreeMap`/`BTreeSet` keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    /// The reserved handle that never refers to a live entity.
    ///
    /// Used as the "no neighbor" sentinel by the hierarchy components.
    pub const NULL: Entity = Entity {
        index: u32::MAX,
        generation: u32::MAX,
    };

    /// Construct a handle from raw parts.
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// The slot index.
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    /// The generation of the slot at the time this handle was issued.
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }

    /// Whether this is [`Entity::NULL`].
    #[inline]
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    /// `None` for [`Entity::NULL`], `Some(self)` otherwise.
    #[inline]
    pub fn non_null(self) -> Option<Entity> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }

    /// Pack into a `u64`: `[generation: u32 | index: u32]`.
    #[inline]
    pub fn to_bits(self) -> u64 {
        (self.generation as u64) << 32 | self.index as u64
    }

    /// Inverse of [`Entity::to_bits`].
    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Entity(null)")
        } else {
            write!(f, "Entity({}v{})", self.index, self.generation)
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "{}v{}", self.index, self.generation)
        }
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Issues and validates [`Entity`] handles.
///
/// Free slots are kept in a FIFO queue so that generations are spread out
/// over time rather than concentrated on a hot slot.
#[derive(Debug)]
pub struct EntityAllocator {
    /// Current generation for each slot.
    generations: Vec<u32>,
    /// Whether the slot is currently alive.
    alive: Vec<bool>,
    /// Recyclable slots (FIFO queue).
    free_indices: VecDeque<u32>,
    alive_count: usize,
    /// Slot indices below this may be issued. Never above `u32::MAX`, which
    /// is reserved for [`Entity::NULL`].
    slot_limit: usize,
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self {
            generations: Vec::new(),
            alive: Vec::new(),
            free_indices: VecDeque::new(),
            alive_count: 0,
            slot_limit: u32::MAX as usize,
        }
    }
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn with_slot_limit(slot_limit: usize) -> Self {
        Self {
            slot_limit,
            ..Self::default()
        }
    }

    /// Allocate a handle, reusing a released slot when one is available.
    ///
    /// # Panics
    ///
    /// Panics if every representable slot index is in use.
    pub fn allocate(&mut self) -> Entity {
        if let Some(index) = self.free_indices.pop_front() {
            // Generation was already bumped on release.
            self.alive[index as usize] = true;
            self.alive_count += 1;
            return Entity::new(index, self.generations[index as usize]);
        }

        let index = self.generations.len();
        assert!(index < self.slot_limit, "entity slot space exhausted");
        self.generations.push(0);
        self.alive.push(true);
        self.alive_count += 1;
        Entity::new(index as u32, 0)
    }

    /// Release a handle, invalidating it and every copy of it.
    ///
    /// Returns `false` if the handle was already stale.
    pub fn deallocate(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let idx = entity.index() as usize;
        self.alive[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_indices.push_back(entity.index());
        self.alive_count -= 1;
        true
    }

    /// Whether `entity` refers to a live slot with a matching generation.
    pub fn is_alive(&self, entity: Entity) -> bool {
        let idx = entity.index() as usize;
        idx < self.generations.len()
            && self.alive[idx]
            && self.generations[idx] == entity.generation()
    }

    /// Number of live entities.
    pub fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Iterate live handles in slot order.
    pub fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive
            .iter()
            .zip(&self.generations)
            .enumerate()
            .filter(|(_, (alive, _))| **alive)
            .map(|(index, (_, generation))| Entity::new(index as u32, *generation))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
