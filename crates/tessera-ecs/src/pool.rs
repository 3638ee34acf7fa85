//! Per-type component storage.
//!
//! A [`Pool`] is a sparse set: `sparse[entity.index]` points into the densely
//! packed `dense`/`values` arrays. Attach and detach are O(1); detach swaps the
//! last element into the hole so the arrays stay packed.

use std::any::Any;

use crate::entity::Entity;

const EMPTY: u32 = u32::MAX;

// ---------------------------------------------------------------------------
// ErasedPool -- type-erased interface used by the registry
// ---------------------------------------------------------------------------

/// Operations the registry needs on a pool without knowing its value type.
pub trait ErasedPool: Send {
    /// Drop the entity's value if present. Returns whether one was removed.
    fn remove_entity(&mut self, entity: Entity) -> bool;
    fn contains(&self, entity: Entity) -> bool;
    fn len(&self) -> usize;
    /// Owners in dense order.
    fn entities(&self) -> &[Entity];
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// ---------------------------------------------------------------------------
// Pool<C>
// ---------------------------------------------------------------------------

/// Dense storage for every instance of one component type.
///
/// Holds at most one value per slot index. Inserting for a handle whose index
/// is held by a different generation drops the held value.
#[derive(Debug)]
pub struct Pool<C> {
    sparse: Vec<u32>,
    dense: Vec<Entity>,
    values: Vec<C>,
}

impl<C> Default for Pool<C> {
    fn default() -> Self {
        Self {
            sparse: Vec::new(),
            dense: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl<C> Pool<C> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn slot(&self, entity: Entity) -> Option<usize> {
        let dense_idx = *self.sparse.get(entity.index() as usize)?;
        if dense_idx == EMPTY {
            return None;
        }
        let dense_idx = dense_idx as usize;
        // The slot may belong to an older generation of the same index.
        (self.dense[dense_idx] == entity).then_some(dense_idx)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.slot(entity).is_some()
    }

    fn push(&mut self, entity: Entity, value: C) -> usize {
        let idx = entity.index() as usize;
        if idx >= self.sparse.len() {
            self.sparse.resize(idx + 1, EMPTY);
        }
        let held = self.sparse[idx];
        if held != EMPTY {
            // Another generation of this index still owns the slot. One slot
            // per index, so the newcomer evicts it in place.
            let held = held as usize;
            tracing::trace!(stale = %self.dense[held], %entity, "evicted stale pool entry");
            self.dense[held] = entity;
            self.values[held] = value;
            return held;
        }
        let dense_idx = self.dense.len();
        self.sparse[idx] = dense_idx as u32;
        self.dense.push(entity);
        self.values.push(value);
        dense_idx
    }

    /// Attach `value`, replacing and returning any previous value in place.
    pub fn insert(&mut self, entity: Entity, value: C) -> Option<C> {
        match self.slot(entity) {
            Some(i) => Some(std::mem::replace(&mut self.values[i], value)),
            None => {
                self.push(entity, value);
                None
            }
        }
    }

    /// Like [`Pool::insert`] but hands back the stored value.
    pub fn insert_or_replace(&mut self, entity: Entity, value: C) -> &mut C {
        let i = match self.slot(entity) {
            Some(i) => {
                self.values[i] = value;
                i
            }
            None => self.push(entity, value),
        };
        &mut self.values[i]
    }

    pub fn get_or_insert_with(&mut self, entity: Entity, f: impl FnOnce() -> C) -> &mut C {
        let i = match self.slot(entity) {
            Some(i) => i,
            None => self.push(entity, f()),
        };
        &mut self.values[i]
    }

    /// Detach and return the entity's value.
    pub fn remove(&mut self, entity: Entity) -> Option<C> {
        let dense_idx = self.slot(entity)?;
        self.sparse[entity.index() as usize] = EMPTY;

        let last = self.dense.len() - 1;
        if dense_idx != last {
            let moved = self.dense[last];
            self.sparse[moved.index() as usize] = dense_idx as u32;
        }
        self.dense.swap_remove(dense_idx);
        Some(self.values.swap_remove(dense_idx))
    }

    pub fn get(&self, entity: Entity) -> Option<&C> {
        self.slot(entity).map(|i| &self.values[i])
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut C> {
        self.slot(entity).map(|i| &mut self.values[i])
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Entities owning a value, in dense order.
    pub fn entities(&self) -> &[Entity] {
        &self.dense
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &C)> {
        self.dense.iter().copied().zip(self.values.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut C)> {
        self.dense.iter().copied().zip(self.values.iter_mut())
    }
}

impl<C: Send + 'static> ErasedPool for Pool<C> {
    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_some()
    }

    fn contains(&self, entity: Entity) -> bool {
        Pool::contains(self, entity)
    }

    fn len(&self) -> usize {
        Pool::len(self)
    }

    fn entities(&self) -> &[Entity] {
        &self.dense
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
