//! Filtered entity selections.
//!
//! A [`Selector`] names component types an entity must carry and types it
//! must not carry. It holds no borrow of the registry; results are snapshots,
//! so the registry can be mutated freely while walking them.

use std::any::TypeId;

use crate::component::Component;
use crate::entity::Entity;
use crate::registry::Registry;
use crate::tags::{DelayedConstruction, NeedToDestroyTag, UnusedTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Term {
    type_id: TypeId,
    type_name: &'static str,
}

impl Term {
    fn of<C: Component>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
        }
    }
}

/// Include/exclude filter over component types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    include: Vec<Term>,
    exclude: Vec<Term>,
}

impl Selector {
    /// Matches every live entity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `C`.
    pub fn with<C: Component>(mut self) -> Self {
        let term = Term::of::<C>();
        if !self.include.contains(&term) {
            self.include.push(term);
        }
        self
    }

    /// Reject entities carrying `C`.
    pub fn without<C: Component>(mut self) -> Self {
        let term = Term::of::<C>();
        if !self.exclude.contains(&term) {
            self.exclude.push(term);
        }
        self
    }

    /// Reject entities that are being destroyed, not fully built, or parked
    /// in a reuse cache.
    pub fn exclude_not_constructed(self) -> Self {
        self.without::<NeedToDestroyTag>()
            .without::<DelayedConstruction>()
            .without::<UnusedTag>()
    }

    /// Type names of the required components.
    pub fn included(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.include.iter().map(|t| t.type_name)
    }

    /// Type names of the rejected components.
    pub fn excluded(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.exclude.iter().map(|t| t.type_name)
    }
}

impl Registry {
    fn carries(&self, entity: Entity, type_id: TypeId) -> bool {
        self.erased_pool(type_id)
            .is_some_and(|pool| pool.contains(entity))
    }

    /// Whether live `entity` passes `selector`.
    pub fn matches(&self, entity: Entity, selector: &Selector) -> bool {
        self.valid(entity)
            && selector
                .include
                .iter()
                .all(|t| self.carries(entity, t.type_id))
            && !selector
                .exclude
                .iter()
                .any(|t| self.carries(entity, t.type_id))
    }

    /// Snapshot of every entity passing `selector`.
    ///
    /// Candidates come from the smallest required pool, or from all live
    /// entities when nothing is required. Order is unspecified.
    pub fn select(&self, selector: &Selector) -> Vec<Entity> {
        let mut smallest: Option<&[Entity]> = None;
        for term in &selector.include {
            let Some(pool) = self.erased_pool(term.type_id) else {
                // Nothing owns a required type.
                return Vec::new();
            };
            if smallest.map_or(true, |s| pool.len() < s.len()) {
                smallest = Some(pool.entities());
            }
        }
        match smallest {
            Some(candidates) => candidates
                .iter()
                .copied()
                .filter(|&e| self.matches(e, selector))
                .collect(),
            None => self
                .entities()
                .filter(|&e| self.matches(e, selector))
                .collect(),
        }
    }

    /// Any one entity passing `selector`.
    pub fn find_entity(&self, selector: &Selector) -> Option<Entity> {
        self.select(selector).into_iter().next()
    }
}
