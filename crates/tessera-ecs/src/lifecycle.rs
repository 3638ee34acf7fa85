//! Entity lifecycle helpers built on the markers in [`tags`](crate::tags).
//!
//! An entity assembled over several steps carries [`DelayedConstruction`]
//! until the last step calls [`finish_delayed_construction`], which swaps the
//! marker for [`DelayedConstructionJustDone`]. That marker lives until the
//! owner's next [`clear_just_done`] sweep, usually once per tick.

use std::any::TypeId;

use crate::component::Component;
use crate::entity::Entity;
use crate::registry::Registry;
use crate::tags::{DelayedConstruction, DelayedConstructionJustDone};
use crate::EcsError;

/// Mark `entity` as not fully built.
#[track_caller]
pub fn populate_delayed_construction(reg: &mut Registry, entity: Entity) {
    reg.emplace_or_replace(entity, DelayedConstruction);
    reg.remove_if_exists::<DelayedConstructionJustDone>(entity);
}

/// Mark `entity` as built. Returns `false`, changing nothing, if it was not
/// pending construction.
#[track_caller]
pub fn finish_delayed_construction(reg: &mut Registry, entity: Entity) -> bool {
    if reg.remove_if_exists::<DelayedConstruction>(entity).is_none() {
        return false;
    }
    reg.emplace_or_replace(entity, DelayedConstructionJustDone);
    true
}

/// Drop [`DelayedConstructionJustDone`] from every entity. Returns how many
/// carried it.
pub fn clear_just_done(reg: &mut Registry) -> usize {
    let done: Vec<Entity> = reg
        .pool::<DelayedConstructionJustDone>()
        .map(|pool| pool.entities().to_vec())
        .unwrap_or_default();
    for &entity in &done {
        reg.remove::<DelayedConstructionJustDone>(entity);
    }
    if !done.is_empty() {
        tracing::trace!(count = done.len(), "cleared just-constructed markers");
    }
    done.len()
}

// ---------------------------------------------------------------------------
// Component whitelists
// ---------------------------------------------------------------------------

/// The component types an entity is allowed to carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentWhitelist {
    allowed: Vec<TypeId>,
}

impl ComponentWhitelist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow<C: Component>(mut self) -> Self {
        let id = TypeId::of::<C>();
        if !self.allowed.contains(&id) {
            self.allowed.push(id);
        }
        self
    }

    pub fn allows(&self, type_id: TypeId) -> bool {
        self.allowed.contains(&type_id)
    }
}

/// Check that `entity` carries only whitelisted components.
///
/// Walks every pool, so keep it out of hot paths. On failure the error lists
/// the display names of the offending types, sorted.
#[track_caller]
pub fn check_component_whitelist(
    reg: &Registry,
    entity: Entity,
    whitelist: &ComponentWhitelist,
) -> Result<(), EcsError> {
    let mut unexpected = Vec::new();
    reg.visit(entity, |type_id, info| {
        if !whitelist.allows(type_id) {
            tracing::warn!(%entity, component = %info.name, "component not on whitelist");
            unexpected.push(info.name.clone());
        }
    });
    if unexpected.is_empty() {
        return Ok(());
    }
    unexpected.sort();
    Err(EcsError::UnexpectedComponents {
        entity,
        components: unexpected,
    })
}
