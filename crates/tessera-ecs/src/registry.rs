//! The [`Registry`] owns the entity allocator and one pool per component type.
//! It is the only place entities are created or destroyed and components are
//! attached or detached.
//!
//! Most operations come in two flavours. The `try_*`/`fetch*` methods return
//! [`EcsError`] for contract violations; the short names (`get`, `emplace`,
//! `destroy`, ...) are built on them and panic instead. Passing a stale handle
//! to anything other than [`Registry::create`] or [`Registry::valid`] is a
//! caller bug.

use std::any::TypeId;
use std::collections::HashMap;

use crate::component::{Component, ComponentInfo, ComponentRegistry};
use crate::context::ContextVars;
use crate::entity::{Entity, EntityAllocator};
use crate::pool::{ErasedPool, Pool};
use crate::EcsError;

/// Raise a contract violation.
#[track_caller]
#[cold]
pub(crate) fn violated(err: EcsError) -> ! {
    panic!("{err}")
}

fn missing_component<C: Component>(components: &ComponentRegistry, entity: Entity) -> EcsError {
    EcsError::MissingComponent {
        entity,
        component: components.name_of::<C>().to_owned(),
    }
}

fn downcast<C: Component>(pool: &dyn ErasedPool) -> &Pool<C> {
    match pool.as_any().downcast_ref::<Pool<C>>() {
        Some(pool) => pool,
        None => unreachable!("pool for {} has the wrong type", std::any::type_name::<C>()),
    }
}

fn downcast_mut<C: Component>(pool: &mut dyn ErasedPool) -> &mut Pool<C> {
    match pool.as_any_mut().downcast_mut::<Pool<C>>() {
        Some(pool) => pool,
        None => unreachable!("pool for {} has the wrong type", std::any::type_name::<C>()),
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Entity store.
///
/// Contains no synchronization. It is `Send`, so it can be moved to another
/// thread, but every access must come from one place at a time.
#[derive(Default)]
pub struct Registry {
    entities: EntityAllocator,
    pools: HashMap<TypeId, Box<dyn ErasedPool>>,
    components: ComponentRegistry,
    pub(crate) context: ContextVars,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entities", &self.entities.alive_count())
            .field("pools", &self.pools.len())
            .field("context", &self.context)
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // -- entities -----------------------------------------------------------

    /// Allocate a fresh entity with no components.
    pub fn create(&mut self) -> Entity {
        self.entities.allocate()
    }

    /// Whether `entity` is live. Never panics.
    pub fn valid(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    fn check(&self, entity: Entity) -> Result<(), EcsError> {
        if self.valid(entity) {
            Ok(())
        } else {
            Err(EcsError::StaleEntity { entity })
        }
    }

    #[track_caller]
    fn assert_valid(&self, entity: Entity) {
        if let Err(err) = self.check(entity) {
            violated(err);
        }
    }

    /// Drop every component of `entity` and release its handle.
    ///
    /// Hierarchy components are dropped like any other. Detaching the entity
    /// from its hierarchies first is up to the caller; otherwise neighbours
    /// keep links to a dead handle.
    pub fn try_destroy(&mut self, entity: Entity) -> Result<(), EcsError> {
        self.check(entity)?;
        let mut dropped = 0usize;
        for pool in self.pools.values_mut() {
            if pool.remove_entity(entity) {
                dropped += 1;
            }
        }
        self.entities.deallocate(entity);
        tracing::trace!(%entity, components = dropped, "destroyed entity");
        Ok(())
    }

    #[track_caller]
    pub fn destroy(&mut self, entity: Entity) {
        if let Err(err) = self.try_destroy(entity) {
            violated(err);
        }
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.alive_count()
    }

    /// Live entities in slot order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter_alive()
    }

    /// Whether `entity` carries no components at all.
    #[track_caller]
    pub fn is_orphan(&self, entity: Entity) -> bool {
        self.assert_valid(entity);
        self.pools.values().all(|pool| !pool.contains(entity))
    }

    // -- component metadata -------------------------------------------------

    /// Attach a human-readable name to `C` for logs and panic messages.
    pub fn set_component_name<C: Component>(&mut self, name: &str) {
        self.components.set_name::<C>(name);
    }

    pub fn component_name<C: Component>(&self) -> &str {
        self.components.name_of::<C>()
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    // -- pools --------------------------------------------------------------

    /// The pool for `C`, if any value of `C` was ever attached.
    pub fn pool<C: Component>(&self) -> Option<&Pool<C>> {
        self.pools
            .get(&TypeId::of::<C>())
            .map(|pool| downcast::<C>(pool.as_ref()))
    }

    fn pool_mut<C: Component>(&mut self) -> Option<&mut Pool<C>> {
        self.pools
            .get_mut(&TypeId::of::<C>())
            .map(|pool| downcast_mut::<C>(pool.as_mut()))
    }

    fn assure<C: Component>(&mut self) -> &mut Pool<C> {
        let components = &mut self.components;
        let pool = self.pools.entry(TypeId::of::<C>()).or_insert_with(|| {
            let info = components.ensure::<C>();
            tracing::trace!(component = %info.name, size = info.size, "created pool");
            Box::new(Pool::<C>::new())
        });
        downcast_mut::<C>(pool.as_mut())
    }

    pub(crate) fn erased_pool(&self, type_id: TypeId) -> Option<&dyn ErasedPool> {
        self.pools.get(&type_id).map(|pool| pool.as_ref())
    }

    fn missing<C: Component>(&self, entity: Entity) -> EcsError {
        missing_component::<C>(&self.components, entity)
    }

    // -- attach -------------------------------------------------------------

    /// Attach a component that `entity` must not already have.
    pub fn try_emplace<C: Component>(
        &mut self,
        entity: Entity,
        value: C,
    ) -> Result<&mut C, EcsError> {
        self.check(entity)?;
        if self.has::<C>(entity) {
            return Err(EcsError::DuplicateComponent {
                entity,
                component: self.component_name::<C>().to_owned(),
            });
        }
        Ok(self.assure::<C>().insert_or_replace(entity, value))
    }

    #[track_caller]
    pub fn emplace<C: Component>(&mut self, entity: Entity, value: C) -> &mut C {
        match self.try_emplace(entity, value) {
            Ok(value) => value,
            Err(err) => violated(err),
        }
    }

    /// Attach `value`, overwriting any existing `C`.
    #[track_caller]
    pub fn emplace_or_replace<C: Component>(&mut self, entity: Entity, value: C) -> &mut C {
        self.assert_valid(entity);
        self.assure::<C>().insert_or_replace(entity, value)
    }

    /// The existing `C`, or a new one built by `f`.
    #[track_caller]
    pub fn get_or_emplace_with<C: Component>(
        &mut self,
        entity: Entity,
        f: impl FnOnce() -> C,
    ) -> &mut C {
        self.assert_valid(entity);
        self.assure::<C>().get_or_insert_with(entity, f)
    }

    // -- read ---------------------------------------------------------------

    /// Whether `entity` carries `C`.
    #[track_caller]
    pub fn has<C: Component>(&self, entity: Entity) -> bool {
        self.assert_valid(entity);
        self.pool::<C>().is_some_and(|pool| pool.contains(entity))
    }

    pub fn fetch<C: Component>(&self, entity: Entity) -> Result<&C, EcsError> {
        self.check(entity)?;
        self.pool::<C>()
            .and_then(|pool| pool.get(entity))
            .ok_or_else(|| self.missing::<C>(entity))
    }

    pub fn fetch_mut<C: Component>(&mut self, entity: Entity) -> Result<&mut C, EcsError> {
        self.check(entity)?;
        let components = &self.components;
        self.pools
            .get_mut(&TypeId::of::<C>())
            .and_then(|pool| downcast_mut::<C>(pool.as_mut()).get_mut(entity))
            .ok_or_else(|| missing_component::<C>(components, entity))
    }

    /// The `C` on `entity`, which must be present.
    #[track_caller]
    pub fn get<C: Component>(&self, entity: Entity) -> &C {
        match self.fetch(entity) {
            Ok(value) => value,
            Err(err) => violated(err),
        }
    }

    #[track_caller]
    pub fn get_mut<C: Component>(&mut self, entity: Entity) -> &mut C {
        match self.fetch_mut(entity) {
            Ok(value) => value,
            Err(err) => violated(err),
        }
    }

    /// The `C` on `entity`, if attached. `entity` itself must be live.
    #[track_caller]
    pub fn try_get<C: Component>(&self, entity: Entity) -> Option<&C> {
        self.assert_valid(entity);
        self.pool::<C>().and_then(|pool| pool.get(entity))
    }

    #[track_caller]
    pub fn try_get_mut<C: Component>(&mut self, entity: Entity) -> Option<&mut C> {
        self.assert_valid(entity);
        self.pool_mut::<C>().and_then(|pool| pool.get_mut(entity))
    }

    // -- detach -------------------------------------------------------------

    /// Detach and return a component that must be present.
    pub fn try_remove<C: Component>(&mut self, entity: Entity) -> Result<C, EcsError> {
        self.check(entity)?;
        self.pool_mut::<C>()
            .and_then(|pool| pool.remove(entity))
            .ok_or_else(|| self.missing::<C>(entity))
    }

    #[track_caller]
    pub fn remove<C: Component>(&mut self, entity: Entity) -> C {
        match self.try_remove(entity) {
            Ok(value) => value,
            Err(err) => violated(err),
        }
    }

    /// Detach `C` if attached.
    #[track_caller]
    pub fn remove_if_exists<C: Component>(&mut self, entity: Entity) -> Option<C> {
        self.assert_valid(entity);
        self.pool_mut::<C>().and_then(|pool| pool.remove(entity))
    }

    // -- iteration ----------------------------------------------------------

    /// Every `(entity, &C)` pair, in pool order.
    pub fn view<C: Component>(&self) -> impl Iterator<Item = (Entity, &C)> {
        self.pool::<C>().into_iter().flat_map(|pool| pool.iter())
    }

    pub fn view_mut<C: Component>(&mut self) -> impl Iterator<Item = (Entity, &mut C)> {
        self.pool_mut::<C>()
            .into_iter()
            .flat_map(|pool| pool.iter_mut())
    }

    /// Call `f` once for each component type attached to `entity`, in no
    /// particular order.
    #[track_caller]
    pub fn visit(&self, entity: Entity, mut f: impl FnMut(TypeId, &ComponentInfo)) {
        self.assert_valid(entity);
        for (&type_id, pool) in &self.pools {
            if !pool.contains(entity) {
                continue;
            }
            // Every pool registers its type in `assure`.
            if let Some(info) = self.components.get_info(type_id) {
                f(type_id, info);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Health(u32);

    #[derive(Debug, Clone, PartialEq)]
    struct Label(String);

    #[test]
    fn visit_lists_attached_types() {
        let mut reg = Registry::new();
        reg.set_component_name::<Label>("label");
        let e = reg.create();
        let other = reg.create();
        reg.emplace(e, Health(3));
        reg.emplace(e, Label("x".into()));
        reg.emplace(other, 7u8);

        let mut seen = Vec::new();
        reg.visit(e, |type_id, info| seen.push((type_id, info.name.clone())));
        seen.sort_by(|a, b| a.1.cmp(&b.1));
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, TypeId::of::<Label>());
        assert_eq!(seen[0].1, "label");
        assert_eq!(seen[1].0, TypeId::of::<Health>());

        reg.remove::<Health>(e);
        reg.remove::<Label>(e);
        let mut calls = 0;
        reg.visit(e, |_, _| calls += 1);
        assert_eq!(calls, 0);
    }

    #[test]
    fn create_and_destroy() {
        let mut reg = Registry::new();
        let e = reg.create();
        assert!(reg.valid(e));
        assert_eq!(reg.entity_count(), 1);
        reg.destroy(e);
        assert!(!reg.valid(e));
        assert_eq!(reg.entity_count(), 0);
    }

    #[test]
    fn never_issued_handles_are_invalid() {
        let reg = Registry::new();
        assert!(!reg.valid(Entity::new(0, 0)));
        assert!(!reg.valid(Entity::NULL));
    }

    #[test]
    fn destroy_drops_components_and_recycled_slot_starts_clean() {
        let mut reg = Registry::new();
        let e = reg.create();
        reg.emplace(e, Health(10));
        reg.emplace(e, Label("old".into()));
        reg.destroy(e);

        let f = reg.create();
        assert_eq!(f.index(), e.index());
        assert_ne!(f, e);
        assert!(reg.is_orphan(f));
        assert_eq!(reg.pool::<Health>().map(|p| p.len()), Some(0));
    }

    #[test]
    fn emplace_get_remove() {
        let mut reg = Registry::new();
        let e = reg.create();
        reg.emplace(e, Health(3)).0 += 1;
        assert_eq!(reg.get::<Health>(e), &Health(4));
        reg.get_mut::<Health>(e).0 = 9;
        assert_eq!(reg.try_get::<Health>(e), Some(&Health(9)));
        assert_eq!(reg.remove::<Health>(e), Health(9));
        assert!(!reg.has::<Health>(e));
        assert_eq!(reg.try_get::<Health>(e), None);
        assert_eq!(reg.remove_if_exists::<Health>(e), None);
    }

    #[test]
    fn checked_variants_report_errors() {
        let mut reg = Registry::new();
        let e = reg.create();
        reg.emplace(e, Health(1));

        assert!(matches!(
            reg.try_emplace(e, Health(2)),
            Err(EcsError::DuplicateComponent { .. })
        ));
        assert_eq!(reg.get::<Health>(e), &Health(1));
        assert!(matches!(
            reg.try_remove::<Label>(e),
            Err(EcsError::MissingComponent { .. })
        ));

        reg.destroy(e);
        assert_eq!(reg.try_destroy(e), Err(EcsError::StaleEntity { entity: e }));
        assert_eq!(
            reg.fetch::<Health>(e).unwrap_err(),
            EcsError::StaleEntity { entity: e }
        );
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn get_on_stale_entity_panics() {
        let mut reg = Registry::new();
        let e = reg.create();
        reg.emplace(e, Health(1));
        reg.destroy(e);
        let _ = reg.get::<Health>(e);
    }

    #[test]
    #[should_panic(expected = "already has a 'hp' component")]
    fn double_emplace_panics_with_component_name() {
        let mut reg = Registry::new();
        reg.set_component_name::<Health>("hp");
        let e = reg.create();
        reg.emplace(e, Health(1));
        reg.emplace(e, Health(2));
    }

    #[test]
    #[should_panic(expected = "has no")]
    fn get_missing_component_panics() {
        let mut reg = Registry::new();
        let e = reg.create();
        let _ = reg.get::<Label>(e);
    }

    #[test]
    fn emplace_or_replace_and_get_or_emplace_with() {
        let mut reg = Registry::new();
        let e = reg.create();
        reg.emplace_or_replace(e, Health(1));
        reg.emplace_or_replace(e, Health(2));
        assert_eq!(reg.get::<Health>(e), &Health(2));

        reg.get_or_emplace_with(e, || Health(50)).0 += 1;
        assert_eq!(reg.get::<Health>(e), &Health(3));
        let label = reg.get_or_emplace_with(e, || Label("fresh".into()));
        assert_eq!(label.0, "fresh");
    }

    #[test]
    fn view_visits_every_owner() {
        let mut reg = Registry::new();
        let a = reg.create();
        let b = reg.create();
        let c = reg.create();
        reg.emplace(a, Health(1));
        reg.emplace(c, Health(3));
        let _ = b;

        let mut seen: Vec<_> = reg.view::<Health>().map(|(e, h)| (e, h.0)).collect();
        seen.sort();
        assert_eq!(seen, vec![(a, 1), (c, 3)]);

        for (_, h) in reg.view_mut::<Health>() {
            h.0 *= 10;
        }
        assert_eq!(reg.get::<Health>(c), &Health(30));
        assert_eq!(reg.view::<Label>().count(), 0);
    }

    #[test]
    fn entities_lists_live_handles() {
        let mut reg = Registry::new();
        let a = reg.create();
        let b = reg.create();
        reg.destroy(a);
        assert_eq!(reg.entities().collect::<Vec<_>>(), vec![b]);
    }
}
