//! Component trait and debug metadata.
//!
//! Any `Send + 'static` value is a component; there is no registration step.
//! The [`ComponentRegistry`] only records human-readable names for pools as
//! they are created, so log lines and panic messages can say `"transform"`
//! instead of a full type path.

use std::any::TypeId;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// Marker for values that can be attached to entities.
///
/// `Send` is required so a whole registry can be handed off to another
/// execution sequence.
pub trait Component: Send + 'static {}

impl<T: Send + 'static> Component for T {}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Debug metadata about a component type seen by a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
    /// Display name. Defaults to [`std::any::type_name`].
    pub name: String,
    /// Full Rust type path.
    pub type_name: &'static str,
    /// `std::mem::size_of::<T>()`
    pub size: usize,
    /// `std::mem::align_of::<T>()`
    pub align: usize,
}

impl ComponentInfo {
    pub fn of<C: 'static>() -> Self {
        let type_name = std::any::type_name::<C>();
        Self {
            name: type_name.to_owned(),
            type_name,
            size: std::mem::size_of::<C>(),
            align: std::mem::align_of::<C>(),
        }
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Maps Rust types to their [`ComponentInfo`].
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    infos: HashMap<TypeId, ComponentInfo>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `C` with its default name if it has not been seen yet.
    pub fn ensure<C: 'static>(&mut self) -> &ComponentInfo {
        self.infos
            .entry(TypeId::of::<C>())
            .or_insert_with(ComponentInfo::of::<C>)
    }

    /// Attach a display name to `C`, replacing any previous one.
    pub fn set_name<C: 'static>(&mut self, name: &str) {
        let info = self
            .infos
            .entry(TypeId::of::<C>())
            .or_insert_with(ComponentInfo::of::<C>);
        info.name = name.to_owned();
    }

    /// Display name for `C`, falling back to its type path.
    pub fn name_of<C: 'static>(&self) -> &str {
        self.infos
            .get(&TypeId::of::<C>())
            .map(|info| info.name.as_str())
            .unwrap_or_else(|| std::any::type_name::<C>())
    }

    pub fn get_info(&self, type_id: TypeId) -> Option<&ComponentInfo> {
        self.infos.get(&type_id)
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Names of all known component types, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.infos.values().map(|i| i.name.as_str()).collect();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
