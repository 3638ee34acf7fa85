//! Tessera ECS -- sparse-set entity store with tag-parameterized hierarchies.
//!
//! Entities are generational handles issued by a [`Registry`]. Components are
//! plain Rust values kept in one sparse-set pool per type. Any number of
//! independent parent/child hierarchies can be layered over the same
//! entities; each is selected by a marker type and stored as four ordinary
//! components (see [`hierarchy`]).
//!
//! # Quick Start
//!
//! ```
//! use tessera_ecs::prelude::*;
//!
//! enum SceneTag {}
//!
//! #[derive(Debug, PartialEq)]
//! struct Name(&'static str);
//!
//! let mut reg = Registry::new();
//! let root = reg.create();
//! let a = reg.create();
//! let b = reg.create();
//! reg.emplace(a, Name("a"));
//!
//! hierarchy::prepend_child::<SceneTag>(&mut reg, root, a);
//! hierarchy::prepend_child::<SceneTag>(&mut reg, root, b);
//!
//! assert_eq!(hierarchy::collect_children::<SceneTag>(&reg, root), vec![b, a]);
//! assert!(hierarchy::remove_from_hierarchy::<SceneTag>(&mut reg, root, a));
//! assert_eq!(hierarchy::child_count::<SceneTag>(&reg, root), 1);
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod context;
pub mod entity;
pub mod hierarchy;
pub mod lifecycle;
pub mod pool;
pub mod registry;
pub mod selector;
pub mod tags;

pub use registry::Registry;

use entity::Entity;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by checked registry operations.
///
/// The panicking registry API reports the same conditions with this type's
/// `Display` text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist (stale generation or never allocated).
    #[error("entity {entity:?} does not exist (stale or never allocated)")]
    StaleEntity { entity: Entity },

    /// A required component is not attached.
    #[error("entity {entity:?} has no '{component}' component")]
    MissingComponent { entity: Entity, component: String },

    /// `emplace` of a component the entity already carries.
    #[error("entity {entity:?} already has a '{component}' component")]
    DuplicateComponent { entity: Entity, component: String },

    /// The entity carries component types outside an allowed set.
    #[error("entity {entity:?} carries components outside its whitelist: {components:?}")]
    UnexpectedComponents {
        entity: Entity,
        components: Vec<String>,
    },

    /// A context variable was read before being set.
    #[error("context variable of type '{type_name}' is not set")]
    MissingContext { type_name: &'static str },
}

/// A broken hierarchy invariant, reported by [`hierarchy::check_invariants`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    #[error("{entity:?} carries only one of FirstChild/ChildCount")]
    HalfParent { entity: Entity },

    #[error("{entity:?} carries only one of ParentLink/SiblingLinks")]
    HalfChild { entity: Entity },

    #[error("first child {head:?} of {parent:?} has prev = {prev:?}")]
    HeadHasPrev {
        parent: Entity,
        head: Entity,
        prev: Entity,
    },

    #[error("{parent:?} is not a live entity")]
    DeadParent { parent: Entity },

    #[error("child {child:?} of {parent:?} is not a live entity")]
    DeadChild { parent: Entity, child: Entity },

    #[error("{child:?} is listed under {parent:?} but is not linked as a child")]
    Unlinked { parent: Entity, child: Entity },

    #[error("{child:?} is listed under {parent:?} but its parent link is {actual:?}")]
    ForeignParent {
        parent: Entity,
        child: Entity,
        actual: Entity,
    },

    #[error("{next:?}.prev is {actual:?}, expected {prev:?}")]
    BrokenBackLink {
        prev: Entity,
        next: Entity,
        actual: Entity,
    },

    #[error("{child:?} appears twice under {parent:?}")]
    Cycle { parent: Entity, child: Entity },

    #[error("{parent:?} records {recorded} children but {walked} were reachable")]
    CountMismatch {
        parent: Entity,
        recorded: usize,
        walked: usize,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, ComponentInfo, ComponentRegistry};
    pub use crate::entity::{Entity, EntityAllocator};
    pub use crate::hierarchy::{
        self, ChildCount, Children, FirstChild, ParentLink, SiblingLinks,
    };
    pub use crate::lifecycle::{self, ComponentWhitelist};
    pub use crate::pool::{ErasedPool, Pool};
    pub use crate::registry::Registry;
    pub use crate::selector::Selector;
    pub use crate::tags::{
        DelayedConstruction, DelayedConstructionJustDone, NeedToDestroyTag, UnusedTag,
    };
    pub use crate::{EcsError, HierarchyError};
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
