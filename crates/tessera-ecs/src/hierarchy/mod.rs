//! Parent/child hierarchies stored as ordinary components.
//!
//! A hierarchy is an intrusive doubly-linked list of children per parent,
//! spread over four components (see [`components`]). Every function here is
//! generic over a tag `T`; hierarchies with different tags never see each
//! other's edges, even over the same entities.
//!
//! Newly linked children go to the front of the list, so iteration yields the
//! most recently prepended child first.
//!
//! Passing a stale entity to any of these functions is a caller bug and
//! panics. Asking about an edge that does not exist is not: queries answer
//! `false`/`None`/`0` and [`remove_from_hierarchy`] returns `false` without
//! touching anything.
//!
//! [`Entity::NULL`] is the "no neighbour" value stored in the links, so every
//! query and removal accepts it as an entity with no edges: presence checks
//! answer `false` and a NULL parent has no children to iterate. Only
//! [`prepend_child`] rejects it.

pub mod components;

use std::collections::HashSet;
use std::iter::FusedIterator;
use std::marker::PhantomData;

use crate::entity::Entity;
use crate::registry::Registry;
use crate::selector::Selector;
use crate::HierarchyError;

pub use components::{ChildCount, FirstChild, ParentLink, SiblingLinks};

// ---------------------------------------------------------------------------
// Presence checks
// ---------------------------------------------------------------------------

/// Whether `entity` is currently a child under `T`.
pub fn has_child_components<T: 'static>(reg: &Registry, entity: Entity) -> bool {
    if entity.is_null() {
        return false;
    }
    let linked = reg.has::<ParentLink<T>>(entity);
    debug_assert_eq!(
        linked,
        reg.has::<SiblingLinks<T>>(entity),
        "{entity:?} is half-linked as a child"
    );
    linked
}

/// Whether `entity` currently has children under `T`.
pub fn has_parent_components<T: 'static>(reg: &Registry, entity: Entity) -> bool {
    if entity.is_null() {
        return false;
    }
    let linked = reg.has::<FirstChild<T>>(entity);
    debug_assert_eq!(
        linked,
        reg.has::<ChildCount<T>>(entity),
        "{entity:?} is half-linked as a parent"
    );
    linked
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// The parent of `child` under `T`.
pub fn parent_of<T: 'static>(reg: &Registry, child: Entity) -> Option<Entity> {
    let child = child.non_null()?;
    reg.try_get::<ParentLink<T>>(child).map(|link| link.parent)
}

/// Head of `parent`'s children list.
pub fn first_child_of<T: 'static>(reg: &Registry, parent: Entity) -> Option<Entity> {
    let parent = parent.non_null()?;
    reg.try_get::<FirstChild<T>>(parent).map(|head| head.first)
}

/// Number of direct children, 0 when there are none.
pub fn child_count<T: 'static>(reg: &Registry, parent: Entity) -> usize {
    parent
        .non_null()
        .and_then(|parent| reg.try_get::<ChildCount<T>>(parent))
        .map_or(0, |count| count.size)
}

/// O(1) edge check through `child`'s parent link.
pub fn is_child_of<T: 'static>(reg: &Registry, parent: Entity, child: Entity) -> bool {
    parent_of::<T>(reg, child) == Some(parent)
}

/// Whether `candidate` is among `parent`'s direct children.
///
/// Walks the list, so this is O(children). Agrees with [`is_child_of`]
/// whenever the hierarchy is consistent.
pub fn has_child<T: 'static>(reg: &Registry, parent: Entity, candidate: Entity) -> bool {
    !candidate.is_null() && children::<T>(reg, parent).any(|child| child == candidate)
}

/// Borrowing iterator over `parent`'s direct children, newest first.
///
/// Empty for a NULL or childless parent.
pub fn children<T: 'static>(reg: &Registry, parent: Entity) -> Children<'_, T> {
    Children {
        reg,
        next: first_child_of::<T>(reg, parent).unwrap_or(Entity::NULL),
        remaining: child_count::<T>(reg, parent),
        _tag: PhantomData,
    }
}

/// Snapshot of `parent`'s direct children, newest first.
pub fn collect_children<T: 'static>(reg: &Registry, parent: Entity) -> Vec<Entity> {
    children::<T>(reg, parent).collect()
}

/// See [`children`].
pub struct Children<'a, T> {
    reg: &'a Registry,
    next: Entity,
    remaining: usize,
    _tag: PhantomData<fn() -> T>,
}

impl<T: 'static> Iterator for Children<'_, T> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        let current = self.next.non_null()?;
        self.next = self.reg.get::<SiblingLinks<T>>(current).next;
        self.remaining = self.remaining.saturating_sub(1);
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.next.is_null() {
            (0, Some(0))
        } else {
            (1, Some(self.remaining.max(1)))
        }
    }
}

impl<T: 'static> FusedIterator for Children<'_, T> {}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

/// Link `child` as the new first child of `parent`. O(1).
///
/// # Panics
///
/// If either entity is stale, if `parent == child`, or if `child` is already
/// a child under `T` (call [`detach`] first).
#[track_caller]
pub fn prepend_child<T: 'static>(reg: &mut Registry, parent: Entity, child: Entity) {
    assert!(reg.valid(parent), "parent {parent:?} is not a live entity");
    assert!(reg.valid(child), "child {child:?} is not a live entity");
    assert_ne!(parent, child, "an entity cannot be its own child");
    assert!(
        !has_child_components::<T>(reg, child),
        "{child:?} is already a child of {:?}",
        parent_of::<T>(reg, child)
    );
    debug_assert!(
        !is_ancestor_of::<T>(reg, child, parent),
        "linking {child:?} under {parent:?} would create a cycle"
    );

    let old_first = first_child_of::<T>(reg, parent);
    if let Some(old_first) = old_first {
        let links = reg.get_mut::<SiblingLinks<T>>(old_first);
        debug_assert!(links.prev.is_null(), "list head {old_first:?} has a prev");
        links.prev = child;
    }

    reg.emplace(child, ParentLink::<T>::new(parent));
    reg.emplace(
        child,
        SiblingLinks::<T>::new(old_first.unwrap_or(Entity::NULL), Entity::NULL),
    );
    reg.emplace_or_replace(parent, FirstChild::<T>::new(child));
    reg.get_or_emplace_with(parent, || ChildCount::<T>::new(0)).size += 1;
}

/// Unlink `child` from `parent`. O(1).
///
/// Returns `false` and changes nothing when `parent` has no children,
/// `child` is not linked, or `child` belongs to a different parent.
#[must_use]
#[track_caller]
pub fn remove_from_hierarchy<T: 'static>(reg: &mut Registry, parent: Entity, child: Entity) -> bool {
    if parent.is_null() || child.is_null() {
        return false;
    }
    if !has_parent_components::<T>(reg, parent) || !is_child_of::<T>(reg, parent, child) {
        return false;
    }

    let links = *reg.get::<SiblingLinks<T>>(child);
    match links.prev.non_null() {
        Some(prev) => reg.get_mut::<SiblingLinks<T>>(prev).next = links.next,
        None => {
            // `child` was the head.
            debug_assert_eq!(first_child_of::<T>(reg, parent), Some(child));
            reg.get_mut::<FirstChild<T>>(parent).first = links.next;
        }
    }
    if let Some(next) = links.next.non_null() {
        reg.get_mut::<SiblingLinks<T>>(next).prev = links.prev;
    }

    let count = reg.get_mut::<ChildCount<T>>(parent);
    count.size -= 1;
    if count.size == 0 {
        debug_assert!(reg.get::<FirstChild<T>>(parent).first.is_null());
        reg.remove::<FirstChild<T>>(parent);
        reg.remove::<ChildCount<T>>(parent);
    }

    reg.remove::<ParentLink<T>>(child);
    reg.remove::<SiblingLinks<T>>(child);
    true
}

/// Unlink `child` from whatever parent it has under `T`.
#[must_use]
#[track_caller]
pub fn detach<T: 'static>(reg: &mut Registry, child: Entity) -> bool {
    match parent_of::<T>(reg, child) {
        Some(parent) => remove_from_hierarchy::<T>(reg, parent, child),
        None => false,
    }
}

/// Visit each direct child of `parent`, newest first.
///
/// The successor is read before `visitor` runs, so the visitor may unlink or
/// destroy the child it was handed. Other structural changes during the walk
/// have no defined effect on which children are visited.
#[track_caller]
pub fn for_each_top_level_child<T: 'static>(
    reg: &mut Registry,
    parent: Entity,
    mut visitor: impl FnMut(&mut Registry, Entity, Entity),
) {
    let mut current = first_child_of::<T>(reg, parent);
    while let Some(child) = current {
        debug_assert!(is_child_of::<T>(reg, parent, child));
        let next = reg.get::<SiblingLinks<T>>(child).next.non_null();
        visitor(reg, parent, child);
        current = next;
    }
}

/// Clear every child edge of every parent matched by `selector`.
///
/// Entities are not destroyed. The order in which parents and children are
/// processed is unspecified. Returns the number of edges removed.
pub fn remove_all_top_level_children_from_selection<T: 'static>(
    reg: &mut Registry,
    selector: &Selector,
) -> usize {
    let parents = reg.select(&selector.clone().with::<FirstChild<T>>());
    let mut removed = 0;
    for &parent in &parents {
        let kids = collect_children::<T>(reg, parent);
        debug_assert_eq!(kids.len(), child_count::<T>(reg, parent));
        for &child in &kids {
            debug_assert!(is_child_of::<T>(reg, parent, child));
            reg.remove::<ParentLink<T>>(child);
            reg.remove::<SiblingLinks<T>>(child);
        }
        reg.remove::<FirstChild<T>>(parent);
        reg.remove::<ChildCount<T>>(parent);
        removed += kids.len();
    }
    tracing::debug!(
        hierarchy = std::any::type_name::<T>(),
        parents = parents.len(),
        edges = removed,
        "cleared children of selection"
    );
    removed
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Whether `ancestor` is reachable from `entity` by following parent links.
pub fn is_ancestor_of<T: 'static>(reg: &Registry, ancestor: Entity, entity: Entity) -> bool {
    let mut seen = HashSet::new();
    let mut current = parent_of::<T>(reg, entity);
    while let Some(node) = current {
        if node == ancestor {
            return true;
        }
        if !seen.insert(node) || !reg.valid(node) {
            return false;
        }
        current = parent_of::<T>(reg, node);
    }
    false
}

/// Verify every linkage invariant for `parent` and its direct children.
pub fn check_invariants<T: 'static>(reg: &Registry, parent: Entity) -> Result<(), HierarchyError> {
    if !reg.valid(parent) {
        return Err(HierarchyError::DeadParent { parent });
    }
    if reg.has::<ParentLink<T>>(parent) != reg.has::<SiblingLinks<T>>(parent) {
        return Err(HierarchyError::HalfChild { entity: parent });
    }
    let (head, recorded) = match (
        reg.try_get::<FirstChild<T>>(parent),
        reg.try_get::<ChildCount<T>>(parent),
    ) {
        (None, None) => return Ok(()),
        (Some(head), Some(count)) => (head.first, count.size),
        _ => return Err(HierarchyError::HalfParent { entity: parent }),
    };

    let mut seen = HashSet::new();
    let mut prev = Entity::NULL;
    let mut current = head;
    while !current.is_null() {
        if !reg.valid(current) {
            return Err(HierarchyError::DeadChild {
                parent,
                child: current,
            });
        }
        if !seen.insert(current) {
            return Err(HierarchyError::Cycle {
                parent,
                child: current,
            });
        }
        let (link, links) = match (
            reg.try_get::<ParentLink<T>>(current),
            reg.try_get::<SiblingLinks<T>>(current),
        ) {
            (Some(link), Some(links)) => (link, links),
            (None, None) => {
                return Err(HierarchyError::Unlinked {
                    parent,
                    child: current,
                })
            }
            _ => return Err(HierarchyError::HalfChild { entity: current }),
        };
        if link.parent != parent {
            return Err(HierarchyError::ForeignParent {
                parent,
                child: current,
                actual: link.parent,
            });
        }
        if links.prev != prev {
            return Err(if prev.is_null() {
                HierarchyError::HeadHasPrev {
                    parent,
                    head: current,
                    prev: links.prev,
                }
            } else {
                HierarchyError::BrokenBackLink {
                    prev,
                    next: current,
                    actual: links.prev,
                }
            });
        }
        prev = current;
        current = links.next;
    }

    if seen.len() != recorded || recorded == 0 {
        return Err(HierarchyError::CountMismatch {
            parent,
            recorded,
            walked: seen.len(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
