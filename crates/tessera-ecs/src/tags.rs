//! Zero-sized lifecycle markers attached to entities as ordinary components.
//!
//! [`Selector::exclude_not_constructed`](crate::selector::Selector::exclude_not_constructed)
//! skips entities carrying [`NeedToDestroyTag`], [`DelayedConstruction`] or
//! [`UnusedTag`]. The construction markers are managed by
//! [`lifecycle`](crate::lifecycle).

/// The entity sits in a reuse cache and may hold stale data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct UnusedTag;

/// The entity is scheduled for destruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NeedToDestroyTag;

/// The entity is still missing some of its required components.
///
/// Expected to be cleared within one tick, once every subsystem has attached
/// what it needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DelayedConstruction;

/// Set for the single tick right after [`DelayedConstruction`] was cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DelayedConstructionJustDone;
