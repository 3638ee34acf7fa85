//! Sequence identity and the per-thread "current sequence" marker.
//!
//! A sequence is a logical execution context: tasks posted to it run one at
//! a time, in order, though not necessarily on the same OS thread. While a
//! runner executes a task it holds a [`SequenceScope`], which is what
//! [`current_sequence`] reports.

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: Cell<Option<SequenceId>> = const { Cell::new(None) };
}

/// Process-unique identifier of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequenceId(NonZeroU64);

impl SequenceId {
    /// Allocate a fresh id. Never returns the same value twice.
    pub fn next() -> Self {
        let raw = NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        match NonZeroU64::new(raw) {
            Some(id) => Self(id),
            None => unreachable!("sequence id counter wrapped"),
        }
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq#{}", self.0)
    }
}

/// The sequence whose task is running on this thread, if any.
pub fn current_sequence() -> Option<SequenceId> {
    CURRENT.with(Cell::get)
}

/// Marks `id` as current on this thread until dropped.
///
/// Scopes nest; dropping one restores whatever was current before it.
#[must_use = "the sequence is only current while the scope is alive"]
pub struct SequenceScope {
    id: SequenceId,
    previous: Option<SequenceId>,
    _not_send: PhantomData<*const ()>,
}

impl SequenceScope {
    pub fn enter(id: SequenceId) -> Self {
        let previous = CURRENT.with(|current| current.replace(Some(id)));
        Self {
            id,
            previous,
            _not_send: PhantomData,
        }
    }

    pub fn id(&self) -> SequenceId {
        self.id
    }
}

impl Drop for SequenceScope {
    fn drop(&mut self) {
        CURRENT.with(|current| {
            debug_assert_eq!(current.get(), Some(self.id), "sequence scopes dropped out of order");
            current.set(self.previous);
        });
    }
}

impl fmt::Debug for SequenceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceScope")
            .field("id", &self.id)
            .field("previous", &self.previous)
            .finish()
    }
}

/// Proof, checked at creation, that a given sequence is current.
///
/// Neither `Send` nor `Sync`, so it cannot leave the thread it was made on.
#[derive(Clone)]
pub struct SequenceToken {
    id: SequenceId,
    _not_send: PhantomData<*const ()>,
}

impl SequenceToken {
    /// A token for the current sequence, or `None` outside any sequence.
    pub fn current() -> Option<Self> {
        current_sequence().map(|id| Self {
            id,
            _not_send: PhantomData,
        })
    }

    pub fn id(&self) -> SequenceId {
        self.id
    }

    /// Whether the sequence this token was minted for is still current.
    pub fn is_current(&self) -> bool {
        current_sequence() == Some(self.id)
    }
}

impl fmt::Debug for SequenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SequenceToken").field(&self.id).finish()
    }
}
