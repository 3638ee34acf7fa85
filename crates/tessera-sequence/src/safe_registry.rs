//! [`SafeRegistry`]: a [`Registry`] usable only from its owning sequence.
//!
//! The wrapper starts [`Affinity::Unbound`]. The first checked access, which
//! must happen on the runner's sequence, binds it; from then on every access
//! asserts that the bound sequence is current. Access from anywhere else is a
//! caller bug and panics.
//!
//! The type is `Send` so it can be handed to another sequence, but not
//! `Sync`, so two sequences can never hold it at once:
//!
//! ```compile_fail
//! fn share<T: Sync>(_: &T) {}
//! let seq = std::sync::Arc::new(tessera_sequence::runner::ManualSequence::new());
//! share(&tessera_sequence::SafeRegistry::new(seq));
//! ```

use std::cell::Cell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tessera_ecs::component::Component;
use tessera_ecs::entity::Entity;
use tessera_ecs::Registry;

use crate::runner::SequencedTaskRunner;
use crate::sequence::{current_sequence, SequenceId, SequenceToken};
use crate::SequenceError;

/// Binding state of a [`SafeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    /// Not accessed since construction or the last transfer.
    Unbound,
    /// Fixed to this sequence on first access.
    Bound(SequenceId),
}

/// A [`Registry`] pinned to one sequence.
pub struct SafeRegistry {
    runner: Arc<dyn SequencedTaskRunner>,
    // `Cell` also keeps the wrapper `!Sync`.
    bound: Cell<Option<SequenceId>>,
    registry: Registry,
}

impl SafeRegistry {
    /// An empty registry owned by `runner`'s sequence.
    pub fn new(runner: Arc<dyn SequencedTaskRunner>) -> Self {
        Self::with_registry(runner, Registry::new())
    }

    pub fn with_registry(runner: Arc<dyn SequencedTaskRunner>, registry: Registry) -> Self {
        Self {
            runner,
            bound: Cell::new(None),
            registry,
        }
    }

    // -- callable from any thread -------------------------------------------

    pub fn task_runner(&self) -> &Arc<dyn SequencedTaskRunner> {
        &self.runner
    }

    /// The owning sequence.
    pub fn sequence_id(&self) -> SequenceId {
        self.runner.sequence_id()
    }

    pub fn runs_tasks_in_current_sequence(&self) -> bool {
        self.runner.runs_tasks_in_current_sequence()
    }

    pub fn affinity(&self) -> Affinity {
        match self.bound.get() {
            Some(id) => Affinity::Bound(id),
            None => Affinity::Unbound,
        }
    }

    // -- affinity checks ----------------------------------------------------

    fn check(&self, current: Option<SequenceId>) -> Result<(), SequenceError> {
        let expected = self.bound.get().unwrap_or_else(|| self.sequence_id());
        if current != Some(expected) {
            return Err(SequenceError::WrongSequence { expected, current });
        }
        if self.bound.get().is_none() {
            tracing::debug!(sequence = %expected, "registry bound to sequence");
            self.bound.set(Some(expected));
        }
        Ok(())
    }

    fn check_token(&self, token: &SequenceToken) -> Result<(), SequenceError> {
        if !token.is_current() {
            return Err(SequenceError::StaleToken {
                token: token.id(),
                current: current_sequence(),
            });
        }
        self.check(Some(token.id()))
    }

    #[track_caller]
    fn assert_on_sequence(&self) {
        if let Err(err) = self.check(current_sequence()) {
            panic!("{err}");
        }
    }

    pub fn try_dereference(&self) -> Result<&Registry, SequenceError> {
        self.check(current_sequence())?;
        Ok(&self.registry)
    }

    pub fn try_dereference_mut(&mut self) -> Result<&mut Registry, SequenceError> {
        self.check(current_sequence())?;
        Ok(&mut self.registry)
    }

    /// The registry. Panics off-sequence.
    #[track_caller]
    pub fn dereference(&self) -> &Registry {
        self.assert_on_sequence();
        &self.registry
    }

    #[track_caller]
    pub fn dereference_mut(&mut self) -> &mut Registry {
        self.assert_on_sequence();
        &mut self.registry
    }

    /// The registry, checked against an explicit token instead of the
    /// thread-local marker. Panics if the token's scope has ended.
    #[track_caller]
    pub fn registry_with(&self, token: &SequenceToken) -> &Registry {
        if let Err(err) = self.check_token(token) {
            panic!("{err}");
        }
        &self.registry
    }

    #[track_caller]
    pub fn registry_with_mut(&mut self, token: &SequenceToken) -> &mut Registry {
        if let Err(err) = self.check_token(token) {
            panic!("{err}");
        }
        &mut self.registry
    }

    // -- pooling ------------------------------------------------------------

    /// Overwrite the entity's `C` in place if it has one, otherwise attach
    /// `value`. Keeps the pool slot of a recycled component.
    #[track_caller]
    pub fn reset_or_create<C: Component>(
        &mut self,
        debug_name: &str,
        entity: Entity,
        value: C,
    ) -> &mut C {
        let registry = self.dereference_mut();
        if registry.has::<C>(entity) {
            tracing::trace!(%entity, "using preallocated {debug_name}");
            let slot = registry.get_mut::<C>(entity);
            *slot = value;
            slot
        } else {
            tracing::trace!(%entity, "allocating new {debug_name}");
            registry.emplace(entity, value)
        }
    }

    // -- hand-off -----------------------------------------------------------

    /// Re-home the wrapper on `runner`'s sequence. The result is unbound and
    /// binds on its first access there.
    pub fn transfer_to(self, runner: Arc<dyn SequencedTaskRunner>) -> SafeRegistry {
        tracing::debug!(
            from = %self.sequence_id(),
            to = %runner.sequence_id(),
            "registry handed off"
        );
        Self::with_registry(runner, self.registry)
    }

    /// Move the wrapper into a task on its own sequence.
    ///
    /// If the runner has shut down the task, and the registry with it, is
    /// dropped.
    pub fn post<F>(self, f: F) -> Result<(), SequenceError>
    where
        F: FnOnce(SafeRegistry) + Send + 'static,
    {
        let runner = Arc::clone(&self.runner);
        runner.post_task(Box::new(move || f(self)))
    }

    /// Give up sequence tracking and take the registry.
    pub fn into_inner(self) -> Registry {
        self.registry
    }
}

impl Deref for SafeRegistry {
    type Target = Registry;

    #[track_caller]
    fn deref(&self) -> &Registry {
        self.dereference()
    }
}

impl DerefMut for SafeRegistry {
    #[track_caller]
    fn deref_mut(&mut self) -> &mut Registry {
        self.dereference_mut()
    }
}

impl fmt::Debug for SafeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // No affinity check: must be printable from any thread.
        f.debug_struct("SafeRegistry")
            .field("sequence", &self.sequence_id())
            .field("affinity", &self.affinity())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ManualSequence;
    use crate::sequence::SequenceScope;

    fn assert_send<T: Send>() {}

    #[derive(Debug, PartialEq)]
    struct Buffer(Vec<u8>);

    #[test]
    fn wrapper_is_send() {
        assert_send::<SafeRegistry>();
    }

    #[test]
    fn first_access_binds() {
        let seq = Arc::new(ManualSequence::new());
        let mut reg = SafeRegistry::new(seq.clone());
        assert_eq!(reg.affinity(), Affinity::Unbound);

        let _scope = SequenceScope::enter(seq.sequence_id());
        let e = reg.create();
        assert!(reg.valid(e));
        assert_eq!(reg.affinity(), Affinity::Bound(seq.sequence_id()));
    }

    #[test]
    fn off_sequence_access_is_an_error() {
        let seq = Arc::new(ManualSequence::new());
        let reg = SafeRegistry::new(seq.clone());
        let err = reg.try_dereference().unwrap_err();
        assert!(matches!(
            err,
            SequenceError::WrongSequence { expected, current: None } if expected == seq.sequence_id()
        ));
        assert_eq!(reg.affinity(), Affinity::Unbound);
        // Read-only accessors never check.
        assert_eq!(reg.sequence_id(), seq.sequence_id());
        assert!(!reg.runs_tasks_in_current_sequence());
        assert!(format!("{reg:?}").contains("Unbound"));
    }

    #[test]
    #[should_panic(expected = "must run on sequence")]
    fn deref_off_sequence_panics() {
        let seq = Arc::new(ManualSequence::new());
        let reg = SafeRegistry::new(seq);
        let _ = reg.entity_count();
    }

    #[test]
    #[should_panic(expected = "must run on sequence")]
    fn other_sequence_panics_after_binding() {
        let seq = Arc::new(ManualSequence::new());
        let mut reg = SafeRegistry::new(seq.clone());
        {
            let _scope = SequenceScope::enter(seq.sequence_id());
            reg.create();
        }
        let _other = SequenceScope::enter(SequenceId::next());
        reg.create();
    }

    #[test]
    fn token_access() {
        let seq = Arc::new(ManualSequence::new());
        let mut reg = SafeRegistry::new(seq.clone());
        let _scope = SequenceScope::enter(seq.sequence_id());
        let token = SequenceToken::current().unwrap();
        let e = reg.registry_with_mut(&token).create();
        assert!(reg.registry_with(&token).valid(e));
    }

    #[test]
    #[should_panic(expected = "outlived its scope")]
    fn token_from_ended_scope_is_rejected() {
        let seq = Arc::new(ManualSequence::new());
        let reg = SafeRegistry::new(seq.clone());
        let token = {
            let _scope = SequenceScope::enter(seq.sequence_id());
            SequenceToken::current().unwrap()
        };
        let _other = SequenceScope::enter(SequenceId::next());
        let _ = reg.registry_with(&token);
    }

    #[test]
    fn reset_or_create_reuses_slot() {
        let seq = Arc::new(ManualSequence::new());
        let mut reg = SafeRegistry::new(seq.clone());
        let _scope = SequenceScope::enter(seq.sequence_id());
        let e = reg.create();

        reg.reset_or_create("buffer", e, Buffer(vec![1, 2, 3]));
        assert_eq!(reg.pool::<Buffer>().map(|p| p.len()), Some(1));

        let buf = reg.reset_or_create("buffer", e, Buffer(vec![9]));
        buf.0.push(10);
        assert_eq!(reg.get::<Buffer>(e), &Buffer(vec![9, 10]));
        assert_eq!(reg.pool::<Buffer>().map(|p| p.len()), Some(1));
    }

    #[test]
    fn transfer_resets_affinity() {
        let a = Arc::new(ManualSequence::new());
        let b = Arc::new(ManualSequence::new());
        let mut reg = SafeRegistry::new(a.clone());
        let e = {
            let _scope = SequenceScope::enter(a.sequence_id());
            reg.create()
        };
        assert_eq!(reg.affinity(), Affinity::Bound(a.sequence_id()));

        let reg = reg.transfer_to(b.clone());
        assert_eq!(reg.affinity(), Affinity::Unbound);
        assert_eq!(reg.sequence_id(), b.sequence_id());

        let _scope = SequenceScope::enter(b.sequence_id());
        assert!(reg.valid(e));
        assert_eq!(reg.affinity(), Affinity::Bound(b.sequence_id()));
    }

    #[test]
    fn into_inner_needs_no_sequence() {
        let seq = Arc::new(ManualSequence::new());
        let reg = SafeRegistry::new(seq);
        assert_eq!(reg.into_inner().entity_count(), 0);
    }
}
