//! Tessera Sequence -- single-sequence ownership of a [`Registry`].
//!
//! A [`Registry`] has no internal locking. This crate pins it to one
//! execution sequence at a time: [`SafeRegistry`] owns the registry together
//! with the task runner of the sequence allowed to touch it, and checks on
//! every access that this sequence is the one currently running. Moving the
//! wrapper to another sequence is an explicit, ownership-transferring
//! [`SafeRegistry::transfer_to`].
//!
//! [`Registry`]: tessera_ecs::Registry
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use tessera_sequence::prelude::*;
//!
//! let seq = Arc::new(ManualSequence::new());
//! let registry = SafeRegistry::new(seq.clone());
//!
//! registry
//!     .post(|mut registry| {
//!         let e = registry.create();
//!         registry.emplace(e, 42u32);
//!         assert_eq!(registry.entity_count(), 1);
//!     })
//!     .unwrap();
//! assert_eq!(seq.run_until_idle(), 1);
//! ```

#![deny(unsafe_code)]

pub mod runner;
pub mod safe_registry;
pub mod sequence;

pub use safe_registry::{Affinity, SafeRegistry};

use sequence::SequenceId;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by runners and checked sequence access.
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    /// The runner no longer accepts tasks. The posted task was dropped.
    #[error("sequence {sequence} has shut down")]
    RunnerShutDown { sequence: SequenceId },

    /// Access from a sequence other than the owning one.
    #[error("must run on sequence {expected}, but current is {current:?}")]
    WrongSequence {
        expected: SequenceId,
        current: Option<SequenceId>,
    },

    /// A [`SequenceToken`](sequence::SequenceToken) was used after its
    /// sequence scope ended.
    #[error("token for sequence {token} outlived its scope, current is {current:?}")]
    StaleToken {
        token: SequenceId,
        current: Option<SequenceId>,
    },

    /// The runner cannot make progress while the caller blocks on it.
    #[error("sequence {sequence} only runs tasks when drained; a blocking wait would never return")]
    BlockingWaitUnsupported { sequence: SequenceId },

    /// A task was accepted but never produced its result.
    #[error("task on sequence {sequence} was abandoned before completing")]
    TaskAbandoned { sequence: SequenceId },

    /// The worker thread ended by panicking.
    #[error("worker thread of sequence {sequence} panicked")]
    WorkerPanicked { sequence: SequenceId },

    /// The OS refused to start a worker thread.
    #[error("failed to spawn sequence thread '{name}'")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::runner::{
        run_and_wait, ManualSequence, SequencedTaskRunner, Task, ThreadSequence,
        ThreadSequenceBuilder,
    };
    pub use crate::safe_registry::{Affinity, SafeRegistry};
    pub use crate::sequence::{current_sequence, SequenceId, SequenceScope, SequenceToken};
    pub use crate::SequenceError;
    pub use tessera_ecs::{entity::Entity, Registry};
}
