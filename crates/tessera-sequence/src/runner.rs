//! Sequenced task runners.
//!
//! [`SequencedTaskRunner`] is the seam the rest of the crate is written
//! against. Two implementations are provided: [`ThreadSequence`] runs tasks
//! on a dedicated worker thread, and [`ManualSequence`] queues tasks until
//! the owner drains them on the calling thread, which keeps tests
//! deterministic.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crate::sequence::{current_sequence, SequenceId, SequenceScope};
use crate::SequenceError;

/// A unit of work posted to a sequence.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs posted tasks one at a time, in posting order, as one sequence.
pub trait SequencedTaskRunner: Send + Sync {
    /// Identity of the sequence tasks run in. Fixed for the runner's life.
    fn sequence_id(&self) -> SequenceId;

    /// Queue `task`. Fails if the runner no longer accepts work, in which
    /// case the task is dropped without running.
    fn post_task(&self, task: Task) -> Result<(), SequenceError>;

    /// Whether the calling code is running as part of this sequence.
    fn runs_tasks_in_current_sequence(&self) -> bool {
        current_sequence() == Some(self.sequence_id())
    }

    /// Whether tasks make progress while the poster blocks. `false` for
    /// runners that only run tasks when their owner drains them.
    fn supports_blocking_wait(&self) -> bool {
        true
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run `f` on `runner` and block until it returns.
///
/// Fails with [`SequenceError::BlockingWaitUnsupported`] before posting
/// anything if the runner needs the caller to drain it, as
/// [`ManualSequence`] does.
///
/// # Panics
///
/// If called from `runner`'s own sequence, which would deadlock.
pub fn run_and_wait<R, F>(runner: &dyn SequencedTaskRunner, f: F) -> Result<R, SequenceError>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    assert!(
        !runner.runs_tasks_in_current_sequence(),
        "run_and_wait on {} from inside that sequence would deadlock",
        runner.sequence_id()
    );
    if !runner.supports_blocking_wait() {
        return Err(SequenceError::BlockingWaitUnsupported {
            sequence: runner.sequence_id(),
        });
    }
    let (tx, rx) = mpsc::sync_channel(1);
    runner.post_task(Box::new(move || {
        let _ = tx.send(f());
    }))?;
    // The sender is dropped unsent if the task panicked or was discarded.
    rx.recv().map_err(|_| SequenceError::TaskAbandoned {
        sequence: runner.sequence_id(),
    })
}

// ---------------------------------------------------------------------------
// ThreadSequence
// ---------------------------------------------------------------------------

/// Configuration for a [`ThreadSequence`].
#[derive(Debug, Default, Clone)]
pub struct ThreadSequenceBuilder {
    name: Option<String>,
}

impl ThreadSequenceBuilder {
    /// Name of the worker thread. Defaults to `tessera-<sequence id>`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn spawn(self) -> Result<ThreadSequence, SequenceError> {
        let id = SequenceId::next();
        let name = self.name.unwrap_or_else(|| format!("tessera-{}", id.get()));
        let (sender, receiver) = mpsc::channel::<Task>();

        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _scope = SequenceScope::enter(id);
                tracing::debug!(sequence = %id, "sequence thread started");
                for task in receiver {
                    task();
                }
                tracing::debug!(sequence = %id, "sequence thread stopped");
            })
            .map_err(|source| SequenceError::Spawn {
                name: name.clone(),
                source,
            })?;

        Ok(ThreadSequence {
            id,
            name,
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        })
    }
}

/// A sequence backed by one dedicated worker thread.
///
/// A panicking task takes the worker down; later posts then fail with
/// [`SequenceError::RunnerShutDown`].
pub struct ThreadSequence {
    id: SequenceId,
    name: String,
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadSequence {
    pub fn builder() -> ThreadSequenceBuilder {
        ThreadSequenceBuilder::default()
    }

    /// Spawn with default settings.
    pub fn spawn() -> Result<Self, SequenceError> {
        Self::builder().spawn()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop accepting tasks, let queued ones finish, and join the worker.
    ///
    /// Called from the sequence itself, this only closes the queue; the
    /// worker exits once the current task returns. Idempotent.
    pub fn shutdown(&self) -> Result<(), SequenceError> {
        lock(&self.sender).take();
        if self.runs_tasks_in_current_sequence() {
            return Ok(());
        }
        let Some(handle) = lock(&self.handle).take() else {
            return Ok(());
        };
        handle
            .join()
            .map_err(|_| SequenceError::WorkerPanicked { sequence: self.id })
    }
}

impl SequencedTaskRunner for ThreadSequence {
    fn sequence_id(&self) -> SequenceId {
        self.id
    }

    fn post_task(&self, task: Task) -> Result<(), SequenceError> {
        let sender = lock(&self.sender);
        let sent = match sender.as_ref() {
            Some(sender) => sender.send(task).is_ok(),
            None => false,
        };
        if sent {
            Ok(())
        } else {
            tracing::warn!(sequence = %self.id, "task posted to a stopped sequence");
            Err(SequenceError::RunnerShutDown { sequence: self.id })
        }
    }
}

impl Drop for ThreadSequence {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            tracing::warn!(sequence = %self.id, "{err}");
        }
    }
}

impl std::fmt::Debug for ThreadSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadSequence")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ManualSequence
// ---------------------------------------------------------------------------

/// A sequence whose tasks run only when [`ManualSequence::run_until_idle`]
/// is called, on the calling thread.
pub struct ManualSequence {
    id: SequenceId,
    queue: Mutex<VecDeque<Task>>,
    closed: AtomicBool,
}

impl Default for ManualSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualSequence {
    pub fn new() -> Self {
        Self {
            id: SequenceId::next(),
            queue: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of queued tasks.
    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Run queued tasks, including ones they post, until the queue is empty.
    /// Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let _scope = SequenceScope::enter(self.id);
        let mut ran = 0;
        loop {
            // Released before running so the task can post more work.
            let next = lock(&self.queue).pop_front();
            let Some(task) = next else {
                break;
            };
            task();
            ran += 1;
        }
        ran
    }

    /// Reject further posts and drop whatever is queued.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        lock(&self.queue).clear();
    }
}

impl SequencedTaskRunner for ManualSequence {
    fn sequence_id(&self) -> SequenceId {
        self.id
    }

    fn post_task(&self, task: Task) -> Result<(), SequenceError> {
        if self.closed.load(Ordering::Acquire) {
            tracing::warn!(sequence = %self.id, "task posted to a closed sequence");
            return Err(SequenceError::RunnerShutDown { sequence: self.id });
        }
        lock(&self.queue).push_back(task);
        Ok(())
    }

    fn supports_blocking_wait(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for ManualSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualSequence")
            .field("id", &self.id)
            .field("pending", &self.pending())
            .finish()
    }
}
