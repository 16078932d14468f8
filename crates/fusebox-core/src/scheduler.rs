//! Delayed execution of fire-and-forget actions.
//!
//! Breakers never block on their own timers. When a transition needs a
//! follow-up (promote Open to HalfOpen, forget an old failure), the breaker
//! hands a closure to a [`Scheduler`] and moves on. There is no cancellation:
//! every action must re-check the world when it finally runs.
//!
//! Four implementations are provided:
//!
//! - [`AutoScheduler`], the default, looks for a tokio runtime each time it
//!   schedules and falls back to a thread when there is none.
//! - [`TokioScheduler`] spawns a sleeping task on a tokio runtime. It honours
//!   tokio's paused test clock, so `#[tokio::test(start_paused = true)]` tests
//!   run instantly. Actions still pending when the runtime shuts down are
//!   moved to a thread instead of being lost.
//! - [`ThreadScheduler`] parks one OS thread per action, for callers that have
//!   no runtime.
//! - [`ManualScheduler`] keeps a virtual clock that only moves when
//!   [`ManualScheduler::advance`] is called, which makes timer interleavings
//!   fully deterministic in tests.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;

/// A unit of deferred work.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// Shared, type-erased scheduler.
pub type SharedScheduler = Arc<dyn Scheduler>;

/// Runs an action once, after a delay.
pub trait Scheduler: Send + Sync {
    /// Arranges for `action` to run no earlier than `delay` from now.
    ///
    /// Must not block the caller and must not run `action` inline.
    fn schedule(&self, delay: Duration, action: Action);
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn schedule(&self, delay: Duration, action: Action) {
        (**self).schedule(delay, action)
    }
}

/// The scheduler breakers use unless one is configured: an [`AutoScheduler`].
pub fn default_scheduler() -> SharedScheduler {
    Arc::new(AutoScheduler)
}

/// Resolves the runtime at schedule time rather than at construction.
///
/// Each action goes to the tokio runtime current at the call site, if any,
/// and to a [`ThreadScheduler`] otherwise. A breaker built inside a
/// short-lived runtime therefore keeps working after that runtime is gone.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoScheduler;

impl Scheduler for AutoScheduler {
    fn schedule(&self, delay: Duration, action: Action) {
        match Handle::try_current() {
            Ok(handle) => TokioScheduler::with_handle(handle).schedule(delay, action),
            Err(_) => ThreadScheduler.schedule(delay, action),
        }
    }
}

/// Schedules actions as tasks on a tokio runtime.
#[derive(Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Binds to the runtime of the calling context.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime. Use
    /// [`TokioScheduler::with_handle`] or [`default_scheduler`] otherwise.
    pub fn current() -> Self {
        Self {
            handle: Handle::current(),
        }
    }

    /// Binds to an explicit runtime handle.
    pub fn with_handle(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, action: Action) {
        let armed = Armed {
            deadline: Instant::now() + delay,
            action: Some(action),
        };
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            armed.fire();
        });
    }
}

/// An action owned by a tokio task.
///
/// Runtime shutdown drops pending tasks without polling them; dropping an
/// unfired action hands it to a thread for the rest of its delay.
struct Armed {
    deadline: Instant,
    action: Option<Action>,
}

impl Armed {
    fn fire(mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }
}

impl Drop for Armed {
    fn drop(&mut self) {
        if let Some(action) = self.action.take() {
            #[cfg(feature = "tracing")]
            tracing::debug!("tokio runtime dropped a pending action; moving it to a timer thread");
            let remaining = self.deadline.saturating_duration_since(Instant::now());
            ThreadScheduler.schedule(remaining, action);
        }
    }
}

impl fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler").finish_non_exhaustive()
    }
}

/// Schedules each action on its own detached OS thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn schedule(&self, delay: Duration, action: Action) {
        let spawned = std::thread::Builder::new()
            .name("fusebox-timer".into())
            .spawn(move || {
                std::thread::sleep(delay);
                action();
            });

        if let Err(_err) = spawned {
            #[cfg(feature = "tracing")]
            tracing::error!(error = %_err, "failed to spawn timer thread; delayed action dropped");
        }
    }
}

struct Pending {
    due: Duration,
    seq: u64,
    action: Action,
}

#[derive(Default)]
struct Queue {
    now: Duration,
    next_seq: u64,
    pending: Vec<Pending>,
}

/// A scheduler driven by a virtual clock.
///
/// Time starts at zero and moves only through [`advance`](Self::advance).
/// Actions that become due run in deadline order; actions with the same
/// deadline run in the order they were scheduled.
///
/// ```
/// use fusebox_core::scheduler::{ManualScheduler, Scheduler};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::{Duration, Instant};
///
/// let clock = ManualScheduler::new();
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&fired);
///
/// clock.schedule(Duration::from_secs(5), Box::new(move || flag.store(true, Ordering::SeqCst)));
///
/// clock.advance(Duration::from_secs(4));
/// assert!(!fired.load(Ordering::SeqCst));
///
/// clock.advance(Duration::from_secs(1));
/// assert!(fired.load(Ordering::SeqCst));
/// ```
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<Queue>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the virtual clock forward by `by`, running every action that
    /// falls due on the way.
    ///
    /// Actions run without the internal lock held, so they may schedule
    /// further actions; those run too if they fall due before the new time.
    pub fn advance(&self, by: Duration) {
        let target = self.lock().now + by;

        loop {
            let action = {
                let mut queue = self.lock();
                let next = queue
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(_, p)| (p.due, p.seq))
                    .map(|(idx, _)| idx);

                match next {
                    Some(idx) => {
                        let due = queue.pending.swap_remove(idx);
                        queue.now = due.due;
                        due.action
                    }
                    None => {
                        queue.now = target;
                        break;
                    }
                }
            };
            action();
        }
    }

    /// Number of actions that have not run yet.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Current virtual time since creation.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, action: Action) {
        let mut queue = self.lock();
        let due = queue.now + delay;
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.pending.push(Pending { due, seq, action });
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &queue.now)
            .field("pending", &queue.pending.len())
            .finish()
    }
}
