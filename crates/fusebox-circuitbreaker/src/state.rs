use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Discriminant of the breaker's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[repr(u8)]
pub enum CircuitState {
    /// Calls are attempted and failures are counted.
    Closed = 0,
    /// Calls are rejected without being attempted.
    Open = 1,
    /// Calls are attempted to probe whether the dependency recovered.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Lower camel case name: `closed`, `open` or `halfOpen`.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "halfOpen",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure counter owned by one Closed state instance.
///
/// Incremented and decremented lock-free. A decay action holds its own `Arc`
/// to the counter that was live when the failure happened, so once the
/// breaker moves on, late decrements land on a detached counter nobody reads.
#[derive(Debug, Default)]
pub(crate) struct FailureCounter {
    failures: AtomicU64,
}

impl FailureCounter {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Adds one failure and returns the new count.
    pub(crate) fn increment(&self) -> u64 {
        self.failures.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Forgets one failure. Never goes below zero.
    pub(crate) fn decrement(&self) -> u64 {
        match self
            .failures
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(previous) => previous - 1,
            Err(_) => 0,
        }
    }

    pub(crate) fn get(&self) -> u64 {
        self.failures.load(Ordering::Acquire)
    }
}

/// The breaker's active state. Replaced wholesale on every transition.
#[derive(Debug, Clone)]
pub(crate) enum State {
    Closed(Arc<FailureCounter>),
    Open,
    HalfOpen,
}

/// Work a state reaction asks the breaker to carry out.
#[derive(Debug)]
pub(crate) enum Effect {
    /// Replace the state with Open and arm the half-open timer.
    Trip,
    /// Replace the state with a fresh Closed.
    Recover,
    /// Decrement this counter once the reset timeout elapses.
    Decay(Arc<FailureCounter>),
    /// A failure arrived while already Open.
    Anomaly,
}

impl State {
    pub(crate) fn closed() -> Self {
        State::Closed(FailureCounter::new())
    }

    pub(crate) fn kind(&self) -> CircuitState {
        match self {
            State::Closed(_) => CircuitState::Closed,
            State::Open => CircuitState::Open,
            State::HalfOpen => CircuitState::HalfOpen,
        }
    }

    pub(crate) fn failure_count(&self) -> Option<u64> {
        match self {
            State::Closed(counter) => Some(counter.get()),
            _ => None,
        }
    }

    /// Reaction to a failed call.
    ///
    /// Closed counts the failure (tripping at `threshold`) and always arms a
    /// decay for its own counter. HalfOpen trips unconditionally. Open has
    /// nothing to do; reaching it means the caller bypassed the fast path.
    pub(crate) fn on_failure(&self, threshold: u64) -> Vec<Effect> {
        match self {
            State::Closed(counter) => {
                let failures = counter.increment();
                let mut effects = Vec::with_capacity(2);
                if failures >= threshold {
                    effects.push(Effect::Trip);
                }
                effects.push(Effect::Decay(Arc::clone(counter)));
                effects
            }
            State::HalfOpen => vec![Effect::Trip],
            State::Open => vec![Effect::Anomaly],
        }
    }

    /// Reaction to a successful (or ignored) call.
    ///
    /// Only HalfOpen reacts. Success while Closed does not forgive earlier
    /// failures; only decay does.
    pub(crate) fn on_success(&self) -> Vec<Effect> {
        match self {
            State::HalfOpen => vec![Effect::Recover],
            State::Closed(_) | State::Open => Vec::new(),
        }
    }
}
