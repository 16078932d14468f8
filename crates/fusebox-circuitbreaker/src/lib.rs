//! A counting circuit breaker with timer-driven recovery.
//!
//! A circuit breaker guards calls to an unreliable dependency. After enough
//! failures it stops calling the dependency at all for a while, which gives the
//! dependency room to recover and keeps callers from piling up behind it.
//!
//! ## States
//! - **Closed**: calls pass through; failures are counted. Each counted failure
//!   is forgotten again after `failure_count_reset_timeout`.
//! - **Open**: reached when the failure count hits `threshold`. Calls fail fast
//!   with [`CircuitBreakerError::OpenCircuit`] without being attempted.
//! - **HalfOpen**: entered `half_open_timeout` after opening. The next outcome
//!   decides: success closes the circuit with a clean count, failure opens it
//!   for another full timeout.
//!
//! Successes while Closed do not reduce the failure count; only time does.
//!
//! ## Usage
//!
//! ```rust
//! use fusebox_circuitbreaker::{CallError, CircuitBreaker, CircuitBreakerError};
//! use std::time::Duration;
//!
//! # fn fetch_rates() -> Result<f64, std::io::Error> { Ok(1.0) }
//! let breaker = CircuitBreaker::new(3, Duration::from_secs(30), Duration::from_secs(60));
//!
//! match breaker.call(|| -> Result<f64, CallError<std::io::Error>> { Ok(fetch_rates()?) }) {
//!     Ok(rate) => println!("rate: {rate}"),
//!     Err(CircuitBreakerError::OpenCircuit) => println!("rates service unavailable"),
//!     Err(err) => println!("lookup failed: {err}"),
//! }
//! ```
//!
//! ### Async Calls
//!
//! ```rust
//! use fusebox_circuitbreaker::{CallError, CircuitBreaker};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::builder()
//!     .name("search")
//!     .threshold(5)
//!     .half_open_timeout(Duration::from_secs(10))
//!     .build();
//!
//! let hits = breaker
//!     .call_async(|| async { Ok::<_, CallError<std::io::Error>>(vec!["a", "b"]) })
//!     .await;
//! # }
//! ```
//!
//! ### Failures That Should Not Count
//!
//! Wrap an error in [`IgnoreError`] to report it to the caller without
//! holding it against the dependency:
//!
//! ```rust
//! use fusebox_circuitbreaker::{CallError, CircuitBreaker, IgnoreError};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::new(1, Duration::from_secs(30), Duration::from_secs(60));
//! let result = breaker.call(|| -> Result<(), CallError<String>> {
//!     Err(IgnoreError::new("validation failed".to_string()))?
//! });
//!
//! assert!(result.unwrap_err().is_ignored());
//! assert!(!breaker.is_open());
//! ```
//!
//! ### Partitioning
//!
//! [`PartitionedCircuitBreaker`] keeps one independent breaker per key, so one
//! failing host or tenant cannot trip the circuit for the others.
//!
//! ## Feature Flags
//! - `metrics`: call outcome counters, transition counters and state gauges via
//!   the `metrics` crate
//! - `tracing`: structured logs via the `tracing` crate
//! - `serde`: `Serialize` for [`CircuitState`] and [`BreakerView`]

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, gauge};
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use crate::state::{Effect, FailureCounter, State};

pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::{CallError, CircuitBreakerError, IgnoreError};
pub use events::{CircuitBreakerEvent, CircuitBreakerEventKind};
pub use layer::{CircuitBreakerLayer, CircuitBreakerService};
pub use partitioned::PartitionedCircuitBreaker;
pub use state::CircuitState;
pub use view::BreakerView;

mod config;
mod error;
mod events;
mod layer;
mod partitioned;
mod state;
mod view;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

#[cfg(feature = "metrics")]
pub(crate) fn describe_metrics() {
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "fusebox_calls_total",
            "Calls through a circuit breaker, by outcome"
        );
        describe_counter!(
            "fusebox_transitions_total",
            "Circuit breaker state transitions"
        );
        describe_gauge!(
            "fusebox_state",
            "Current circuit breaker state (0 = closed, 1 = open, 2 = half-open)"
        );
        describe_gauge!(
            "fusebox_partitions",
            "Number of breakers held by a partitioned registry"
        );
    });
}

/// A circuit breaker guarding one dependency.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<CircuitBreakerConfig>,
    name: String,
    state: Mutex<State>,
    // Mirrors the discriminant of `state`; written only with `state` locked.
    kind: AtomicU8,
}

impl CircuitBreaker {
    /// Creates a breaker that opens after `threshold` counted failures, probes
    /// again after `half_open_timeout`, and forgets each failure after
    /// `failure_count_reset_timeout`.
    ///
    /// # Panics
    ///
    /// Panics if `threshold` is zero.
    pub fn new(
        threshold: u64,
        half_open_timeout: Duration,
        failure_count_reset_timeout: Duration,
    ) -> Self {
        Self::builder()
            .threshold(threshold)
            .half_open_timeout(half_open_timeout)
            .failure_count_reset_timeout(failure_count_reset_timeout)
            .build()
    }

    /// Creates a new builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    pub(crate) fn from_config(config: Arc<CircuitBreakerConfig>, name: String) -> Self {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            breaker = %name,
            threshold = config.threshold,
            half_open_timeout = ?config.half_open_timeout,
            failure_count_reset_timeout = ?config.failure_count_reset_timeout,
            "creating circuit breaker"
        );

        Self {
            inner: Arc::new(Inner {
                config,
                name,
                state: Mutex::new(State::closed()),
                kind: AtomicU8::new(CircuitState::Closed as u8),
            }),
        }
    }

    /// Runs `f` through the breaker.
    ///
    /// Returns [`CircuitBreakerError::OpenCircuit`] without calling `f` when the
    /// circuit is open. Otherwise calls `f` exactly once and records the
    /// outcome: `Ok` and [`CallError::Ignored`] count as successes,
    /// [`CallError::Counted`] as a failure.
    pub fn call<T, E, F>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Result<T, CallError<E>>,
    {
        if !self.permit() {
            return Err(CircuitBreakerError::OpenCircuit);
        }
        self.settle(f())
    }

    /// Async counterpart of [`call`](Self::call).
    ///
    /// The breaker itself never waits; only the guarded future is awaited.
    pub async fn call_async<T, E, F, Fut>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CallError<E>>>,
    {
        if !self.permit() {
            return Err(CircuitBreakerError::OpenCircuit);
        }
        let result = f().await;
        self.settle(result)
    }

    /// Records a counted failure without going through [`call`](Self::call).
    ///
    /// Closed: counts it, trips at the threshold, and schedules the failure to
    /// be forgotten after the reset timeout. HalfOpen: trips. Open: nothing
    /// changes; the notification is reported as an anomaly.
    pub fn record_failure(&self) {
        let state = self.current();
        let effects = state.on_failure(self.inner.config.threshold);
        let failure_count = state.failure_count();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            breaker = %self.inner.name,
            state = %state.kind(),
            failure_count = ?failure_count,
            threshold = self.inner.config.threshold,
            "failure recorded"
        );

        #[cfg(feature = "metrics")]
        counter!("fusebox_calls_total", "breaker" => self.inner.name.clone(), "outcome" => "failure")
            .increment(1);

        self.inner
            .config
            .event_listeners
            .emit_with(CircuitBreakerEventKind::FailureRecorded, || CircuitBreakerEvent::FailureRecorded {
                name: self.inner.name.clone(),
                timestamp: Instant::now(),
                state: state.kind(),
                failure_count,
            });

        self.apply(effects);
    }

    /// Records a success without going through [`call`](Self::call).
    ///
    /// Only a HalfOpen circuit reacts: it closes with a fresh count.
    pub fn record_success(&self) {
        let state = self.current();

        #[cfg(feature = "metrics")]
        counter!("fusebox_calls_total", "breaker" => self.inner.name.clone(), "outcome" => "success")
            .increment(1);

        self.inner
            .config
            .event_listeners
            .emit_with(CircuitBreakerEventKind::SuccessRecorded, || CircuitBreakerEvent::SuccessRecorded {
                name: self.inner.name.clone(),
                timestamp: Instant::now(),
                state: state.kind(),
            });

        self.apply(state.on_success());
    }

    /// Opens the circuit and arms the half-open timer.
    ///
    /// When the timer fires the circuit moves to HalfOpen only if it is still
    /// open at that moment.
    pub fn force_open(&self) {
        self.replace(State::Open);

        let breaker = Arc::downgrade(&self.inner);
        self.inner.config.scheduler.schedule(
            self.inner.config.half_open_timeout,
            Box::new(move || promote_to_half_open(&breaker)),
        );
    }

    /// Moves the circuit to HalfOpen.
    pub fn force_half_open(&self) {
        self.replace(State::HalfOpen);
    }

    /// Closes the circuit with a brand-new failure count.
    ///
    /// Decays still pending for earlier failures keep pointing at the old
    /// count and no longer affect this breaker.
    pub fn force_closed(&self) {
        self.replace(State::closed());
    }

    /// Current state. Lock-free.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.inner.kind.load(Ordering::Acquire))
    }

    /// Returns whether the circuit is currently open.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Live failure count, or `None` when the circuit is not closed.
    pub fn failure_count(&self) -> Option<u64> {
        self.current().failure_count()
    }

    /// Returns a read-only snapshot for diagnostics.
    pub fn view(&self) -> BreakerView {
        let state = self.current();
        BreakerView {
            name: self.inner.name.clone(),
            threshold: self.inner.config.threshold,
            state: state.kind(),
            failure_count: state.failure_count(),
            half_open_timeout: self.inner.config.half_open_timeout,
            failure_count_reset_timeout: self.inner.config.failure_count_reset_timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn threshold(&self) -> u64 {
        self.inner.config.threshold
    }

    pub fn half_open_timeout(&self) -> Duration {
        self.inner.config.half_open_timeout
    }

    pub fn failure_count_reset_timeout(&self) -> Duration {
        self.inner.config.failure_count_reset_timeout
    }

    /// Returns a tower layer that routes every request through this breaker.
    pub fn layer(&self) -> CircuitBreakerLayer {
        CircuitBreakerLayer::new(self.clone())
    }

    fn permit(&self) -> bool {
        let state = self.state();

        if state == CircuitState::Open {
            #[cfg(feature = "tracing")]
            tracing::trace!(breaker = %self.inner.name, "circuit breaker rejected call (circuit open)");

            #[cfg(feature = "metrics")]
            counter!("fusebox_calls_total", "breaker" => self.inner.name.clone(), "outcome" => "rejected")
                .increment(1);

            self.inner
                .config
                .event_listeners
                .emit_with(CircuitBreakerEventKind::CallRejected, || CircuitBreakerEvent::CallRejected {
                    name: self.inner.name.clone(),
                    timestamp: Instant::now(),
                });
            return false;
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(breaker = %self.inner.name, state = %state, "circuit breaker permitted call");

        self.inner
            .config
            .event_listeners
            .emit_with(CircuitBreakerEventKind::CallPermitted, || CircuitBreakerEvent::CallPermitted {
                name: self.inner.name.clone(),
                timestamp: Instant::now(),
                state,
            });
        true
    }

    fn settle<T, E>(&self, result: Result<T, CallError<E>>) -> Result<T, CircuitBreakerError<E>> {
        match result {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(CallError::Counted(err)) => {
                self.record_failure();
                Err(CircuitBreakerError::Inner(err))
            }
            Err(CallError::Ignored(err)) => {
                self.record_ignored();
                Err(CircuitBreakerError::Ignored(err.into_inner()))
            }
        }
    }

    fn record_ignored(&self) {
        let state = self.current();

        #[cfg(feature = "tracing")]
        tracing::debug!(breaker = %self.inner.name, state = %state.kind(), "ignored failure recorded as success");

        #[cfg(feature = "metrics")]
        counter!("fusebox_calls_total", "breaker" => self.inner.name.clone(), "outcome" => "ignored")
            .increment(1);

        self.inner
            .config
            .event_listeners
            .emit_with(CircuitBreakerEventKind::FailureIgnored, || CircuitBreakerEvent::FailureIgnored {
                name: self.inner.name.clone(),
                timestamp: Instant::now(),
                state: state.kind(),
            });

        self.apply(state.on_success());
    }

    fn apply(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Trip => self.force_open(),
                Effect::Recover => {
                    self.log_line(format_args!("half-open probe succeeded; closing circuit"));
                    self.force_closed();
                }
                Effect::Decay(counter) => self.schedule_decay(counter),
                Effect::Anomaly => self.report_anomaly(),
            }
        }
    }

    fn schedule_decay(&self, counter: Arc<FailureCounter>) {
        self.inner.config.scheduler.schedule(
            self.inner.config.failure_count_reset_timeout,
            Box::new(move || {
                counter.decrement();
            }),
        );
    }

    fn report_anomaly(&self) {
        #[cfg(feature = "tracing")]
        tracing::warn!(breaker = %self.inner.name, "failure recorded while circuit is open");

        self.log_line(format_args!(
            "failure recorded while circuit is open; ignoring"
        ));

        self.inner
            .config
            .event_listeners
            .emit_with(CircuitBreakerEventKind::Anomaly, || CircuitBreakerEvent::Anomaly {
                name: self.inner.name.clone(),
                timestamp: Instant::now(),
            });
    }

    fn current(&self) -> State {
        self.inner.lock_state().clone()
    }

    fn replace(&self, next: State) {
        let to = next.kind();
        let from = {
            let mut state = self.inner.lock_state();
            let from = state.kind();
            *state = next;
            self.inner.kind.store(to as u8, Ordering::Release);
            from
        };

        if from != to {
            self.inner.on_transition(from, to);
        }
    }

    fn log_line(&self, message: std::fmt::Arguments<'_>) {
        self.inner.log_line(message);
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("threshold", &self.inner.config.threshold)
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_transition(&self, from: CircuitState, to: CircuitState) {
        #[cfg(feature = "tracing")]
        tracing::info!(breaker = %self.name, from = %from, to = %to, "circuit breaker state transition");

        #[cfg(feature = "metrics")]
        {
            counter!(
                "fusebox_transitions_total",
                "breaker" => self.name.clone(),
                "from" => from.as_str(),
                "to" => to.as_str()
            )
            .increment(1);
            gauge!("fusebox_state", "breaker" => self.name.clone()).set(to as u8 as f64);
        }

        self.log_line(format_args!("{from} -> {to}"));

        self.config
            .event_listeners
            .emit_with(CircuitBreakerEventKind::StateTransition, || CircuitBreakerEvent::StateTransition {
                name: self.name.clone(),
                timestamp: Instant::now(),
                from_state: from,
                to_state: to,
            });
    }

    fn log_line(&self, message: std::fmt::Arguments<'_>) {
        if let Some(logger) = &self.config.logger {
            logger.write_line(&format!("circuit breaker {}: {message}", self.name));
        }
    }
}

/// Half-open timer body. Checks and swaps under one lock so a stale timer
/// can never overwrite a state the breaker reached after it was armed.
fn promote_to_half_open(breaker: &Weak<Inner>) {
    let Some(inner) = breaker.upgrade() else {
        return;
    };

    let promoted = {
        let mut state = inner.lock_state();
        if state.kind() == CircuitState::Open {
            *state = State::HalfOpen;
            inner
                .kind
                .store(CircuitState::HalfOpen as u8, Ordering::Release);
            true
        } else {
            false
        }
    };

    if promoted {
        inner.on_transition(CircuitState::Open, CircuitState::HalfOpen);
    }
}
