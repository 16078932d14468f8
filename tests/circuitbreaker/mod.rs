//! Tests for the circuit breaker.
//!
//! Test organization:
//! - integration.rs: End-to-end scenarios on the tokio clock
//! - thresholds.rs: Tripping exactly at the threshold
//! - concurrency.rs: Concurrent failures and lost-update checks
//! - half_open.rs: Probing and recovery
//! - decay.rs: Failure count decay
//! - reordering.rs: Stale and overlapping timers
//! - ignore.rs: IgnoreError semantics
//! - partitioned.rs: Per-key registry
//! - listeners.rs: Event listeners and the text sink
//! - tracing_output.rs: Diagnostics emitted through tracing
//! - view.rs: Snapshots and serialization
//! - layer.rs: Tower integration
//! - edge_cases.rs: Protocol misuse and odd configurations

mod thresholds;
mod tracing_output;
mod view;

use fusebox_circuitbreaker::{CallError, CircuitBreaker};
use fusebox_core::ManualScheduler;
use std::sync::Arc;
use std::time::Duration;

pub(crate) type Outcome = Result<&'static str, CallError<&'static str>>;

pub(crate) fn ok() -> Outcome {
    Ok("ok")
}

pub(crate) fn fail() -> Outcome {
    Err(CallError::Counted("fail"))
}

/// A breaker driven by a virtual clock: half-open after 3s, decay after 1s.
pub(crate) fn manual_breaker(threshold: u64) -> (CircuitBreaker, Arc<ManualScheduler>) {
    let clock = Arc::new(ManualScheduler::new());
    let breaker = CircuitBreaker::builder()
        .name("manual")
        .threshold(threshold)
        .half_open_timeout(Duration::from_secs(3))
        .failure_count_reset_timeout(Duration::from_secs(1))
        .scheduler(Arc::clone(&clock))
        .build();
    (breaker, clock)
}
