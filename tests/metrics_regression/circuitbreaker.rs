//! Circuit breaker metrics regression tests

use super::helpers::{assert_series, init_recorder, Kind};
use fusebox_circuitbreaker::{CallError, CircuitBreaker, IgnoreError};
use fusebox_core::ManualScheduler;
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;

#[test]
#[serial]
fn every_call_outcome_is_counted_per_breaker() {
    init_recorder();

    let breaker = CircuitBreaker::builder()
        .name("test_cb")
        .threshold(2)
        .half_open_timeout(Duration::from_secs(1))
        .scheduler(ManualScheduler::new())
        .build();

    let _ = breaker.call(|| Ok::<_, CallError<&str>>(()));
    let _ = breaker.call(|| -> Result<(), CallError<&str>> { Err(IgnoreError::new("skip"))? });
    let _ = breaker.call(|| Err::<(), _>(CallError::Counted("fail")));
    let _ = breaker.call(|| Err::<(), _>(CallError::Counted("fail")));
    let _ = breaker.call(|| Ok::<_, CallError<&str>>(()));

    for outcome in ["success", "failure", "ignored", "rejected"] {
        assert_series(
            Kind::Counter,
            "fusebox_calls_total",
            &[("breaker", "test_cb"), ("outcome", outcome)],
        );
    }
    assert_series(
        Kind::Counter,
        "fusebox_transitions_total",
        &[("breaker", "test_cb"), ("from", "closed"), ("to", "open")],
    );
    assert_series(Kind::Gauge, "fusebox_state", &[("breaker", "test_cb")]);
}

#[test]
#[serial]
fn half_open_transition_is_labelled_in_camel_case() {
    init_recorder();

    let clock = Arc::new(ManualScheduler::new());
    let breaker = CircuitBreaker::builder()
        .name("camel_cb")
        .threshold(1)
        .half_open_timeout(Duration::from_secs(1))
        .scheduler(Arc::clone(&clock))
        .build();

    breaker.force_open();
    clock.advance(Duration::from_secs(1));

    assert_series(
        Kind::Counter,
        "fusebox_transitions_total",
        &[("breaker", "camel_cb"), ("from", "open"), ("to", "halfOpen")],
    );
}
