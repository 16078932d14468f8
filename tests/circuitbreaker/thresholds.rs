use super::{fail, manual_breaker, ok};
use fusebox_circuitbreaker::{CircuitBreakerError, CircuitState};
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn opens_exactly_at_threshold() {
    for threshold in 1..=12u64 {
        let (breaker, _clock) = manual_breaker(threshold);

        for n in 1..threshold {
            let _ = breaker.call(fail);
            assert_eq!(breaker.state(), CircuitState::Closed, "threshold {threshold}");
            assert_eq!(breaker.failure_count(), Some(n));
        }

        let _ = breaker.call(fail);
        assert_eq!(breaker.state(), CircuitState::Open, "threshold {threshold}");
    }
}

#[test]
fn call_after_tripping_is_not_attempted() {
    let (breaker, _clock) = manual_breaker(4);
    for _ in 0..4 {
        let _ = breaker.call(fail);
    }

    let attempted = AtomicUsize::new(0);
    let result = breaker.call(|| {
        attempted.fetch_add(1, Ordering::SeqCst);
        ok()
    });

    assert_eq!(result, Err(CircuitBreakerError::OpenCircuit));
    assert_eq!(attempted.load(Ordering::SeqCst), 0);
}

#[test]
fn interleaved_successes_do_not_reset_the_count() {
    let (breaker, _clock) = manual_breaker(3);

    let _ = breaker.call(fail);
    let _ = breaker.call(ok);
    let _ = breaker.call(fail);
    let _ = breaker.call(ok);
    assert_eq!(breaker.failure_count(), Some(2));

    let _ = breaker.call(fail);
    assert!(breaker.is_open());
}

#[test]
fn threshold_of_one_trips_on_first_failure() {
    let (breaker, _clock) = manual_breaker(1);
    assert_eq!(breaker.call(fail), Err(CircuitBreakerError::Inner("fail")));
    assert!(breaker.is_open());
}
