//! Property tests for the circuit breaker.
//!
//! Invariants tested:
//! - Opens after exactly `threshold` consecutive failures
//! - Never invokes the guarded function while open
//! - A closed breaker's count stays below its threshold
//! - The count never exceeds the failures of the last reset window
//! - Ignored errors never move the count

use fusebox_circuitbreaker::{
    CallError, CircuitBreaker, CircuitBreakerError, CircuitState, IgnoreError,
};
use fusebox_core::ManualScheduler;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

const RESET_MS: u64 = 1_000;
const HALF_OPEN_MS: u64 = 3_000;

#[derive(Debug, Clone)]
enum Op {
    Fail,
    Succeed,
    Ignore,
    Advance(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Fail),
        2 => Just(Op::Succeed),
        1 => Just(Op::Ignore),
        2 => (1u64..2_500).prop_map(Op::Advance),
    ]
}

fn breaker(threshold: u64) -> (CircuitBreaker, Arc<ManualScheduler>) {
    let clock = Arc::new(ManualScheduler::new());
    let breaker = CircuitBreaker::builder()
        .threshold(threshold)
        .half_open_timeout(Duration::from_millis(HALF_OPEN_MS))
        .failure_count_reset_timeout(Duration::from_millis(RESET_MS))
        .scheduler(Arc::clone(&clock))
        .build();
    (breaker, clock)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: T consecutive failures open the breaker, T - 1 do not
    #[test]
    fn opens_after_threshold_failures(threshold in 1u64..=50) {
        let (breaker, _clock) = breaker(threshold);

        for _ in 1..threshold {
            let _ = breaker.call(|| Err::<(), _>(CallError::Counted(())));
        }
        prop_assert_eq!(breaker.state(), CircuitState::Closed);

        let _ = breaker.call(|| Err::<(), _>(CallError::Counted(())));
        prop_assert_eq!(breaker.state(), CircuitState::Open);

        let mut invoked = false;
        let result = breaker.call(|| {
            invoked = true;
            Ok::<_, CallError<()>>(())
        });
        prop_assert_eq!(result, Err(CircuitBreakerError::OpenCircuit));
        prop_assert!(!invoked);
    }

    /// Property: invariants hold after every step of a random workload
    #[test]
    fn invariants_hold_for_random_workloads(
        threshold in 1u64..=6,
        ops in prop::collection::vec(op(), 1..120),
    ) {
        let (breaker, clock) = breaker(threshold);
        let mut failures_at: Vec<u64> = Vec::new();

        for op in ops {
            let before = breaker.state();
            let now = clock.now().as_millis() as u64;

            match op {
                Op::Fail => {
                    let mut invoked = false;
                    let _ = breaker.call(|| {
                        invoked = true;
                        Err::<(), _>(CallError::Counted(()))
                    });
                    prop_assert_eq!(invoked, before != CircuitState::Open);
                    if before == CircuitState::Closed {
                        failures_at.push(now);
                    }
                }
                Op::Succeed => {
                    let mut invoked = false;
                    let _ = breaker.call(|| {
                        invoked = true;
                        Ok::<_, CallError<()>>(())
                    });
                    prop_assert_eq!(invoked, before != CircuitState::Open);
                    if before == CircuitState::HalfOpen {
                        prop_assert_eq!(breaker.failure_count(), Some(0));
                        failures_at.clear();
                    }
                }
                Op::Ignore => {
                    let count = breaker.failure_count();
                    let _ = breaker.call(|| -> Result<(), CallError<()>> {
                        Err(IgnoreError::new(()))?
                    });
                    if before == CircuitState::Closed {
                        prop_assert_eq!(breaker.failure_count(), count);
                    }
                    if before == CircuitState::HalfOpen {
                        failures_at.clear();
                    }
                }
                Op::Advance(ms) => clock.advance(Duration::from_millis(ms)),
            }

            let view = breaker.view();
            match view.state {
                CircuitState::Closed => {
                    let count = view.failure_count.unwrap_or(u64::MAX);
                    prop_assert!(count < threshold);

                    let now = clock.now().as_millis() as u64;
                    let recent = failures_at.iter().filter(|&&t| t + RESET_MS > now).count() as u64;
                    prop_assert!(count <= recent, "count {} > recent failures {}", count, recent);
                }
                CircuitState::Open | CircuitState::HalfOpen => {
                    prop_assert_eq!(view.failure_count, None);
                }
            }
        }
    }

    /// Property: ignored errors never trip the breaker
    #[test]
    fn ignored_errors_never_trip(threshold in 1u64..=10, repeats in 1usize..100) {
        let (breaker, _clock) = breaker(threshold);

        for _ in 0..repeats {
            let result = breaker.call(|| -> Result<(), CallError<&str>> {
                Err(IgnoreError::new("ignored"))?
            });
            prop_assert_eq!(result, Err(CircuitBreakerError::Ignored("ignored")));
        }

        prop_assert_eq!(breaker.state(), CircuitState::Closed);
        prop_assert_eq!(breaker.failure_count(), Some(0));
    }
}
