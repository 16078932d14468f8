//! Property tests for the partitioned registry.
//!
//! Invariants tested:
//! - One breaker per distinct key, however keys repeat
//! - Failures on one key never show up on another

use fusebox_circuitbreaker::{CallError, PartitionedCircuitBreaker};
use fusebox_core::ManualScheduler;
use proptest::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: per-key counts match a per-key model
    #[test]
    fn partitions_never_share_failures(keys in prop::collection::vec(0u8..8, 1..200)) {
        let registry = PartitionedCircuitBreaker::builder()
            .threshold(u64::MAX)
            .failure_count_reset_timeout(Duration::from_secs(60))
            .scheduler(ManualScheduler::new())
            .build_partitioned();
        let mut expected: HashMap<u8, u64> = HashMap::new();

        for key in &keys {
            let _ = registry.call(key, || Err::<(), _>(CallError::Counted(())));
            *expected.entry(*key).or_default() += 1;
        }

        prop_assert_eq!(registry.len(), expected.len());
        for (key, count) in expected {
            let breaker = registry.get(&key);
            prop_assert!(breaker.is_some());
            prop_assert_eq!(breaker.and_then(|b| b.failure_count()), Some(count));
        }
    }
}
