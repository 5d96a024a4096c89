//! Property tests for the retry policy.
//!
//! Invariants tested:
//! - The budget is exhausted exactly at `max_retries` failures
//! - Exponential delays never decrease and never exceed the cap

use std::time::Duration;

use historias_db::RetryPolicy;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: exhaustion is `failed_attempts >= max_retries`
    #[test]
    fn exhaustion_threshold(max_retries in 0u32..20, failed in 0u32..40) {
        let policy = RetryPolicy::fixed(max_retries, Duration::from_millis(1));
        prop_assert_eq!(policy.is_exhausted(failed), failed >= max_retries);
    }

    /// Property: exponential backoff is monotonic and capped
    #[test]
    fn exponential_backoff_is_capped(
        initial_ms in 1u64..500,
        max_ms in 500u64..10_000,
        attempts in 1u32..64,
    ) {
        let max = Duration::from_millis(max_ms);
        let policy = RetryPolicy::exponential(10, Duration::from_millis(initial_ms), max);

        let mut previous = Duration::ZERO;
        for attempt in 1..=attempts {
            let delay = policy.delay_for_attempt(attempt);
            prop_assert!(delay <= max);
            prop_assert!(delay >= previous);
            previous = delay;
        }
    }
}
