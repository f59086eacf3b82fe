//! Property tests for rate limiter admission counting and cache fingerprint
//! stability, in the style of `property_dependency_resolver.rs`.

use std::time::Duration;

use amas_kernel::services::cache::fingerprint;
use amas_kernel::services::rate_limiter::{InMemoryRateLimiter, RateLimitRule};
use proptest::prelude::*;

proptest! {
    /// Property: exactly `limit` calls are admitted within a window, and the
    /// (limit + 1)th call in the same window is always denied, regardless of
    /// the limit chosen.
    #[test]
    fn prop_admits_exactly_limit_calls_per_window(limit in 1u32..20) {
        let rule = RateLimitRule { limit, window: Duration::from_secs(60) };
        let runtime = tokio::runtime::Runtime::new().unwrap();

        runtime.block_on(async {
            let limiter = InMemoryRateLimiter::new();
            for i in 0..limit {
                prop_assert!(
                    limiter.admit("alice", "tool", rule).await.is_ok(),
                    "call {} should be admitted (limit {})", i, limit
                );
            }
            prop_assert!(limiter.admit("alice", "tool", rule).await.is_err());
            Ok(())
        })?;
    }

    /// Property: distinct principals never share a quota.
    #[test]
    fn prop_principals_have_independent_quotas(limit in 1u32..10, principal_count in 2usize..8) {
        let rule = RateLimitRule { limit, window: Duration::from_secs(60) };
        let runtime = tokio::runtime::Runtime::new().unwrap();

        runtime.block_on(async {
            let limiter = InMemoryRateLimiter::new();
            for p in 0..principal_count {
                let principal = format!("principal-{p}");
                for _ in 0..limit {
                    prop_assert!(limiter.admit(&principal, "tool", rule).await.is_ok());
                }
            }
            Ok(())
        })?;
    }

    /// Property: the fingerprint function is a pure, deterministic function
    /// of its three inputs, and differs whenever any one input differs
    /// (spec §3 `CacheEntry.key` identity).
    #[test]
    fn prop_fingerprint_is_deterministic_and_input_sensitive(
        agent in "[a-z]{1,8}",
        prompt_a in "[a-z ]{1,16}",
        prompt_b in "[a-z ]{1,16}",
    ) {
        let options = "general";
        let first = fingerprint(&agent, &prompt_a, options);
        let repeat = fingerprint(&agent, &prompt_a, options);
        prop_assert_eq!(first.0.clone(), repeat.0);

        if prompt_a != prompt_b {
            let second = fingerprint(&agent, &prompt_b, options);
            prop_assert_ne!(first.0, second.0);
        }
    }
}
