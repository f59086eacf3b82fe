//! Rate limit denial then admitted-after-window scenario. Uses a window
//! scaled down from the spec's literal 60s to keep the test fast; the
//! limit (5 calls) matches the spec's literal value.

use std::time::Duration;

use amas_kernel::domain::errors::KernelError;
use amas_kernel::services::rate_limiter::{InMemoryRateLimiter, RateLimitRule};

#[tokio::test]
async fn sixth_call_denied_then_admitted_after_window_passes() {
    let limiter = InMemoryRateLimiter::new();
    let rule = RateLimitRule { limit: 5, window: Duration::from_millis(120) };

    for _ in 0..5 {
        limiter.admit("u", "file_write", rule).await.expect("within limit");
    }

    let denied = limiter.admit("u", "file_write", rule).await.unwrap_err();
    let KernelError::RateLimited { retry_after } = denied else {
        panic!("expected RateLimited");
    };
    assert!(retry_after > Duration::ZERO);

    tokio::time::sleep(rule.window + Duration::from_millis(20)).await;
    limiter.admit("u", "file_write", rule).await.expect("admitted once the window has rolled over");
}
