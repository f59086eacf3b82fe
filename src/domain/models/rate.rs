//! RateBucket domain model (spec §3 "RateBucket", §4.3).

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Key identifying a rate bucket: `(principal, scope)` where scope is a
/// tool name, agent id, or provider id (spec §4.3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateKey {
    pub principal: String,
    pub scope: String,
}

impl RateKey {
    pub fn new(principal: impl Into<String>, scope: impl Into<String>) -> Self {
        Self { principal: principal.into(), scope: scope.into() }
    }
}

/// Sliding-window admission state for one `RateKey`. Created lazily;
/// expires after an idle threshold (spec §3).
#[derive(Debug, Clone)]
pub struct RateBucket {
    pub key: RateKey,
    pub window: Duration,
    pub limit: u32,
    timestamps: VecDeque<Instant>,
    pub last_touched: Instant,
}

impl RateBucket {
    pub fn new(key: RateKey, window: Duration, limit: u32) -> Self {
        let now = Instant::now();
        Self { key, window, limit, timestamps: VecDeque::new(), last_touched: now }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&front) = self.timestamps.front() {
            if now.duration_since(front) > self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Attempt to admit a request at `now`. Returns `Ok(())` if admitted
    /// (recording the timestamp), or `Err(retry_after)` if the window is
    /// exhausted. Never blocks (spec §4.3 "Never blocks").
    pub fn try_admit(&mut self, now: Instant) -> Result<(), Duration> {
        self.last_touched = now;
        self.prune(now);
        if self.timestamps.len() < self.limit as usize {
            self.timestamps.push_back(now);
            Ok(())
        } else {
            let oldest = *self.timestamps.front().expect("len checked above");
            let retry_after = self.window.saturating_sub(now.duration_since(oldest));
            Err(retry_after)
        }
    }

    pub fn is_idle(&self, now: Instant, idle_threshold: Duration) -> bool {
        now.duration_since(self.last_touched) > idle_threshold
    }

    pub fn current_count(&self) -> usize {
        self.timestamps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_limit_then_denies() {
        let mut bucket = RateBucket::new(RateKey::new("u1", "tool_x"), Duration::from_secs(60), 5);
        let now = Instant::now();
        for _ in 0..5 {
            assert!(bucket.try_admit(now).is_ok());
        }
        let err = bucket.try_admit(now);
        assert!(err.is_err());
    }

    #[test]
    fn admits_again_after_window_elapses() {
        let mut bucket = RateBucket::new(RateKey::new("u1", "tool_x"), Duration::from_millis(20), 1);
        let now = Instant::now();
        assert!(bucket.try_admit(now).is_ok());
        assert!(bucket.try_admit(now).is_err());
        let later = now + Duration::from_millis(25);
        assert!(bucket.try_admit(later).is_ok());
    }
}
