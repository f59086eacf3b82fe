//! In-flight request deduplication (spec §4.5 / C5).
//!
//! Concurrent identical requests (same fingerprint) coalesce onto a single
//! upstream call; all callers observe its result. Grounded on the
//! teacher's `tokio::sync::watch` fan-out usage elsewhere in the services
//! layer for single-writer/many-reader broadcast of a value that settles
//! once.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::{KernelError, KernelResult};
use crate::domain::models::cache_entry::Fingerprint;

#[derive(Debug, Clone)]
enum Slot {
    Pending(watch::Receiver<Option<KernelResult<String>>>),
}

/// Coalesces concurrent calls sharing the same fingerprint onto a single
/// in-flight upstream invocation.
pub struct Deduplicator {
    inflight: Arc<tokio::sync::Mutex<HashMap<Fingerprint, Slot>>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self { inflight: Arc::new(tokio::sync::Mutex::new(HashMap::new())) }
    }

    /// Run `call` if no identical request is in flight, otherwise await the
    /// in-flight call's result. `cancel` allows an individual awaiter to
    /// stop waiting without affecting the other awaiters or the in-flight
    /// call itself (spec §5 cooperative cancellation).
    pub async fn run_or_join<F>(
        &self,
        key: Fingerprint,
        cancel: CancellationToken,
        call: F,
    ) -> KernelResult<String>
    where
        F: std::future::Future<Output = KernelResult<String>>,
    {
        let mut existing_rx = None;
        {
            let mut inflight = self.inflight.lock().await;
            match inflight.get(&key) {
                Some(Slot::Pending(rx)) => existing_rx = Some(rx.clone()),
                None => {
                    let (_tx, rx) = watch::channel(None);
                    inflight.insert(key.clone(), Slot::Pending(rx));
                }
            }
        }

        if let Some(mut rx) = existing_rx {
            tokio::select! {
                _ = cancel.cancelled() => Err(KernelError::Cancelled),
                changed = rx.changed() => {
                    changed.map_err(|_| KernelError::InternalInvariant("dedup sender dropped".to_string()))?;
                    rx.borrow().clone().ok_or_else(|| {
                        KernelError::InternalInvariant("dedup settled with no value".to_string())
                    })?
                }
            }
        } else {
            // We are the leader: recreate the channel with a sender we own
            // so followers see the real result, and run the call.
            let (tx, rx) = watch::channel(None);
            {
                let mut inflight = self.inflight.lock().await;
                inflight.insert(key.clone(), Slot::Pending(rx));
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => Err(KernelError::Cancelled),
                result = call => result,
            };

            let _ = tx.send(Some(result.clone()));
            self.inflight.lock().await.remove(&key);
            result
        }
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new()
    }
}
