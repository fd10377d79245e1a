//! In-flight cache key coordination.
//!
//! Concurrent requests for the same cache key collapse into a single
//! conversion: the first request claims the key and every other request
//! waits until the claim is released, then finds the finished entry in the
//! cache. Claiming is a single check-and-set under one mutex, so there is
//! no window between "observed free" and "marked busy". The mutex is held
//! only for set reads/writes, never across I/O or awaits.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

/// Fallback wakeup interval for waiters; a lost release notification only
/// costs one interval of staleness.
const CLAIM_RETRY_INTERVAL: Duration = Duration::from_millis(200);

/// Registry of cache keys with a conversion currently in flight.
#[derive(Clone, Debug, Default)]
pub struct KeyCoordinator {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    busy: Mutex<HashSet<String>>,
    released: Notify,
}

impl KeyCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `key` if it is free. Check-and-set in one critical section.
    pub fn try_claim(&self, key: &str) -> Option<KeyClaim> {
        let mut busy = self.lock_busy();
        if busy.insert(key.to_string()) {
            Some(KeyClaim {
                key: key.to_string(),
                inner: Arc::clone(&self.inner),
            })
        } else {
            None
        }
    }

    /// Waits until `key` is free, then claims it.
    pub async fn claim(&self, key: &str) -> KeyClaim {
        loop {
            if let Some(claim) = self.try_claim(key) {
                return claim;
            }
            let _ = tokio::time::timeout(CLAIM_RETRY_INTERVAL, self.inner.released.notified())
                .await;
        }
    }

    /// Whether `key` currently has a live claim.
    pub fn is_busy(&self, key: &str) -> bool {
        self.lock_busy().contains(key)
    }

    fn lock_busy(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // a poisoned set is still structurally valid
        self.inner
            .busy
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// RAII claim on a cache key.
///
/// Dropping the claim releases the key and wakes all waiters, so release
/// happens on every exit path, panics included.
#[derive(Debug)]
pub struct KeyClaim {
    key: String,
    inner: Arc<Inner>,
}

impl KeyClaim {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyClaim {
    fn drop(&mut self) {
        {
            let mut busy = self
                .inner
                .busy
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            busy.remove(&self.key);
        }
        self.inner.released.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn second_claim_on_same_key_waits() {
        let coordinator = KeyCoordinator::new();

        let claim = coordinator.claim("abc.mp4").await;
        assert!(coordinator.is_busy("abc.mp4"));
        assert!(coordinator.try_claim("abc.mp4").is_none());

        drop(claim);
        assert!(!coordinator.is_busy("abc.mp4"));
        assert!(coordinator.try_claim("abc.mp4").is_some());
    }

    #[tokio::test]
    async fn distinct_keys_do_not_contend() {
        let coordinator = KeyCoordinator::new();

        let _mp4 = coordinator.claim("abc.mp4").await;
        let _png = coordinator.claim("abc.png").await;
        assert!(coordinator.is_busy("abc.mp4"));
        assert!(coordinator.is_busy("abc.png"));
    }

    #[tokio::test]
    async fn concurrent_claims_never_overlap() {
        let coordinator = KeyCoordinator::new();
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let coordinator = coordinator.clone();
            let active = Arc::clone(&active);
            let max_seen = Arc::clone(&max_seen);
            tasks.push(tokio::spawn(async move {
                let claim = coordinator.claim("contended.mp4").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                drop(claim);
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_busy("contended.mp4"));
    }
}
