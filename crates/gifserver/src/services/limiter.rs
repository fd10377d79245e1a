//! Global conversion concurrency limiting.
//!
//! A counting permit pool around the external converter invocations only:
//! fetches, validation, and cache-hit serving are never gated by it, so a
//! slow upstream cannot hog conversion capacity and hits never block on it.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds how many conversions run at once. Capacity 0 disables limiting.
#[derive(Clone, Debug)]
pub struct ConversionLimiter {
    semaphore: Option<Arc<Semaphore>>,
}

impl ConversionLimiter {
    pub fn new(max_concurrency: usize) -> Self {
        let semaphore =
            (max_concurrency > 0).then(|| Arc::new(Semaphore::new(max_concurrency)));
        Self { semaphore }
    }

    /// Waits for a permit. Immediate no-op permit when unbounded.
    pub async fn acquire(&self) -> ConversionPermit {
        let permit = match &self.semaphore {
            // the semaphore is never closed, so acquire cannot fail
            Some(semaphore) => Arc::clone(semaphore).acquire_owned().await.ok(),
            None => None,
        };
        ConversionPermit { _permit: permit }
    }

    /// Free permits, or `None` when unbounded.
    pub fn available(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|s| s.available_permits())
    }
}

/// RAII conversion permit; returned to the pool on drop.
#[derive(Debug)]
pub struct ConversionPermit {
    _permit: Option<OwnedSemaphorePermit>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn capacity_bounds_concurrent_holders() {
        let limiter = ConversionLimiter::new(2);

        let first = limiter.acquire().await;
        let _second = limiter.acquire().await;
        assert_eq!(limiter.available(), Some(0));

        drop(first);
        assert_eq!(limiter.available(), Some(1));
    }

    #[tokio::test]
    async fn zero_capacity_means_unbounded() {
        let limiter = ConversionLimiter::new(0);
        assert_eq!(limiter.available(), None);

        // any number of permits can be held at once
        let _permits: Vec<_> = futures::future::join_all(
            (0..64).map(|_| limiter.acquire()),
        )
        .await;
    }
}
