//! AdmissionLimiter - 実行開始の許可（permit）を管理
//!
//! キューに入れるかどうか（gate）とは独立に、同時に実行できるジョブ数を制限する。

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting permit pool with FIFO fairness and a bounded wait.
///
/// Backed by `tokio::sync::Semaphore`, which hands released permits to
/// waiters strictly in arrival order, so a late arrival never overtakes a
/// task that is still waiting.
#[derive(Debug, Clone)]
pub struct AdmissionLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

/// One unit of execution capacity.
///
/// Dropping the permit returns it to the pool. It cannot be cloned, so it is
/// released exactly once on every path, including early returns and panics.
#[derive(Debug)]
#[must_use = "dropping the permit releases it immediately"]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionPermit {
    /// Give the permit back now.
    pub fn release(self) {}
}

impl AdmissionLimiter {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.min(Semaphore::MAX_PERMITS);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Wait up to `timeout` for a permit. `None` when the wait expires first.
    ///
    /// A zero timeout still takes a permit that is free right now.
    pub async fn try_acquire(&self, timeout: Duration) -> Option<AdmissionPermit> {
        let acquire = Arc::clone(&self.semaphore).acquire_owned();
        match tokio::time::timeout(timeout, acquire).await {
            Ok(Ok(permit)) => Some(AdmissionPermit { _permit: permit }),
            // closed or timed out
            Ok(Err(_)) | Err(_) => None,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_use(&self) -> usize {
        self.max_concurrent.saturating_sub(self.available())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[tokio::test]
    async fn grants_up_to_max_then_refuses() {
        let limiter = AdmissionLimiter::new(2);
        let a = limiter.try_acquire(Duration::ZERO).await;
        let b = limiter.try_acquire(Duration::ZERO).await;
        let c = limiter.try_acquire(Duration::from_millis(10)).await;

        assert!(a.is_some() && b.is_some());
        assert!(c.is_none());
        assert_eq!(limiter.in_use(), 2);
    }

    #[tokio::test]
    async fn release_returns_capacity_exactly_once() {
        let limiter = AdmissionLimiter::new(1);
        let permit = limiter.try_acquire(Duration::ZERO).await.unwrap();
        assert_eq!(limiter.available(), 0);

        permit.release();
        assert_eq!(limiter.available(), 1);

        {
            let _scoped = limiter.try_acquire(Duration::ZERO).await.unwrap();
            assert_eq!(limiter.available(), 0);
        }
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_permits_waits_out_the_timeout() {
        let limiter = AdmissionLimiter::new(0);
        let start = Instant::now();

        assert!(limiter.try_acquire(Duration::from_millis(40)).await.is_none());
        assert_eq!(start.elapsed(), Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_is_granted_on_release() {
        let limiter = AdmissionLimiter::new(1);
        let held = limiter.try_acquire(Duration::ZERO).await.unwrap();

        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.try_acquire(Duration::from_secs(1)).await.is_some() })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(held);

        assert!(waiter.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_are_served_in_arrival_order() {
        let limiter = AdmissionLimiter::new(1);
        let held = limiter.try_acquire(Duration::ZERO).await.unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut joins = Vec::new();
        for i in 0..4 {
            let limiter = limiter.clone();
            let order = Arc::clone(&order);
            joins.push(tokio::spawn(async move {
                let permit = limiter.try_acquire(Duration::from_secs(10)).await.unwrap();
                order.lock().unwrap().push(i);
                tokio::time::sleep(Duration::from_millis(5)).await;
                drop(permit);
            }));
            // make arrival order deterministic
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        drop(held);
        for j in joins {
            j.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }
}
