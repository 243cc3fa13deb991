//! Counting semaphore bounding concurrent outbound lookups.
//!
//! At most `limit` permits are out at once. Further callers queue in strict
//! FIFO order and are woken one at a time as permits are released. Release is
//! tied to dropping the [`GovernorPermit`], so every exit path of the holder
//! (success, error, cancellation) gives the slot back.
//!
//! There is no acquisition timeout: a holder that never drops its permit
//! permanently lowers throughput.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::{SpoilerError, SpoilerResult};

/// Default number of concurrent lookups.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

/// Bounds concurrent lookups with FIFO queueing.
#[derive(Debug)]
pub struct RequestGovernor {
    // tokio's semaphore is fair: waiters are served in arrival order.
    semaphore: Semaphore,
    limit: usize,
    queued: AtomicUsize,
}

/// A granted slot. Dropping it releases the slot to the oldest waiter.
#[derive(Debug)]
#[must_use = "dropping the permit releases the slot immediately"]
pub struct GovernorPermit<'a> {
    _permit: SemaphorePermit<'a>,
}

impl RequestGovernor {
    /// Creates a governor with `limit` slots (at least one).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Semaphore::new(limit),
            limit,
            queued: AtomicUsize::new(0),
        }
    }

    /// Waits for a slot.
    ///
    /// Only fails after [`RequestGovernor::close`].
    pub async fn acquire(&self) -> SpoilerResult<GovernorPermit<'_>> {
        let _queued = QueuedGuard::enter(&self.queued);
        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| SpoilerError::GovernorClosed)?;
        Ok(GovernorPermit { _permit: permit })
    }

    /// Explicitly releases a permit. Equivalent to dropping it.
    pub fn release(permit: GovernorPermit<'_>) {
        drop(permit);
    }

    /// Number of permits currently held.
    pub fn in_flight(&self) -> usize {
        self.limit - self.semaphore.available_permits().min(self.limit)
    }

    /// Number of callers waiting for a slot.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Fails every queued and future `acquire`. Held permits stay valid.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}

impl Default for RequestGovernor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IN_FLIGHT)
    }
}

/// Counts a caller as queued for as long as its `acquire` future is pending.
struct QueuedGuard<'a>(&'a AtomicUsize);

impl<'a> QueuedGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn grants_up_to_the_limit_immediately() {
        let governor = RequestGovernor::new(2);
        let first = governor.acquire().await.unwrap();
        let second = governor.acquire().await.unwrap();
        assert_eq!(governor.in_flight(), 2);
        assert_eq!(governor.queued(), 0);

        RequestGovernor::release(first);
        assert_eq!(governor.in_flight(), 1);
        drop(second);
        assert_eq!(governor.in_flight(), 0);
    }

    #[tokio::test]
    async fn queued_caller_waits_for_a_release() {
        let governor = Arc::new(RequestGovernor::new(1));
        let held = governor.acquire().await.unwrap();

        let waiter = {
            let governor = Arc::clone(&governor);
            tokio::spawn(async move {
                let _permit = governor.acquire().await.unwrap();
            })
        };
        while governor.queued() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap();
        assert_eq!(governor.in_flight(), 0);
    }

    #[tokio::test]
    async fn close_fails_waiters() {
        let governor = RequestGovernor::new(1);
        let _held = governor.acquire().await.unwrap();
        governor.close();
        assert_eq!(
            governor.acquire().await.unwrap_err(),
            SpoilerError::GovernorClosed
        );
        assert!(governor.is_closed());
    }

    #[test]
    fn zero_limit_is_raised_to_one() {
        assert_eq!(RequestGovernor::new(0).limit(), 1);
    }
}
