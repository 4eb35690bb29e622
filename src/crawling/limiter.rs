//! Concurrency limiter for crawl units
//!
//! A fair `tokio::sync::Semaphore` bounds how many fetch+extract+validate units
//! run at once. Units start in submission order and complete in any order.
//! Slots are RAII guards, so failed or dropped units release theirs.

use futures::stream::FuturesUnordered;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    limit: usize,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// Tracks one running unit
struct SlotGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl<'a> SlotGuard<'a> {
    fn enter(in_flight: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { in_flight }
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyLimiter {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub const fn limit(&self) -> usize {
        self.limit
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously running units observed
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run one unit once a slot is free
    pub async fn run<F: Future>(&self, unit: F) -> F::Output {
        // The semaphore is owned here and never closed, so acquire cannot fail
        let _permit = self.semaphore.acquire().await.ok();
        let _slot = SlotGuard::enter(&self.in_flight, &self.peak);
        unit.await
    }

    /// Schedule every item; poll the returned set to drive the units and
    /// receive results in completion order.
    pub fn run_all<I, F, Fut>(&self, items: I, mut unit: F) -> FuturesUnordered<impl Future<Output = Fut::Output>>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future,
    {
        items.into_iter().map(|item| self.run(unit(item))).collect()
    }
}
