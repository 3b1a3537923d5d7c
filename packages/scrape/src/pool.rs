//! Bounded worker pool over Tokio tasks.
//!
//! A [`WorkerPool`] consumes a fixed batch of items and returns only once
//! every item's task has finished. Each item runs on its own spawned task;
//! a [`Semaphore`] with `width` permits keeps at most `width` of them
//! running at any time.
//!
//! Pools nest freely. A task spawned by one pool may build another pool
//! and await it, which is how a term worker drains one pool per page.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinError;

/// Returns the host's available parallelism (logical CPUs), or 1 if it
/// cannot be determined.
#[must_use]
pub fn host_parallelism() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// A bounded group of concurrent tasks synchronized on full completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPool {
    width: usize,
}

impl WorkerPool {
    /// Creates a pool running at most `width` items at once (minimum 1).
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    /// Creates a pool sized to [`host_parallelism`].
    #[must_use]
    pub fn host_sized() -> Self {
        Self::new(host_parallelism())
    }

    /// Returns the maximum number of concurrently running items.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Runs `work` on every item and waits for all of them.
    ///
    /// The result at index `i` belongs to `items[i]`. A task that panics
    /// yields a [`JoinError`] in its slot; it never cancels the other
    /// items.
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, work: F) -> Vec<Result<R, JoinError>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send,
        Fut: Future<Output = R> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.width));

        let handles: Vec<_> = items
            .into_iter()
            .map(|item| {
                let semaphore = Arc::clone(&semaphore);
                let task = work(item);
                tokio::spawn(async move {
                    // Only fails once closed, and this semaphore never is.
                    let _permit = semaphore.acquire_owned().await.ok();
                    task.await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await);
        }
        results
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::host_sized()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[test]
    fn width_is_at_least_one() {
        assert_eq!(WorkerPool::new(0).width(), 1);
        assert_eq!(WorkerPool::new(3).width(), 3);
        assert!(WorkerPool::host_sized().width() >= 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn runs_every_item() {
        let pool = WorkerPool::new(3);
        let mut results: Vec<u32> = pool
            .run((1..=10).collect(), |n| async move { n * 2 })
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        results.sort_unstable();
        assert_eq!(results, (1..=10).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_width() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        pool.run((0..12).collect::<Vec<u32>>(), |_| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn panicking_item_does_not_abort_siblings() {
        let pool = WorkerPool::new(4);
        let results = pool
            .run(vec![1u32, 2, 3, 4], |n| async move {
                assert!(n != 3, "boom");
                n
            })
            .await;

        assert_eq!(results.len(), 4);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
        assert!(results[2].as_ref().is_err_and(JoinError::is_panic));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn results_line_up_with_items() {
        let pool = WorkerPool::new(3);
        let results = pool
            .run(vec![30u64, 0, 20, 5, 10], |delay| async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                delay
            })
            .await;

        let results: Vec<u64> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(results, vec![30, 0, 20, 5, 10]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pools_nest_and_drain_inner_groups() {
        let outer = WorkerPool::new(2);
        let done = Arc::new(AtomicUsize::new(0));

        let inner_totals = outer
            .run(vec![3usize, 5, 7], |n| {
                let done = Arc::clone(&done);
                async move {
                    let inner = WorkerPool::new(2);
                    let finished = inner
                        .run((0..n).collect(), |_| {
                            let done = Arc::clone(&done);
                            async move {
                                done.fetch_add(1, Ordering::SeqCst);
                            }
                        })
                        .await;
                    finished.len()
                }
            })
            .await;

        let mut totals: Vec<usize> = inner_totals.into_iter().map(Result::unwrap).collect();
        totals.sort_unstable();
        assert_eq!(totals, vec![3, 5, 7]);
        assert_eq!(done.load(Ordering::SeqCst), 15);
    }

    #[tokio::test]
    async fn empty_batch_returns_immediately() {
        let results = WorkerPool::new(4).run(Vec::<u8>::new(), |n| async move { n }).await;
        assert!(results.is_empty());
    }
}
