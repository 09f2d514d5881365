//! Supervised Task
//!
//! Drives a periodic job (heartbeat, registry fetch, ...) with a hard
//! per-tick timeout and exponential back-off on timeout, snapping back to
//! the base interval after one clean success. See spec.md §4.C.
//!
//! River doesn't have an equivalent of this (a reverse proxy has no
//! periodic client-side jobs); the task-runner idiom here follows the
//! `tokio::spawn` + `tokio::time::timeout` pattern used throughout the
//! wider example pool's retry/scheduler code (e.g. the smithy-rs static
//! retry strategy), adapted to the single-supervisor, one-task-in-flight
//! contract spec.md describes.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::CompassError;

pub type TaskResult = std::result::Result<(), String>;

#[derive(Debug, Default)]
pub struct SupervisedTaskMetrics {
    pub successes: AtomicU64,
    pub timeouts: AtomicU64,
    pub rejections: AtomicU64,
    pub other_errors: AtomicU64,
}

/// A running supervised task. Dropping this does not stop the loop; call
/// [`SupervisedTask::cancel`] explicitly.
pub struct SupervisedTask {
    base_timeout: Duration,
    max_delay: Duration,
    current_delay_millis: AtomicU64,
    cancelled: Arc<AtomicBool>,
    pub metrics: Arc<SupervisedTaskMetrics>,
    loop_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SupervisedTask {
    /// Spawn a periodic task.
    ///
    /// `worker_pool` models the bounded worker executor from spec.md: a
    /// [`Semaphore`] with one permit enforces "at most one concurrent
    /// invocation of R in flight". A tick that can't acquire the permit
    /// (the previous invocation is still draining after a timeout) is
    /// counted as a rejection rather than queued.
    pub fn spawn<F, Fut>(
        base_timeout: Duration,
        backoff_bound: u32,
        worker_pool: Arc<Semaphore>,
        mut task: F,
    ) -> Arc<Self>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        assert!(backoff_bound >= 1, "back-off bound must be >= 1");
        let max_delay = base_timeout * backoff_bound;
        let this = Arc::new(Self {
            base_timeout,
            max_delay,
            current_delay_millis: AtomicU64::new(base_timeout.as_millis() as u64),
            cancelled: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(SupervisedTaskMetrics::default()),
            loop_handle: std::sync::Mutex::new(None),
        });

        let driver = this.clone();
        let handle = tokio::spawn(async move {
            loop {
                if driver.cancelled.load(Ordering::Acquire) {
                    return;
                }

                let Ok(permit) = worker_pool.clone().try_acquire_owned() else {
                    driver.metrics.rejections.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("supervised task: worker pool saturated, rejecting tick");
                    driver.sleep_for_current_delay().await;
                    continue;
                };

                let fut = task();
                let worker = tokio::spawn(async move {
                    let result = fut.await;
                    drop(permit);
                    result
                });
                let abort_handle = worker.abort_handle();

                match tokio::time::timeout(driver.base_timeout, worker).await {
                    Ok(Ok(Ok(()))) => {
                        driver
                            .current_delay_millis
                            .store(driver.base_timeout.as_millis() as u64, Ordering::Release);
                        driver.metrics.successes.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(Ok(Err(reason))) => {
                        driver.metrics.other_errors.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(reason, "supervised task: worker reported failure");
                    }
                    Ok(Err(join_err)) => {
                        driver.metrics.other_errors.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(?join_err, "supervised task: worker panicked");
                    }
                    Err(_elapsed) => {
                        // Cancel the still-live future with interrupt (spec.md
                        // §4.C step 6) instead of leaking it — `timeout`
                        // dropping the `JoinHandle` would not abort the
                        // spawned task underneath it.
                        abort_handle.abort();
                        driver.extend_delay();
                        driver.metrics.timeouts.fetch_add(1, Ordering::Relaxed);
                        let err = CompassError::TimeoutExceeded;
                        tracing::warn!(
                            delay_ms = driver.current_delay_millis.load(Ordering::Relaxed),
                            error = %err,
                            "supervised task: tick timed out, aborting and widening interval"
                        );
                    }
                }

                if driver.cancelled.load(Ordering::Acquire) {
                    return;
                }
                driver.sleep_for_current_delay().await;
            }
        });

        *this.loop_handle.lock().unwrap() = Some(handle);
        this
    }

    fn extend_delay(&self) {
        loop {
            let cur = self.current_delay_millis.load(Ordering::Acquire);
            let doubled = cur.saturating_mul(2);
            let next = doubled.min(self.max_delay.as_millis() as u64);
            if self
                .current_delay_millis
                .compare_exchange_weak(cur, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }
    }

    async fn sleep_for_current_delay(&self) {
        let millis = self.current_delay_millis.load(Ordering::Acquire);
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }

    /// Current scheduling delay, for tests/observability.
    pub fn current_delay(&self) -> Duration {
        Duration::from_millis(self.current_delay_millis.load(Ordering::Acquire))
    }

    /// Stop scheduling further ticks. A tick already in flight runs to
    /// completion; only the *next* scheduled tick is cancelled.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn success_resets_delay_after_backoff() {
        let base = Duration::from_millis(50);
        let pool = Arc::new(Semaphore::new(1));
        let tick = Arc::new(AtomicUsize::new(0));
        let tick2 = tick.clone();

        let task = SupervisedTask::spawn(base, 8, pool, move || {
            let tick2 = tick2.clone();
            async move {
                let n = tick2.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    // sleep past the base timeout to force a dilation
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
                Ok(())
            }
        });

        // Let a few ticks elapse (first two time out, widening the delay).
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(task.metrics.timeouts.load(Ordering::SeqCst) >= 1);

        // Eventually a fast success should have snapped the delay back to base.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(task.current_delay(), base);
        task.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_doubles_up_to_max() {
        let base = Duration::from_millis(20);
        let pool = Arc::new(Semaphore::new(1));

        let task = SupervisedTask::spawn(base, 4, pool, || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(task.current_delay(), base * 4);
        task.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_worker_is_aborted_not_leaked() {
        // A worker that hangs past the timeout must actually be cancelled,
        // not merely abandoned while it keeps running in the background.
        let base = Duration::from_millis(20);
        let pool = Arc::new(Semaphore::new(1));
        let completed = Arc::new(AtomicBool::new(false));
        let completed2 = completed.clone();

        let task = SupervisedTask::spawn(base, 2, pool, move || {
            let completed = completed2.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                // Only reached if the spawned task was never aborted.
                completed.store(true, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(task.metrics.timeouts.load(Ordering::SeqCst) >= 1);
        task.cancel();

        // Even after the hung future's original sleep duration would have
        // elapsed, it never got to run to completion.
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(!completed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn single_flight_no_overlap() {
        let base = Duration::from_millis(10);
        let pool = Arc::new(Semaphore::new(1));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let in_flight2 = in_flight.clone();
        let max_seen2 = max_seen.clone();

        let task = SupervisedTask::spawn(base, 2, pool, move || {
            let in_flight = in_flight2.clone();
            let max_seen = max_seen2.clone();
            async move {
                let cur = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(cur, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        task.cancel();
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
