//! Deferred refresh work.
//!
//! `RefreshQueue` owns every refresh task that has been scheduled but not yet
//! reaped. Scheduling is a non-blocking hand-off to the tokio blocking pool;
//! `drain` closes the queue and waits for everything in flight.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument};

use crate::health_stats::HealthStats;
use crate::oracle::CpuTimeOracle;
use crate::registry::{RefreshOutcome, Registry};

/// Runs one refresh pass over `registry` and records it in `stats`.
#[instrument(skip_all)]
pub fn run_refresh(
    registry: &Registry,
    oracle: &dyn CpuTimeOracle,
    stats: &HealthStats,
) -> RefreshOutcome {
    let start = Instant::now();
    let outcome = registry.refresh_and_prune(oracle);
    let remaining = registry.len();
    let elapsed = start.elapsed().as_secs_f64();

    stats.record_refresh(&outcome, remaining, elapsed);
    debug!(
        "Refresh pass over {} entries: {} updated, {} pruned, {} failed, {} remaining, {:.2}ms",
        outcome.visited(),
        outcome.updated,
        outcome.pruned,
        outcome.failed,
        remaining,
        elapsed * 1000.0
    );
    outcome
}

/// Scheduler for refresh tasks with drain-on-shutdown semantics.
pub struct RefreshQueue {
    registry: Arc<Registry>,
    oracle: Arc<dyn CpuTimeOracle>,
    stats: Arc<HealthStats>,
    /// `None` once the queue has been closed for draining.
    tasks: Mutex<Option<JoinSet<RefreshOutcome>>>,
}

impl RefreshQueue {
    pub fn new(
        registry: Arc<Registry>,
        oracle: Arc<dyn CpuTimeOracle>,
        stats: Arc<HealthStats>,
    ) -> Self {
        Self {
            registry,
            oracle,
            stats,
            tasks: Mutex::new(Some(JoinSet::new())),
        }
    }

    /// Enqueues one refresh task. Returns `false` if the queue is draining.
    ///
    /// Must be called from within a tokio runtime. Finished tasks are reaped
    /// here so the set does not grow without bound.
    pub fn schedule(&self) -> bool {
        let mut guard = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tasks) = guard.as_mut() else {
            debug!("Refresh queue closed, not scheduling");
            return false;
        };

        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                error!("Refresh task failed: {}", e);
            }
        }

        let registry = Arc::clone(&self.registry);
        let oracle = Arc::clone(&self.oracle);
        let stats = Arc::clone(&self.stats);
        tasks.spawn_blocking(move || run_refresh(&registry, oracle.as_ref(), &stats));
        true
    }

    /// Closes the queue and waits for every scheduled task to finish.
    ///
    /// Blocking tasks cannot be cancelled, so this always waits for them to
    /// run to completion. Returns the number of tasks that were drained.
    pub async fn drain(&self) -> usize {
        let taken = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut tasks) = taken else {
            return 0;
        };

        let pending = tasks.len();
        if pending > 0 {
            info!("Waiting for {} in-flight refresh task(s)", pending);
        }
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Refresh task failed during drain: {}", e);
            }
        }
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SampleError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Reports a constant CPU time after sleeping, counting finished samples.
    struct SlowOracle {
        delay: Duration,
        finished: AtomicUsize,
    }

    impl CpuTimeOracle for SlowOracle {
        fn sample(&self, _pid: i32) -> Result<u64, SampleError> {
            std::thread::sleep(self.delay);
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(5)
        }
    }

    fn queue_with(delay: Duration) -> (Arc<Registry>, Arc<SlowOracle>, RefreshQueue) {
        let registry = Arc::new(Registry::new(false));
        let oracle = Arc::new(SlowOracle {
            delay,
            finished: AtomicUsize::new(0),
        });
        let queue = RefreshQueue::new(
            Arc::clone(&registry),
            oracle.clone(),
            Arc::new(HealthStats::new()),
        );
        (registry, oracle, queue)
    }

    #[test]
    fn test_run_refresh_records_stats() {
        let registry = Registry::new(false);
        registry.register(1).unwrap();
        let stats = HealthStats::new();
        let oracle = SlowOracle {
            delay: Duration::ZERO,
            finished: AtomicUsize::new(0),
        };

        let outcome = run_refresh(&registry, &oracle, &stats);
        assert_eq!(outcome.updated, 1);
        assert_eq!(stats.refresh_passes(), 1);
        assert_eq!(registry.snapshot()[0].cpu_time, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drain_waits_for_slow_refresh() {
        let (registry, oracle, queue) = queue_with(Duration::from_millis(200));
        registry.register(1).unwrap();
        registry.register(2).unwrap();

        assert!(queue.schedule());
        let drained = queue.drain().await;

        assert_eq!(drained, 1);
        assert_eq!(oracle.finished.load(Ordering::SeqCst), 2);
        assert!(registry.snapshot().iter().all(|e| e.cpu_time == 5));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_schedule_refused_after_drain() {
        let (registry, oracle, queue) = queue_with(Duration::ZERO);
        registry.register(1).unwrap();
        assert!(queue.schedule());
        assert_eq!(queue.drain().await, 1);

        assert!(!queue.schedule());
        assert_eq!(queue.drain().await, 0);
        assert_eq!(oracle.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overlapping_refreshes_serialize() {
        let (registry, oracle, queue) = queue_with(Duration::from_millis(20));
        for pid in 0..5 {
            registry.register(pid).unwrap();
        }

        for _ in 0..4 {
            assert!(queue.schedule());
        }
        queue.drain().await;

        assert_eq!(oracle.finished.load(Ordering::SeqCst), 20);
        assert_eq!(registry.len(), 5);
    }
}
