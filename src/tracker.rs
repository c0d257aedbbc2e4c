//! Tracker lifecycle: registry, refresh queue and trigger wired together.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::health_stats::HealthStats;
use crate::oracle::CpuTimeOracle;
use crate::refresh::RefreshQueue;
use crate::registry::Registry;
use crate::trigger::{Trigger, DEFAULT_REFRESH_INTERVAL};

/// Settings the tracker needs at start.
#[derive(Debug, Clone, Copy)]
pub struct TrackerOptions {
    pub refresh_interval: Duration,
    pub dedup_registrations: bool,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            dedup_registrations: false,
        }
    }
}

impl From<&Config> for TrackerOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            refresh_interval: cfg.refresh_interval(),
            dedup_registrations: cfg.dedup_registrations.unwrap_or(false),
        }
    }
}

/// Summary returned by `Tracker::stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopReport {
    pub firings: u64,
    pub drained_tasks: usize,
    pub released_entries: usize,
}

/// A running tracker.
pub struct Tracker {
    registry: Arc<Registry>,
    queue: Arc<RefreshQueue>,
    trigger: Trigger,
}

impl Tracker {
    /// Creates an empty registry and arms the trigger.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        options: TrackerOptions,
        oracle: Arc<dyn CpuTimeOracle>,
        stats: Arc<HealthStats>,
    ) -> Self {
        let registry = Arc::new(Registry::new(options.dedup_registrations));
        let queue = Arc::new(RefreshQueue::new(Arc::clone(&registry), oracle, stats));
        let trigger = Trigger::arm(Arc::clone(&queue), options.refresh_interval);

        info!(
            "Tracker started (refresh every {:?}, dedup {})",
            options.refresh_interval, options.dedup_registrations
        );
        Self {
            registry,
            queue,
            trigger,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Schedules an extra refresh pass outside the regular period.
    pub fn schedule_refresh(&self) -> bool {
        self.queue.schedule()
    }

    /// Disarms the trigger, drains in-flight refresh tasks, then releases
    /// every remaining entry. The order matters: no refresh task can touch
    /// the registry once its entries are released.
    pub async fn stop(self) -> StopReport {
        let firings = self.trigger.disarm().await;
        let drained_tasks = self.queue.drain().await;
        let released_entries = self.registry.drain().len();

        info!(
            "Tracker stopped: {} firing(s), {} task(s) drained, {} entries released",
            firings, drained_tasks, released_entries
        );
        StopReport {
            firings,
            drained_tasks,
            released_entries,
        }
    }
}
