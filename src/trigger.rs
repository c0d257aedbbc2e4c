//! Periodic trigger that hands refresh work to the `RefreshQueue`.
//!
//! Each tick does exactly two things: schedule one refresh task and wait for
//! the next tick. The refresh itself never runs on the trigger task.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::refresh::RefreshQueue;

/// Default period between refresh passes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Handle to an armed trigger.
///
/// Dropping it without `disarm` also ends the trigger task, since the
/// shutdown receiver sees its sender go away.
pub struct Trigger {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<u64>,
}

impl Trigger {
    /// Arms the trigger. The first firing happens one `period` from now.
    pub fn arm(queue: Arc<RefreshQueue>, period: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_trigger(queue, period, shutdown_rx));
        debug!("Trigger armed with {:?} period", period);
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Disarms the trigger and waits until it can no longer fire.
    ///
    /// Returns how many times it fired.
    pub async fn disarm(self) -> u64 {
        // Only fails if the trigger task is already gone.
        let _ = self.shutdown_tx.send(true);
        match self.handle.await {
            Ok(fired) => fired,
            Err(e) => {
                warn!("Trigger task ended abnormally: {}", e);
                0
            }
        }
    }
}

async fn run_trigger(
    queue: Arc<RefreshQueue>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut fired = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                fired += 1;
                if !queue.schedule() {
                    info!("Refresh queue closed, trigger stopping");
                    break;
                }
            }
        }
    }

    debug!("Trigger disarmed after {} firing(s)", fired);
    fired
}
