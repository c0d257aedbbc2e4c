//! Registry of monitored processes.
//!
//! The registry is an insertion-ordered table of `MonitoredEntry` values
//! behind a single mutex. Every structural change and every full read happens
//! under that lock, so a snapshot never observes a half-applied refresh.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

use crate::error::{RegisterError, SampleError};
use crate::oracle::CpuTimeOracle;

/// A process registered for CPU-time tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoredEntry {
    pub pid: i32,
    /// Accumulated user + system time in clock ticks, as of the last refresh.
    pub cpu_time: u64,
}

/// Counts produced by one refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub updated: usize,
    pub pruned: usize,
    pub failed: usize,
}

impl RefreshOutcome {
    /// Number of entries the pass looked at.
    pub fn visited(&self) -> usize {
        self.updated + self.pruned + self.failed
    }
}

/// Lock-protected, insertion-ordered table of monitored processes.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Mutex<Vec<MonitoredEntry>>,
    dedup: bool,
}

impl Registry {
    /// Creates an empty registry. With `dedup` set, registering a pid that is
    /// already tracked is a successful no-op instead of adding a second entry.
    pub fn new(dedup: bool) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            dedup,
        }
    }

    // Entries are plain values, so a poisoned lock still guards a consistent table.
    fn lock(&self) -> MutexGuard<'_, Vec<MonitoredEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a new entry for `pid` with a CPU time of zero.
    pub fn register(&self, pid: i32) -> Result<(), RegisterError> {
        let mut entries = self.lock();

        if self.dedup && entries.iter().any(|e| e.pid == pid) {
            debug!("Process {} already registered, skipping duplicate", pid);
            return Ok(());
        }

        entries.try_reserve(1)?;
        entries.push(MonitoredEntry { pid, cpu_time: 0 });
        debug!("Registered process {} ({} entries)", pid, entries.len());
        Ok(())
    }

    /// Returns a copy of all entries in registration order.
    pub fn snapshot(&self) -> Vec<MonitoredEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Samples every entry once and removes the ones whose process has exited.
    ///
    /// The lock is held for the whole pass. A transient oracle failure leaves
    /// the entry's CPU time untouched until the next pass.
    pub fn refresh_and_prune(&self, oracle: &dyn CpuTimeOracle) -> RefreshOutcome {
        let mut outcome = RefreshOutcome::default();
        let mut entries = self.lock();

        entries.retain_mut(|entry| match oracle.sample(entry.pid) {
            Ok(cpu_time) => {
                trace!("Process {}: {} -> {} ticks", entry.pid, entry.cpu_time, cpu_time);
                entry.cpu_time = cpu_time;
                outcome.updated += 1;
                true
            }
            Err(SampleError::NotFound(_)) => {
                debug!("Process {} exited, removing from registry", entry.pid);
                outcome.pruned += 1;
                false
            }
            Err(e) => {
                warn!("Keeping previous CPU time for process {}: {}", entry.pid, e);
                outcome.failed += 1;
                true
            }
        });

        outcome
    }

    /// Empties the registry and hands back the released entries.
    pub fn drain(&self) -> Vec<MonitoredEntry> {
        std::mem::take(&mut *self.lock())
    }
}
