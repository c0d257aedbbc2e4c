//! Prometheus metrics definitions for herakles-proc-cpu-tracker.
//!
//! Gauges are refreshed from a registry snapshot at scrape time, so the
//! exported values always match what `/status` would show.

use ahash::AHashMap as HashMap;
use prometheus::{Gauge, GaugeVec, IntCounter, Opts, Registry as MetricsRegistry};

use crate::health_stats::HealthStats;
use crate::oracle::ticks_to_seconds;
use crate::registry::MonitoredEntry;

/// Collection of Prometheus metrics for tracked processes.
#[derive(Clone)]
pub struct TrackerMetrics {
    pub cpu_time_ticks: GaugeVec,
    pub cpu_time_seconds: GaugeVec,
    pub tracked_entries: Gauge,
    pub refresh_duration: Gauge,
    pub refresh_passes: IntCounter,
    pub entries_pruned: IntCounter,
    pub sample_failures: IntCounter,
    pub registrations: IntCounter,
}

/// Advances `counter` to `total`. Totals only grow, so a smaller value is ignored.
fn catch_up(counter: &IntCounter, total: u64) {
    counter.inc_by(total.saturating_sub(counter.get()));
}

impl TrackerMetrics {
    /// Creates and registers all Prometheus metrics with the registry.
    pub fn new(registry: &MetricsRegistry) -> Result<Self, prometheus::Error> {
        let cpu_time_ticks = GaugeVec::new(
            Opts::new(
                "herakles_proc_cpu_time_ticks",
                "Accumulated user + system CPU time per tracked process in clock ticks",
            ),
            &["pid"],
        )?;
        let cpu_time_seconds = GaugeVec::new(
            Opts::new(
                "herakles_proc_cpu_time_seconds",
                "Accumulated user + system CPU time per tracked process in seconds",
            ),
            &["pid"],
        )?;
        let tracked_entries = Gauge::new(
            "herakles_proc_cpu_tracked_entries",
            "Number of entries currently in the registry",
        )?;
        let refresh_duration = Gauge::new(
            "herakles_proc_cpu_refresh_duration_seconds",
            "Duration of the most recent refresh pass",
        )?;
        let refresh_passes = IntCounter::new(
            "herakles_proc_cpu_refresh_passes_total",
            "Number of completed refresh passes",
        )?;
        let entries_pruned = IntCounter::new(
            "herakles_proc_cpu_entries_pruned_total",
            "Number of entries removed because their process exited",
        )?;
        let sample_failures = IntCounter::new(
            "herakles_proc_cpu_sample_failures_total",
            "Number of transient CPU-time sampling failures",
        )?;
        let registrations = IntCounter::new(
            "herakles_proc_cpu_registrations_total",
            "Number of accepted registrations",
        )?;

        registry.register(Box::new(cpu_time_ticks.clone()))?;
        registry.register(Box::new(cpu_time_seconds.clone()))?;
        registry.register(Box::new(tracked_entries.clone()))?;
        registry.register(Box::new(refresh_duration.clone()))?;
        registry.register(Box::new(refresh_passes.clone()))?;
        registry.register(Box::new(entries_pruned.clone()))?;
        registry.register(Box::new(sample_failures.clone()))?;
        registry.register(Box::new(registrations.clone()))?;

        Ok(Self {
            cpu_time_ticks,
            cpu_time_seconds,
            tracked_entries,
            refresh_duration,
            refresh_passes,
            entries_pruned,
            sample_failures,
            registrations,
        })
    }

    /// Replaces all exported values with the given snapshot and statistics.
    ///
    /// Duplicate registrations of one pid share a label set; they always carry
    /// the same sample, so the highest value is exported.
    pub fn observe(&self, entries: &[MonitoredEntry], stats: &HealthStats) {
        self.cpu_time_ticks.reset();
        self.cpu_time_seconds.reset();

        let mut per_pid: HashMap<i32, u64> = HashMap::with_capacity(entries.len());
        for entry in entries {
            let slot = per_pid.entry(entry.pid).or_insert(0);
            *slot = (*slot).max(entry.cpu_time);
        }

        for (pid, ticks) in &per_pid {
            let pid_label = pid.to_string();
            self.cpu_time_ticks
                .with_label_values(&[pid_label.as_str()])
                .set(*ticks as f64);
            self.cpu_time_seconds
                .with_label_values(&[pid_label.as_str()])
                .set(ticks_to_seconds(*ticks));
        }

        self.tracked_entries.set(entries.len() as f64);
        self.refresh_duration
            .set(stats.last_refresh_duration_seconds());
        catch_up(&self.refresh_passes, stats.refresh_passes());
        catch_up(&self.entries_pruned, stats.entries_pruned());
        catch_up(&self.sample_failures, stats.sample_failures());
        catch_up(&self.registrations, stats.registrations());
    }
}
