//! Internal statistics rendered by the `/health` endpoint.
//!
//! Refresh passes run on the blocking pool and record here directly, so every
//! field is either atomic or behind its own short-lived mutex.

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::registry::RefreshOutcome;

#[derive(Clone, Copy, Default)]
struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

#[derive(Default)]
struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// Returns (current, average, max, min).
    fn snapshot(&self) -> (f64, f64, f64, f64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min)
        } else {
            (0.0, 0.0, 0.0, 0.0)
        }
    }
}

/// Running statistics about refresh passes, registrations and HTTP traffic.
pub struct HealthStats {
    started: Instant,
    tracked_entries: Stat,
    refresh_duration_seconds: Stat,
    refresh_passes: AtomicU64,
    entries_updated: AtomicU64,
    entries_pruned: AtomicU64,
    sample_failures: AtomicU64,
    registrations: AtomicU64,
    rejected_registrations: AtomicU64,
    http_requests: AtomicU64,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            tracked_entries: Stat::default(),
            refresh_duration_seconds: Stat::default(),
            refresh_passes: AtomicU64::new(0),
            entries_updated: AtomicU64::new(0),
            entries_pruned: AtomicU64::new(0),
            sample_failures: AtomicU64::new(0),
            registrations: AtomicU64::new(0),
            rejected_registrations: AtomicU64::new(0),
            http_requests: AtomicU64::new(0),
        }
    }
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    /// Records a completed refresh pass.
    pub fn record_refresh(&self, outcome: &RefreshOutcome, remaining: usize, duration_seconds: f64) {
        self.tracked_entries.add_sample(remaining as f64);
        self.refresh_duration_seconds.add_sample(duration_seconds);
        self.refresh_passes.fetch_add(1, Ordering::Relaxed);
        self.entries_updated
            .fetch_add(outcome.updated as u64, Ordering::Relaxed);
        self.entries_pruned
            .fetch_add(outcome.pruned as u64, Ordering::Relaxed);
        self.sample_failures
            .fetch_add(outcome.failed as u64, Ordering::Relaxed);
    }

    pub fn record_registration(&self, accepted: bool) {
        if accepted {
            self.registrations.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected_registrations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_http_request(&self) {
        self.http_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn refresh_passes(&self) -> u64 {
        self.refresh_passes.load(Ordering::Relaxed)
    }

    pub fn entries_pruned(&self) -> u64 {
        self.entries_pruned.load(Ordering::Relaxed)
    }

    pub fn sample_failures(&self) -> u64 {
        self.sample_failures.load(Ordering::Relaxed)
    }

    pub fn registrations(&self) -> u64 {
        self.registrations.load(Ordering::Relaxed)
    }

    /// Duration of the most recent refresh pass in seconds.
    pub fn last_refresh_duration_seconds(&self) -> f64 {
        self.refresh_duration_seconds.snapshot().0
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn render_table(&self) -> String {
        let (te_cur, te_avg, te_max, te_min) = self.tracked_entries.snapshot();
        let (rd_cur, rd_avg, rd_max, rd_min) = self.refresh_duration_seconds.snapshot();

        let left_col = 26usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "metric",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out, "{}", "-".repeat(left_col + 3 + (col_w + 3) * 4)).ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "tracked entries",
            format!("{:.0}", te_cur),
            format!("{:.1}", te_avg),
            format!("{:.0}", te_max),
            format!("{:.0}", te_min),
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "refresh duration (s)",
            format!("{:.3}", rd_cur),
            format!("{:.3}", rd_avg),
            format!("{:.3}", rd_max),
            format!("{:.3}", rd_min),
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "refresh passes:           {}", self.refresh_passes()).ok();
        writeln!(
            out,
            "entries updated:          {}",
            self.entries_updated.load(Ordering::Relaxed)
        )
        .ok();
        writeln!(out, "entries pruned:           {}", self.entries_pruned()).ok();
        writeln!(out, "sample failures:          {}", self.sample_failures()).ok();
        writeln!(out, "registrations:            {}", self.registrations()).ok();
        writeln!(
            out,
            "rejected registrations:   {}",
            self.rejected_registrations.load(Ordering::Relaxed)
        )
        .ok();
        writeln!(
            out,
            "http requests:            {}",
            self.http_requests.load(Ordering::Relaxed)
        )
        .ok();
        writeln!(out, "uptime (s):               {}", self.get_uptime_seconds()).ok();

        out
    }
}
