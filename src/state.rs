//! Application state management for the tracker daemon.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers.

use prometheus::Registry as MetricsRegistry;
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::health_stats::HealthStats;
use crate::metrics::TrackerMetrics;
use crate::registry::Registry;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    pub registry: Arc<Registry>,
    pub config: Arc<Config>,
    pub health_stats: Arc<HealthStats>,
    pub metrics_registry: MetricsRegistry,
    pub metrics: TrackerMetrics,
    /// Held across observe + gather so concurrent scrapes never see a
    /// half-reset per-pid vector.
    pub scrape_lock: Mutex<()>,
}

impl AppState {
    /// Builds state around an existing registry and registers the metrics.
    pub fn new(
        registry: Arc<Registry>,
        config: Config,
        health_stats: Arc<HealthStats>,
    ) -> Result<Self, prometheus::Error> {
        let metrics_registry = MetricsRegistry::new();
        let metrics = TrackerMetrics::new(&metrics_registry)?;
        Ok(Self {
            registry,
            config: Arc::new(config),
            health_stats,
            metrics_registry,
            metrics,
            scrape_lock: Mutex::new(()),
        })
    }
}
