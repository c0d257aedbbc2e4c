//! Metrics endpoint handler for Prometheus scraping.
//!
//! This module provides the `/metrics` endpoint handler that formats the
//! tracked processes in Prometheus text format.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};
use std::sync::{Arc, PoisonError};
use tracing::{debug, error, instrument};

use crate::registry::MonitoredEntry;
use crate::state::{AppState, SharedState};

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    SnapshotFailed,
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        let message = match self {
            MetricsError::SnapshotFailed => "Failed to read registry",
            MetricsError::EncodingFailed => "Failed to encode metrics",
        };
        (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    debug!("Processing /metrics request");
    state.health_stats.record_http_request();

    let registry = Arc::clone(&state.registry);
    let entries = tokio::task::spawn_blocking(move || registry.snapshot())
        .await
        .map_err(|e| {
            error!("Snapshot task failed: {}", e);
            MetricsError::SnapshotFailed
        })?;

    render_metrics(&state, &entries)
}

/// Loads `entries` into the gauges and encodes the registry in one step.
fn render_metrics(state: &AppState, entries: &[MonitoredEntry]) -> Result<String, MetricsError> {
    let _scrape = state
        .scrape_lock
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    state.metrics.observe(entries, &state.health_stats);

    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    TextEncoder::new()
        .encode(&state.metrics_registry.gather(), &mut buffer)
        .map_err(|e| {
            error!("Failed to encode metrics: {}", e);
            MetricsError::EncodingFailed
        })?;

    String::from_utf8(buffer).map_err(|e| {
        error!("Metrics output is not UTF-8: {}", e);
        MetricsError::EncodingFailed
    })
}
