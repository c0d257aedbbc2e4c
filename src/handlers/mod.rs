//! HTTP endpoint handlers for the tracker.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/status`: Snapshot (GET) and registration (POST)
//! - `/metrics`: Prometheus metrics endpoint
//! - `/health`: Health check endpoint
//! - `/config`: Configuration display endpoint
//! - `/doc`: Documentation endpoint

pub mod config;
pub mod doc;
pub mod health;
pub mod metrics;
pub mod status;

use axum::{routing::get, Router};

use crate::state::SharedState;

// Re-export handlers
pub use config::config_handler;
pub use doc::doc_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use status::{register_handler, snapshot_handler};

/// Builds the router, honouring the feature flags in the config.
pub fn router(state: SharedState) -> Router {
    let mut app = Router::new()
        .route("/status", get(snapshot_handler).post(register_handler))
        .route("/config", get(config_handler))
        .route("/doc", get(doc_handler));

    if state.config.enable_telemetry.unwrap_or(true) {
        app = app.route("/metrics", get(metrics_handler));
    }

    if state.config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    app.with_state(state)
}
