//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! tracker statistics as a plain-text table.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "Project: https://github.com/herakles-io/herakles-proc-cpu-tracker — More info: https://www.herakles.io — Support: proc-mem@herakles.io";

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    state.health_stats.record_http_request();

    let interval = state.config.refresh_interval();
    let message = if state.health_stats.refresh_passes() > 0 {
        "OK"
    } else {
        "OK - Waiting for first refresh"
    };

    let table = state.health_stats.render_table();

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!(
            "{message}\n\nrefresh interval: {}s\n\n{table}\n{FOOTER_TEXT}",
            interval.as_secs()
        ),
    )
}
