//! Documentation endpoint handler.
//!
//! This module provides the `/doc` endpoint handler that displays
//! documentation for the tracker.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the /doc endpoint.
#[instrument(skip(state))]
pub async fn doc_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /doc request");

    state.health_stats.record_http_request();

    let version = env!("CARGO_PKG_VERSION");
    let doc = format!(
        r#"HERAKLES PROCESS CPU TRACKER - DOCUMENTATION
============================================

VERSION: {}
DESCRIPTION: Tracks accumulated CPU time for registered processes

HTTP ENDPOINTS
--------------
GET  /status     - Tracked processes, one "<pid>: <cpu_time>" line each
POST /status     - Register the pid in the request body, returns bytes consumed
GET  /metrics    - Prometheus metrics endpoint
GET  /health     - Health check with internal statistics (plain text)
GET  /config     - Current configuration (plain text)
GET  /doc        - This documentation (plain text)

BEHAVIOUR
---------
CPU time is user + system time in clock ticks, read from /proc/<pid>/stat.
Every {} seconds a refresh pass samples each entry. Entries whose process
has exited are removed; a failed sample keeps the previous value.
Registrations are not checked for existence. Duplicate registrations are
{}.

REGISTERING A PROCESS
---------------------
curl -X POST --data "$$" http://localhost:{}/status
curl http://localhost:{}/status

AVAILABLE METRICS
-----------------
herakles_proc_cpu_time_ticks               - CPU time per process (ticks)
herakles_proc_cpu_time_seconds             - CPU time per process (seconds)
herakles_proc_cpu_tracked_entries          - Entries in the registry
herakles_proc_cpu_refresh_duration_seconds - Duration of the last refresh
herakles_proc_cpu_*_total                  - Refresh, prune, failure, registration counts

CONFIGURATION
-------------
Config file locations (in order):
1. CLI specified: -c /path/to/config.yaml
2. /etc/herakles/proc-cpu-tracker.{{yaml,yml,json,toml}}
3. ./herakles-proc-cpu-tracker.{{yaml,yml,json,toml}}

{}"#,
        version,
        state.config.refresh_interval().as_secs(),
        if state.config.dedup_registrations.unwrap_or(false) {
            "collapsed into one entry"
        } else {
            "kept as separate entries"
        },
        state.config.port(),
        state.config.port(),
        FOOTER_TEXT
    );

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        doc,
    )
}
