//! Snapshot and registration endpoint handlers.
//!
//! `GET /status` renders the registry, `POST /status` registers the pid in
//! the request body. Both touch the registry lock on the blocking pool, since
//! a refresh pass may hold it for a whole sweep over the table.

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use crate::error::RegisterError;
use crate::interface::{handle_register, handle_snapshot};
use crate::state::SharedState;

/// Error type for `/status` failures.
#[derive(Debug)]
pub enum StatusError {
    Register(RegisterError),
    TaskFailed,
}

impl IntoResponse for StatusError {
    fn into_response(self) -> axum::response::Response {
        match self {
            StatusError::Register(e @ RegisterError::Parse(_)) => {
                (StatusCode::BAD_REQUEST, format!("{e}\n")).into_response()
            }
            StatusError::Register(e @ RegisterError::Allocation(_)) => {
                (StatusCode::INSUFFICIENT_STORAGE, format!("{e}\n")).into_response()
            }
            StatusError::TaskFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to access registry\n",
            )
                .into_response(),
        }
    }
}

/// Handler for `GET /status`.
#[instrument(skip(state))]
pub async fn snapshot_handler(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, StatusError> {
    debug!("Processing /status read");
    state.health_stats.record_http_request();

    let registry = Arc::clone(&state.registry);
    let text = tokio::task::spawn_blocking(move || handle_snapshot(&registry))
        .await
        .map_err(|e| {
            error!("Snapshot task failed: {}", e);
            StatusError::TaskFailed
        })?;

    Ok((
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        text,
    ))
}

/// Handler for `POST /status`. Responds with the number of bytes consumed.
#[instrument(skip(state, body), fields(len = body.len()))]
pub async fn register_handler(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<impl IntoResponse, StatusError> {
    debug!("Processing /status write");
    state.health_stats.record_http_request();

    let registry = Arc::clone(&state.registry);
    let max_input = state.config.max_input_bytes();
    let result = tokio::task::spawn_blocking(move || handle_register(&registry, &body, max_input))
        .await
        .map_err(|e| {
            error!("Register task failed: {}", e);
            StatusError::TaskFailed
        })?;

    match result {
        Ok(consumed) => {
            state.health_stats.record_registration(true);
            Ok((StatusCode::OK, format!("{consumed}\n")))
        }
        Err(e) => {
            warn!("Rejected registration: {}", e);
            state.health_stats.record_registration(false);
            Err(StatusError::Register(e))
        }
    }
}
