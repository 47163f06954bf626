//! HTTP surface: routes, handlers and the mapping from failures to status codes.
//!
//! - `GET  /transfer-paths`: trace paths (`max_depth`, `max_total_paths`,
//!   `start_party`, `contract_address` query parameters)
//! - `POST /custom-sparql`: raw SELECT passthrough, `{"query": "..."}`
//! - `GET  /health`: server status
//!
//! Every error response carries a JSON body `{"error": ..., "code": ...}`.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::engine::Engine;
use crate::error::{QueryFailure, TraceError, ValidationError};
use crate::graph::Solution;
use crate::trace::TraceParams;
use crate::transfer::TransferPath;

// ── State ─────────────────────────────────────────────────────────────────

pub struct ServerState {
    pub engine: Arc<Engine>,
}

// ── Request / response types ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
}

#[derive(Debug, Deserialize)]
pub struct SparqlRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct SparqlResponse {
    pub data: Vec<Solution>,
    pub execution_time: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

// ── Error mapping ─────────────────────────────────────────────────────────

fn api_error(status: StatusCode, err: &dyn Diagnostic) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
            code: err.code().map(|c| c.to_string()),
        }),
    )
}

/// Store failures: 504 when the store did not answer in time, 502 otherwise.
pub fn query_error(err: &QueryFailure) -> ApiError {
    let status = if err.is_timeout() {
        StatusCode::GATEWAY_TIMEOUT
    } else {
        StatusCode::BAD_GATEWAY
    };
    api_error(status, err)
}

/// Trace failures: 400 for rejected parameters, otherwise as [`query_error`].
pub fn trace_error(err: &TraceError) -> ApiError {
    match err {
        TraceError::Validation(e) => api_error(StatusCode::BAD_REQUEST, e),
        TraceError::Query(e) => query_error(e),
    }
}

/// Passthrough failures: the embedded store rejecting the caller's query text is a 400.
pub fn sparql_error(err: &QueryFailure) -> ApiError {
    match err {
        QueryFailure::Evaluation { .. } => api_error(StatusCode::BAD_REQUEST, err),
        _ => query_error(err),
    }
}

/// A query string that does not deserialize into [`TraceParams`].
pub fn params_rejection(rejection: &QueryRejection) -> ApiError {
    let err = ValidationError::MalformedParams {
        message: rejection.body_text(),
    };
    api_error(StatusCode::BAD_REQUEST, &err)
}

fn join_error(err: tokio::task::JoinError) -> ApiError {
    tracing::error!("blocking task failed: {err}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: format!("internal error: {err}"),
            code: None,
        }),
    )
}

// ── Handlers ──────────────────────────────────────────────────────────────

pub async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.engine.client().backend().describe(),
    })
}

pub async fn transfer_paths(
    State(state): State<Arc<ServerState>>,
    params: Result<Query<TraceParams>, QueryRejection>,
) -> Result<Json<Vec<TransferPath>>, ApiError> {
    let Query(params) = params.map_err(|rejection| {
        tracing::debug!("rejected transfer-paths query string: {rejection}");
        params_rejection(&rejection)
    })?;
    let engine = Arc::clone(&state.engine);
    let result = tokio::task::spawn_blocking(move || engine.trace_params(&params))
        .await
        .map_err(join_error)?;
    match result {
        Ok(paths) => Ok(Json(paths.into_iter().collect())),
        Err(e) => {
            tracing::warn!("transfer-paths failed: {e}");
            Err(trace_error(&e))
        }
    }
}

pub async fn custom_sparql(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<SparqlRequest>,
) -> Result<Json<SparqlResponse>, ApiError> {
    let engine = Arc::clone(&state.engine);
    let result = tokio::task::spawn_blocking(move || engine.sparql(&req.query))
        .await
        .map_err(join_error)?;
    match result {
        Ok(outcome) => {
            let execution_time = outcome.execution_time();
            Ok(Json(SparqlResponse {
                data: outcome.data,
                execution_time,
            }))
        }
        Err(e) => {
            tracing::warn!("custom-sparql failed: {e}");
            Err(sparql_error(&e))
        }
    }
}

/// All routes over one shared engine.
pub fn router(engine: Arc<Engine>) -> Router {
    let state = Arc::new(ServerState { engine });
    Router::new()
        .route("/health", get(health))
        .route("/transfer-paths", get(transfer_paths))
        .route("/custom-sparql", post(custom_sparql))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
