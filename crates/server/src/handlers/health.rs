//! Health check handlers
//!
//! `/health` answers as long as the process is up; `/ready` probes the
//! dependencies. A missing cache does not fail readiness, only the
//! database gates it.

use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ReadyChecks {
    pub database: CheckResult,
    pub cache: CheckResult,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub checks: ReadyChecks,
}

/// Liveness probe
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: tenon_common::VERSION,
    })
}

/// Readiness probe
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let started = Instant::now();
    let database = match state.repo.ping().await {
        Ok(()) => CheckResult {
            status: "up",
            latency_ms: Some(started.elapsed().as_millis() as u64),
        },
        Err(error) => {
            tracing::error!(%error, "Database readiness check failed");
            CheckResult {
                status: "down",
                latency_ms: None,
            }
        }
    };

    let cache = match &state.cache {
        Some(cache) => {
            let started = Instant::now();
            match cache.ping().await {
                Ok(()) => CheckResult {
                    status: "up",
                    latency_ms: Some(started.elapsed().as_millis() as u64),
                },
                Err(_) => CheckResult {
                    status: "down",
                    latency_ms: None,
                },
            }
        }
        None => CheckResult {
            status: "disabled",
            latency_ms: None,
        },
    };

    let ready = database.status == "up";
    let response = ReadyResponse {
        status: if ready { "ready" } else { "not_ready" },
        checks: ReadyChecks { database, cache },
    };

    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(response))
}
