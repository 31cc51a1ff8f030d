use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::http::AppState;
use crate::jobs::{JobStatus, ServedResource};
use crate::resilience::BreakerStats;

pub async fn get_breaker(State(state): State<AppState>) -> Json<BreakerStats> {
    Json(state.breaker.stats())
}

/// Manual override: force the circuit CLOSED.
pub async fn reset_breaker(State(state): State<AppState>) -> Json<BreakerStats> {
    tracing::warn!(previous = %state.breaker.state(), "Circuit reset requested via admin API");
    state.breaker.reset();
    Json(state.breaker.stats())
}

pub async fn get_jobs(State(state): State<AppState>) -> Json<Vec<JobStatus>> {
    Json(state.jobs.list())
}

pub async fn list_resources(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.resources.names())
}

pub async fn get_resource(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ServedResource>, StatusCode> {
    state
        .resources
        .serve(&name)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}
