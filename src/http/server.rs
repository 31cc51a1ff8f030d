//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with public status and admin handlers
//! - Wire up the trace layer
//! - Serve until the shutdown signal fires

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::admin::setup_admin_router;
use crate::config::AdminConfig;
use crate::jobs::{JobRegistry, ResourceCache};
use crate::lifecycle::Shutdown;
use crate::poller::{ServedSnapshot, SnapshotCache};
use crate::resilience::{CircuitBreaker, CircuitState};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub breaker: Arc<CircuitBreaker>,
    pub snapshots: Arc<SnapshotCache>,
    pub jobs: Arc<JobRegistry>,
    pub resources: Arc<ResourceCache>,
    pub admin: AdminConfig,
}

/// Body of `GET /status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: CircuitState,
    pub online: bool,
    pub next_retry_in_ms: Option<u64>,
    /// Last known device status; `null` before the first successful poll.
    pub device: Option<ServedSnapshot>,
    /// Human-readable caveat when the data should not be presented as live.
    pub warning: Option<String>,
}

/// HTTP server for status consumers and operators.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(state: AppState) -> Router {
        let mut router = Router::new()
            .route("/status", get(get_status))
            .route("/health", get(get_health));

        if state.admin.enabled {
            router = router.merge(setup_admin_router(state.clone()));
        }

        router.with_state(state).layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Always 200: an offline device is reported in the body, not as an error.
async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let stats = state.breaker.stats();
    let device = state.snapshots.serve();

    let warning = match (&device, stats.state) {
        (_, CircuitState::Open) => Some(format!(
            "Device offline, retrying in {}s",
            stats.next_retry_in_ms.unwrap_or(0).div_ceil(1_000)
        )),
        (_, CircuitState::HalfOpen) => Some("Device recovering, data may be out of date".to_string()),
        (None, CircuitState::Closed) => Some("No device status received yet".to_string()),
        (Some(snapshot), CircuitState::Closed) if snapshot.stale => Some(format!(
            "Device status is {}s old",
            snapshot.cache_age_seconds
        )),
        (Some(_), CircuitState::Closed) => None,
    };

    Json(StatusResponse {
        state: stats.state,
        online: stats.state == CircuitState::Closed,
        next_retry_in_ms: stats.next_retry_in_ms,
        device,
        warning,
    })
}

async fn get_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
