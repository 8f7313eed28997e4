//! HTTP health endpoint
//!
//! `GET /health` answers 200 when every probe is healthy and 500 otherwise,
//! with the result set as a JSON body. Depending on how the state was built
//! the probes are either run per request or read from the scheduled cache.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;

use crate::health::{ProbeRunner, ResultSet, ScheduledProbeRunner};

/// Content type of every health response
pub const HEALTH_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Where `/health` gets its result set from
#[derive(Debug, Clone)]
pub enum HealthSource {
    /// Run the probes for every request
    OnDemand(ProbeRunner),
    /// Serve the latest background snapshot
    Scheduled(Arc<ScheduledProbeRunner>),
}

impl HealthSource {
    /// Produce the result set for one request
    pub async fn results(&self) -> ResultSet {
        match self {
            Self::OnDemand(runner) => runner.run().await,
            Self::Scheduled(scheduled) => scheduled.snapshot(),
        }
    }
}

/// Shared state for the router
#[derive(Debug, Clone)]
pub struct AppState {
    pub health: HealthSource,
}

/// Build the router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Response {
    let results = state.health.results().await;
    health_response(&results)
}

/// Shape a result set into an HTTP response
pub fn health_response(results: &ResultSet) -> Response {
    let status = if results.failed() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };

    let body = match serde_json::to_vec(results) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "Cannot marshal health results");
            e.to_string().into_bytes()
        }
    };

    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static(HEALTH_CONTENT_TYPE))],
        body,
    )
        .into_response()
}
