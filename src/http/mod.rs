use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::queue::QueueStatus;
use crate::state::AppState;

mod collection;
mod mint;

pub fn router(state: AppState) -> Router {
    assert!(
        state.start_time.elapsed() < Duration::from_secs(86_400),
        "Application uptime exceeds 24 hours before router creation"
    );

    // Mint page is served from a separate origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let mint_router = mint::router().with_state(state.clone());
    let collection_router = collection::router().with_state(state.clone());
    Router::new()
        .route("/health", get(health_live))
        .route("/health/ready", get(health_ready))
        .nest("/mint", mint_router)
        .nest("/collection", collection_router)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_live(State(state): State<AppState>) -> Result<Json<HealthResponse>, HttpError> {
    let uptime = state.start_time.elapsed().as_secs();
    let response = HealthResponse {
        status: "live",
        uptime_seconds: uptime,
    };
    Ok(Json(response))
}

async fn health_ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, HttpError> {
    let latest_block = state
        .chain
        .fetch_latest_block_number()
        .await
        .map_err(|err| HttpError::new(StatusCode::SERVICE_UNAVAILABLE, format!("{err:#}")))?;

    let rpc_timeout_ms =
        u64::try_from(state.chain.timeout().as_millis()).unwrap_or(u64::MAX);

    let response = ReadyResponse {
        status: "ready",
        latest_block,
        rpc_timeout_ms,
        queue: state.queue.status(),
        cache_entries: CacheSummary {
            collection: state.cache.collection.entry_count(),
            owners: state.cache.owners.entry_count(),
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
struct ReadyResponse {
    status: &'static str,
    latest_block: u64,
    rpc_timeout_ms: u64,
    queue: QueueStatus,
    cache_entries: CacheSummary,
}

#[derive(Debug, Serialize)]
struct CacheSummary {
    collection: u64,
    owners: u64,
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: String) -> Self {
        assert!(status != StatusCode::OK, "Error status cannot be 200");
        assert!(!message.is_empty(), "Error message cannot be empty");
        Self { status, message }
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        info!("HTTP error: {}", self.message);
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}


#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::test_support::{get, send, simulated_state, state_with_chain};
    use crate::config::QueueConfig;
    use crate::rpc::test_support::MockChain;

    #[tokio::test]
    async fn liveness_reports_uptime() {
        let state = simulated_state(QueueConfig::default(), None);
        let (status, body) = send(&state, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "live");
    }

    #[tokio::test]
    async fn readiness_fails_without_chain() {
        let state = simulated_state(QueueConfig::default(), None);
        let (status, body) = send(&state, get("/health/ready")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn readiness_reports_block_and_queue() {
        let (_mock, chain) = MockChain::new().serve().await;
        let state = state_with_chain(chain, QueueConfig::default(), None);
        let (status, body) = send(&state, get("/health/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["latest_block"], 16);
        assert_eq!(body["queue"]["processing"], false);
        assert_eq!(body["queue"]["next_position"], 1);
    }
}
