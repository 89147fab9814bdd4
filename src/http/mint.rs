use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::time::timeout;
use tracing::info;

use crate::abi;
use crate::minter::MintError;
use crate::models::mint::{MintSubmissionRequest, MintSubmissionResponse};
use crate::queue::{QueueError, QueueStatus};
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_mint))
        .route("/queue", get(queue_status))
}

/// Queues a mint and holds the connection until it settles.
///
/// Disconnecting or hitting the wait timeout does not withdraw the request.
async fn submit_mint(
    State(state): State<AppState>,
    Json(request): Json<MintSubmissionRequest>,
) -> Result<Json<MintSubmissionResponse>, HttpError> {
    let address = request.address.trim().to_string();
    if !abi::is_valid_address(&address) {
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            "Invalid wallet address format".to_string(),
        ));
    }
    if request.quantity == 0 || request.quantity > state.max_mint_per_tx {
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            format!(
                "Quantity must be between 1 and {}",
                state.max_mint_per_tx
            ),
        ));
    }

    let ticket = state
        .queue
        .enqueue(address.clone(), request.quantity)
        .map_err(queue_error)?;
    let request_id = ticket.id();
    let enqueued_at = ticket.enqueued_at();
    info!(
        "Mint request {request_id} for {address} accepted at position {}",
        ticket.position()
    );

    let outcome = match state.mint_wait_timeout {
        Some(limit) => timeout(limit, ticket).await.map_err(|_| {
            HttpError::new(
                StatusCode::GATEWAY_TIMEOUT,
                format!(
                    "Mint request {request_id} is still queued and will be processed; check your wallet for the result"
                ),
            )
        })?,
        None => ticket.await,
    };
    let receipt = outcome.map_err(queue_error)?;

    state.cache.invalidate_after_mint(&address).await;

    Ok(Json(MintSubmissionResponse {
        request_id,
        enqueued_at,
        receipt,
    }))
}

async fn queue_status(State(state): State<AppState>) -> Json<QueueStatus> {
    Json(state.queue.status())
}

fn queue_error(err: QueueError<MintError>) -> HttpError {
    let status = match &err {
        QueueError::QueueFull { .. } => StatusCode::SERVICE_UNAVAILABLE,
        QueueError::Mint(
            MintError::InvalidAddress(_)
            | MintError::InvalidQuantity { .. }
            | MintError::InsufficientFunds { .. },
        ) => StatusCode::BAD_REQUEST,
        QueueError::Mint(_) => StatusCode::BAD_GATEWAY,
        QueueError::ExecutorPanicked { .. } | QueueError::Abandoned { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    HttpError::new(status, err.to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::config::QueueConfig;
    use crate::http::test_support::{RECIPIENT, get, post_json, send, simulated_state};

    #[tokio::test(start_paused = true)]
    async fn idle_queue_status() {
        let state = simulated_state(QueueConfig::default(), None);
        let (status, body) = send(&state, get("/mint/queue")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"queue_length": 0, "processing": false, "next_position": 1})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn mint_returns_receipt_once_serviced() {
        let state = simulated_state(QueueConfig::default(), None);
        let (status, body) = send(
            &state,
            post_json("/mint", json!({"address": RECIPIENT, "quantity": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["receipt"]["quantity"], 2);
        assert_eq!(body["receipt"]["simulated"], true);
        assert!(body["request_id"].as_str().is_some());
        assert!(!state.queue.status().processing);
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_invalid_input_before_queueing() {
        let state = simulated_state(QueueConfig::default(), None);

        let (status, _) = send(
            &state,
            post_json("/mint", json!({"address": "0x1234", "quantity": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &state,
            post_json("/mint", json!({"address": RECIPIENT, "quantity": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &state,
            post_json("/mint", json!({"address": RECIPIENT, "quantity": 11})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!state.queue.status().processing);
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_maps_to_service_unavailable() {
        let queue = QueueConfig {
            max_queue_size: 1,
            delay_between_mints_ms: 2_000,
        };
        let state = simulated_state(queue, None);
        let _in_flight = state.queue.enqueue(RECIPIENT, 1).unwrap();
        let _pending = state.queue.enqueue(RECIPIENT, 1).unwrap();

        let (status, body) = send(
            &state,
            post_json("/mint", json!({"address": RECIPIENT, "quantity": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("queue is full"));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_timeout_leaves_request_queued() {
        let state = simulated_state(QueueConfig::default(), Some(Duration::from_millis(500)));
        let (status, _) = send(
            &state,
            post_json("/mint", json!({"address": RECIPIENT, "quantity": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert!(
            state.queue.status().processing,
            "the request keeps running after the caller gives up"
        );
    }

    #[test]
    fn error_status_mapping() {
        assert_eq!(
            queue_error(QueueError::QueueFull { capacity: 50 }).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            queue_error(QueueError::Mint(MintError::Reverted {
                tx_hash: "0xabc".to_string()
            }))
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            queue_error(QueueError::Mint(MintError::InvalidQuantity {
                requested: 0,
                max: 10
            }))
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            queue_error(QueueError::Mint(MintError::InsufficientFunds {
                address: RECIPIENT.to_string(),
                balance_wei: 1,
                required_wei: 2,
            }))
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            queue_error(QueueError::Mint(MintError::PriceUnavailable(
                "execution reverted".to_string()
            )))
            .status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
