//! Read-only views over the collection contract, cached briefly so polling
//! clients do not fan out into `eth_call`s.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use tracing::warn;

use crate::abi;
use crate::models::collection::{CollectionView, OwnerTokensView};
use crate::state::{AppState, COLLECTION_CACHE_KEY};

use super::HttpError;

/// Upper bound on `tokenOfOwnerByIndex` calls per lookup.
pub const MAX_OWNER_TOKENS: u64 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_collection))
        .route("/owners/{address}", get(get_owner_tokens))
}

async fn get_collection(State(state): State<AppState>) -> Result<Json<CollectionView>, HttpError> {
    if let Some(cached) = state.cache.collection.get(COLLECTION_CACHE_KEY).await {
        return Ok(Json(cached));
    }

    let total_supply = state
        .chain
        .total_supply()
        .await
        .map_err(|err| HttpError::new(StatusCode::BAD_GATEWAY, format!("{err:#}")))?;
    let mint_price_wei = match state.chain.current_price().await {
        Ok(price) => Some(price.to_string()),
        Err(err) => {
            warn!("Failed to read current mint price: {err:#}");
            None
        }
    };

    let view = CollectionView {
        contract_address: state.chain.contract_address().to_string(),
        total_supply,
        mint_price_wei,
        max_mint_per_tx: state.max_mint_per_tx,
    };
    state
        .cache
        .collection
        .insert(COLLECTION_CACHE_KEY, view.clone())
        .await;
    Ok(Json(view))
}

async fn get_owner_tokens(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<OwnerTokensView>, HttpError> {
    let address = address.trim().to_ascii_lowercase();
    if !abi::is_valid_address(&address) {
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            "Invalid wallet address format".to_string(),
        ));
    }

    if let Some(cached) = state.cache.owners.get(&address).await {
        return Ok(Json((*cached).clone()));
    }

    let balance = state
        .chain
        .balance_of(&address)
        .await
        .map_err(|err| HttpError::new(StatusCode::BAD_GATEWAY, format!("{err:#}")))?;

    let fetch = balance.min(MAX_OWNER_TOKENS);
    let mut token_ids = Vec::with_capacity(fetch as usize);
    for index in 0..fetch {
        let token_id = state
            .chain
            .token_of_owner_by_index(&address, index)
            .await
            .map_err(|err| HttpError::new(StatusCode::BAD_GATEWAY, format!("{err:#}")))?;
        token_ids.push(token_id.to_string());
    }

    let view = OwnerTokensView {
        address: address.clone(),
        balance,
        token_ids,
        truncated: balance > MAX_OWNER_TOKENS,
    };
    state
        .cache
        .owners
        .insert(address, Arc::new(view.clone()))
        .await;
    Ok(Json(view))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::abi;
    use crate::config::QueueConfig;
    use crate::http::test_support::{RECIPIENT, get, send, simulated_state, state_with_chain};
    use crate::rpc::test_support::MockChain;

    #[tokio::test]
    async fn owner_lookup_validates_address() {
        let state = simulated_state(QueueConfig::default(), None);
        let (status, body) = send(&state, get("/collection/owners/not-an-address")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid wallet address format");
    }

    #[tokio::test]
    async fn collection_view_is_served_from_cache() {
        let state = simulated_state(QueueConfig::default(), None);
        let view = crate::models::collection::CollectionView {
            contract_address: state.chain.contract_address().to_string(),
            total_supply: 42,
            mint_price_wei: Some("1000000000000".to_string()),
            max_mint_per_tx: 10,
        };
        state
            .cache
            .collection
            .insert(crate::state::COLLECTION_CACHE_KEY, view)
            .await;

        let (status, body) = send(&state, get("/collection")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_supply"], 42);
        assert_eq!(body["mint_price_wei"], "1000000000000");
    }

    #[tokio::test]
    async fn owner_tokens_are_read_once_then_cached() {
        let (mock, chain) = MockChain::new()
            .with_call(abi::BALANCE_OF, 2)
            .with_call(abi::TOKEN_OF_OWNER_BY_INDEX, 77)
            .serve()
            .await;
        let state = state_with_chain(chain, QueueConfig::default(), None);
        let uri = format!("/collection/owners/{RECIPIENT}");

        let (status, body) = send(&state, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], 2);
        assert_eq!(body["token_ids"], serde_json::json!(["77", "77"]));
        assert_eq!(body["truncated"], false);
        assert_eq!(mock.params("eth_call").len(), 3);

        let (status, _) = send(&state, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mock.params("eth_call").len(), 3);
    }
}
