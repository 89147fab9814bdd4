use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;

use crate::config::CacheConfig;
use crate::minter::Minter;
use crate::models::collection::{CollectionView, OwnerTokensView};
use crate::queue::MintQueue;
use crate::rpc::ChainClient;

pub const COLLECTION_CACHE_KEY: &str = "collection";

#[derive(Clone)]
pub struct AppState {
    pub queue: MintQueue<Minter>,
    pub chain: ChainClient,
    pub cache: Arc<ApiCache>,
    pub start_time: Instant,
    pub max_mint_per_tx: u32,
    pub mint_wait_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(
        queue: MintQueue<Minter>,
        chain: ChainClient,
        cache: Arc<ApiCache>,
        max_mint_per_tx: u32,
        mint_wait_timeout: Option<Duration>,
    ) -> Self {
        assert!(max_mint_per_tx > 0, "Max mint per tx must be configured");
        Self {
            queue,
            chain,
            cache,
            start_time: Instant::now(),
            max_mint_per_tx,
            mint_wait_timeout,
        }
    }
}

pub struct ApiCache {
    pub collection: Cache<&'static str, CollectionView>,
    pub owners: Cache<String, Arc<OwnerTokensView>>,
}

impl ApiCache {
    pub fn new(config: &CacheConfig) -> Self {
        assert!(
            config.balances_max_capacity >= 100,
            "Balance cache capacity threshold"
        );

        let collection = Cache::builder()
            .max_capacity(1)
            .time_to_live(Duration::from_secs(config.collection_ttl_seconds))
            .build();

        let owners = Cache::builder()
            .max_capacity(config.balances_max_capacity)
            .time_to_live(Duration::from_secs(config.balances_ttl_seconds))
            .time_to_idle(Duration::from_secs(config.balances_ttl_seconds / 2 + 1))
            .build();

        Self { collection, owners }
    }

    /// Drops cached reads for an owner whose holdings just changed.
    pub async fn invalidate_after_mint(&self, owner: &str) {
        self.owners.invalidate(&owner.to_ascii_lowercase()).await;
        self.collection.invalidate(COLLECTION_CACHE_KEY).await;
    }
}
