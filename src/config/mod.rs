use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct MintApiConfig {
    pub server: ServerConfig,
    pub chain: ChainConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    pub cache: CacheConfig,
}

impl MintApiConfig {
    pub fn load() -> Result<Self> {
        let configured_path = std::env::var("UNIKO_MINT_CONFIG")
            .unwrap_or_else(|_| "config/mint.toml".to_string());
        assert!(
            !configured_path.is_empty(),
            "Configuration path must be non-empty"
        );
        assert!(
            configured_path.len() < 4096,
            "Configuration path length exceeds hard limit"
        );

        let mut builder = Config::builder()
            .add_source(File::new(&configured_path, FileFormat::Toml).required(true));

        if let Ok(env_override) = std::env::var("UNIKO_MINT_ENV") {
            if !env_override.is_empty() {
                let env_file = format!("config/mint.{}.toml", env_override);
                if Path::new(&env_file).exists() {
                    builder = builder.add_source(File::new(&env_file, FileFormat::Toml));
                }
            }
        }

        let settings = builder
            .build()
            .map_err(|err| map_config_error(err, &configured_path))?;
        let mut config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize mint API configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<()> {
        assert!(
            self.server.port > 0,
            "Server port must be greater than zero"
        );
        assert!(!self.chain.rpc_url.is_empty(), "RPC URL must be specified");
        assert!(
            !self.chain.contract_address.is_empty(),
            "Contract address must be specified"
        );
        self.server.ensure_bounds()?;
        self.chain.ensure_bounds()?;
        self.queue.ensure_bounds()?;
        self.cache.ensure_bounds()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Option<IpAddr>,
    pub port: u16,
    pub mint_wait_timeout_ms: Option<u64>,
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        let host = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(self.port != 0, "HTTP port cannot be zero");
        assert!(self.port < 65535, "HTTP port must be below 65535");
        SocketAddr::new(host, self.port)
    }

    pub fn mint_wait_timeout(&self) -> Option<Duration> {
        self.mint_wait_timeout_ms.map(Duration::from_millis)
    }

    fn ensure_bounds(&self) -> Result<()> {
        if let Some(millis) = self.mint_wait_timeout_ms {
            assert!(millis >= 100, "Mint wait timeout must be at least 100ms");
            assert!(
                millis <= 3_600_000,
                "Mint wait timeout cannot exceed one hour"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub request_timeout_ms: Option<u64>,
    pub contract_address: String,
    #[serde(default = "ChainConfig::default_gas_per_token")]
    pub gas_per_token: u64,
    /// Used when `getCurrentPrice()` cannot be read. Without it such mints fail.
    #[serde(default)]
    pub fallback_mint_price_wei: Option<u64>,
    /// Headroom the sender must hold on top of the mint value.
    #[serde(default = "ChainConfig::default_gas_buffer_wei")]
    pub gas_buffer_wei: u64,
    #[serde(default = "ChainConfig::default_max_mint_per_tx")]
    pub max_mint_per_tx: u32,
    #[serde(default = "ChainConfig::default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    #[serde(default = "ChainConfig::default_receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,
    #[serde(default)]
    pub dry_run: bool,
}

impl ChainConfig {
    pub fn request_timeout(&self) -> Duration {
        let millis = self.request_timeout_ms.unwrap_or(3_000);
        assert!(millis >= 100, "RPC timeout must be at least 100ms");
        assert!(millis <= 60_000, "RPC timeout cannot exceed 60 seconds");
        Duration::from_millis(millis)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_millis(self.receipt_timeout_ms)
    }

    fn ensure_bounds(&self) -> Result<()> {
        assert!(self.gas_per_token > 0, "Gas per token must be positive");
        assert!(
            self.gas_per_token <= 5_000_000,
            "Gas per token exceeds defensive limit"
        );
        if let Some(fallback) = self.fallback_mint_price_wei {
            assert!(fallback > 0, "Fallback mint price must be positive");
        }
        assert!(self.max_mint_per_tx > 0, "Max mint per tx must be positive");
        assert!(
            self.max_mint_per_tx <= 100,
            "Max mint per tx exceeds defensive limit"
        );
        assert!(
            self.receipt_poll_interval_ms >= 100,
            "Receipt poll interval must be >= 100ms"
        );
        assert!(
            self.receipt_timeout_ms >= self.receipt_poll_interval_ms,
            "Receipt timeout must cover at least one poll"
        );
        assert!(
            self.receipt_timeout_ms <= 600_000,
            "Receipt timeout cannot exceed ten minutes"
        );
        Ok(())
    }

    const fn default_gas_per_token() -> u64 {
        500_000
    }

    const fn default_gas_buffer_wei() -> u64 {
        // 0.000015 ETH
        15_000_000_000_000
    }

    const fn default_max_mint_per_tx() -> u32 {
        10
    }

    const fn default_receipt_poll_interval_ms() -> u64 {
        1_000
    }

    const fn default_receipt_timeout_ms() -> u64 {
        120_000
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "QueueConfig::default_max_queue_size")]
    pub max_queue_size: usize,
    #[serde(default = "QueueConfig::default_delay_between_mints_ms")]
    pub delay_between_mints_ms: u64,
}

impl QueueConfig {
    pub const DEFAULT_MAX_QUEUE_SIZE: usize = 50;
    pub const DEFAULT_DELAY_BETWEEN_MINTS_MS: u64 = 2_000;

    pub fn delay_between_mints(&self) -> Duration {
        Duration::from_millis(self.delay_between_mints_ms)
    }

    pub fn ensure_bounds(&self) -> Result<()> {
        assert!(self.max_queue_size > 0, "Queue size must be positive");
        assert!(
            self.max_queue_size <= 10_000,
            "Queue size exceeds defensive limit"
        );
        assert!(
            self.delay_between_mints_ms <= 600_000,
            "Delay between mints cannot exceed ten minutes"
        );
        Ok(())
    }

    const fn default_max_queue_size() -> usize {
        Self::DEFAULT_MAX_QUEUE_SIZE
    }

    const fn default_delay_between_mints_ms() -> u64 {
        Self::DEFAULT_DELAY_BETWEEN_MINTS_MS
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: Self::DEFAULT_MAX_QUEUE_SIZE,
            delay_between_mints_ms: Self::DEFAULT_DELAY_BETWEEN_MINTS_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub collection_ttl_seconds: u64,
    pub balances_max_capacity: u64,
    pub balances_ttl_seconds: u64,
}

impl CacheConfig {
    fn ensure_bounds(&self) -> Result<()> {
        assert!(
            self.collection_ttl_seconds <= 3_600,
            "Collection cache TTL cannot exceed one hour"
        );
        assert!(
            self.balances_max_capacity >= 100,
            "Balance cache capacity must be at least 100"
        );
        assert!(
            self.balances_ttl_seconds <= 86_400,
            "Balance cache TTL cannot exceed one day"
        );
        Ok(())
    }
}

fn map_config_error(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::NotFound(_) => ConfigError::NotFound(path.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_defaults_match_documented_values() {
        let queue = QueueConfig::default();
        assert_eq!(queue.max_queue_size, 50);
        assert_eq!(queue.delay_between_mints(), Duration::from_millis(2_000));
        assert!(queue.ensure_bounds().is_ok());
    }

    #[test]
    fn deserializes_minimal_toml_with_defaults() {
        let raw = r#"
            [server]
            port = 8080

            [chain]
            rpc_url = "http://127.0.0.1:8545"
            contract_address = "0x6Aa08b3FA75C395c8cbD23f235992EfedF3A8183"
            dry_run = true

            [cache]
            collection_ttl_seconds = 10
            balances_max_capacity = 1000
            balances_ttl_seconds = 30
        "#;
        let mut config = parse(raw);
        config.validate().expect("config validates");

        assert_eq!(config.queue.max_queue_size, QueueConfig::DEFAULT_MAX_QUEUE_SIZE);
        assert_eq!(config.chain.max_mint_per_tx, 10);
        assert_eq!(config.chain.gas_per_token, 500_000);
        assert_eq!(config.chain.request_timeout(), Duration::from_millis(3_000));
        assert!(config.server.mint_wait_timeout().is_none());
        assert_eq!(config.server.address().port(), 8080);
    }

    fn parse(raw: &str) -> MintApiConfig {
        Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .expect("config builds")
            .try_deserialize()
            .expect("config deserializes")
    }

    #[test]
    fn missing_fallback_price_stays_unset() {
        let mut config = parse(
            r#"
            [server]
            port = 8080

            [chain]
            rpc_url = "http://127.0.0.1:8545"
            contract_address = "0x6Aa08b3FA75C395c8cbD23f235992EfedF3A8183"

            [cache]
            collection_ttl_seconds = 10
            balances_max_capacity = 1000
            balances_ttl_seconds = 30
        "#,
        );
        config.validate().expect("config validates");

        assert!(!config.chain.dry_run);
        assert_eq!(config.chain.fallback_mint_price_wei, None);
        assert_eq!(config.chain.gas_buffer_wei, 15_000_000_000_000);
    }

    #[test]
    #[should_panic(expected = "Mint wait timeout must be at least 100ms")]
    fn rejects_unusable_mint_wait_timeout() {
        let mut config = parse(
            r#"
            [server]
            port = 8080
            mint_wait_timeout_ms = 50

            [chain]
            rpc_url = "http://127.0.0.1:8545"
            contract_address = "0x6Aa08b3FA75C395c8cbD23f235992EfedF3A8183"
            dry_run = true

            [cache]
            collection_ttl_seconds = 10
            balances_max_capacity = 1000
            balances_ttl_seconds = 30
        "#,
        );
        let _ = config.validate();
    }
}
