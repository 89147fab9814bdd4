//! Mint executors handed to the queue.
//!
//! [`ContractMinter`] submits `mint(uint256)` from the requesting account, which
//! the node must be able to sign for, and waits for the receipt. The next
//! queued request only starts once the previous transaction has been mined.
//! [`SimulatedMinter`] only exercises timing and is reachable solely through
//! `chain.dry_run`.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::abi;
use crate::config::ChainConfig;
use crate::queue::MintExecutor;
use crate::rpc::{ChainClient, TransactionRequest};

const SIMULATED_MINT_DURATION: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintReceipt {
    pub request_address: String,
    pub quantity: u32,
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub value_wei: String,
    pub simulated: bool,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum MintError {
    #[error("invalid recipient address {0}")]
    InvalidAddress(String),
    #[error("quantity must be between 1 and {max}, got {requested}")]
    InvalidQuantity { requested: u32, max: u32 },
    #[error("mint value overflows for quantity {quantity}")]
    ValueOverflow { quantity: u32 },
    #[error("unable to fetch current price: {0}")]
    PriceUnavailable(String),
    #[error("{address} holds {balance_wei} wei but the mint needs {required_wei} wei")]
    InsufficientFunds {
        address: String,
        balance_wei: u128,
        required_wei: u128,
    },
    #[error("transaction submission failed: {0}")]
    Submission(String),
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },
    #[error("transaction {tx_hash} not mined within {waited_ms}ms")]
    ReceiptTimeout { tx_hash: String, waited_ms: u128 },
    #[error("receipt lookup failed: {0}")]
    Receipt(String),
}

pub enum Minter {
    Contract(ContractMinter),
    Simulated(SimulatedMinter),
}

impl Minter {
    pub fn from_config(chain: ChainClient, config: &ChainConfig) -> Self {
        if config.dry_run {
            warn!("chain.dry_run is enabled: mints are simulated and never reach the chain");
            Minter::Simulated(SimulatedMinter::new(config.max_mint_per_tx))
        } else {
            Minter::Contract(ContractMinter::new(chain, config))
        }
    }

    pub fn max_mint_per_tx(&self) -> u32 {
        match self {
            Minter::Contract(minter) => minter.max_mint_per_tx,
            Minter::Simulated(minter) => minter.max_mint_per_tx,
        }
    }
}

impl MintExecutor for Minter {
    type Receipt = MintReceipt;
    type Error = MintError;

    fn mint(
        &self,
        address: &str,
        quantity: u32,
    ) -> impl Future<Output = Result<MintReceipt, MintError>> + Send {
        async move {
            match self {
                Minter::Contract(minter) => minter.mint(address, quantity).await,
                Minter::Simulated(minter) => minter.mint(address, quantity).await,
            }
        }
    }
}

pub struct ContractMinter {
    chain: ChainClient,
    gas_per_token: u64,
    fallback_price_wei: Option<u128>,
    gas_buffer_wei: u128,
    max_mint_per_tx: u32,
    receipt_poll_interval: Duration,
    receipt_timeout: Duration,
}

impl ContractMinter {
    pub fn new(chain: ChainClient, config: &ChainConfig) -> Self {
        assert!(config.gas_per_token > 0, "Gas per token must be positive");
        assert!(config.max_mint_per_tx > 0, "Max mint per tx must be positive");
        Self {
            chain,
            gas_per_token: config.gas_per_token,
            fallback_price_wei: config.fallback_mint_price_wei.map(u128::from),
            gas_buffer_wei: u128::from(config.gas_buffer_wei),
            max_mint_per_tx: config.max_mint_per_tx,
            receipt_poll_interval: config.receipt_poll_interval(),
            receipt_timeout: config.receipt_timeout(),
        }
    }

    /// Mints `quantity` tokens from `address`, which must be an account the
    /// node can sign for. The contract mints to the sender.
    pub async fn mint(&self, address: &str, quantity: u32) -> Result<MintReceipt, MintError> {
        validate_request(address, quantity, self.max_mint_per_tx)?;

        let price = self.price().await?;
        let value = price
            .checked_mul(u128::from(quantity))
            .ok_or(MintError::ValueOverflow { quantity })?;
        let required = value
            .checked_add(self.gas_buffer_wei)
            .ok_or(MintError::ValueOverflow { quantity })?;

        let balance = self
            .chain
            .balance(address)
            .await
            .map_err(|err| MintError::Submission(format!("{err:#}")))?;
        if balance < required {
            return Err(MintError::InsufficientFunds {
                address: address.to_string(),
                balance_wei: balance,
                required_wei: required,
            });
        }

        let gas = u128::from(self.gas_per_token) * u128::from(quantity);
        let request = TransactionRequest {
            from: address.to_string(),
            to: self.chain.contract_address().to_string(),
            value: abi::format_quantity(value),
            gas: abi::format_quantity(gas),
            data: abi::encode_call(abi::MINT, &[abi::encode_uint(u128::from(quantity))]),
        };
        let tx_hash = self
            .chain
            .send_transaction(&request)
            .await
            .map_err(|err| MintError::Submission(format!("{err:#}")))?;
        info!("Mint transaction {tx_hash} sent for {address} ({quantity} NFTs)");

        let (block_number, gas_used) = self.await_receipt(&tx_hash).await?;

        Ok(MintReceipt {
            request_address: address.to_string(),
            quantity,
            tx_hash: Some(tx_hash),
            block_number,
            gas_used,
            value_wei: value.to_string(),
            simulated: false,
            completed_at: Utc::now(),
        })
    }

    async fn price(&self) -> Result<u128, MintError> {
        match self.chain.current_price().await {
            Ok(price) => Ok(price),
            Err(err) => match self.fallback_price_wei {
                Some(fallback) => {
                    warn!("Failed to read current price, using fallback {fallback} wei: {err:#}");
                    Ok(fallback)
                }
                None => {
                    warn!("Failed to read current price and no fallback is configured: {err:#}");
                    Err(MintError::PriceUnavailable(format!("{err:#}")))
                }
            },
        }
    }

    async fn await_receipt(&self, tx_hash: &str) -> Result<(Option<u64>, Option<u64>), MintError> {
        let started = Instant::now();
        loop {
            let receipt = self
                .chain
                .transaction_receipt(tx_hash)
                .await
                .map_err(|err| MintError::Receipt(format!("{err:#}")))?;

            if let Some(receipt) = receipt {
                debug!("Receipt for {} available", receipt.transaction_hash);
                if !receipt.succeeded() {
                    return Err(MintError::Reverted {
                        tx_hash: tx_hash.to_string(),
                    });
                }
                let block_number = receipt
                    .block_number
                    .as_deref()
                    .and_then(|raw| abi::parse_quantity(raw).ok());
                let gas_used = receipt
                    .gas_used
                    .as_deref()
                    .and_then(|raw| abi::parse_quantity(raw).ok());
                return Ok((block_number, gas_used));
            }

            if started.elapsed() >= self.receipt_timeout {
                return Err(MintError::ReceiptTimeout {
                    tx_hash: tx_hash.to_string(),
                    waited_ms: started.elapsed().as_millis(),
                });
            }
            debug!("Receipt for {tx_hash} not available yet");
            sleep(self.receipt_poll_interval).await;
        }
    }
}

pub struct SimulatedMinter {
    max_mint_per_tx: u32,
}

impl SimulatedMinter {
    pub fn new(max_mint_per_tx: u32) -> Self {
        assert!(max_mint_per_tx > 0, "Max mint per tx must be positive");
        Self { max_mint_per_tx }
    }

    pub async fn mint(&self, address: &str, quantity: u32) -> Result<MintReceipt, MintError> {
        validate_request(address, quantity, self.max_mint_per_tx)?;
        sleep(SIMULATED_MINT_DURATION).await;
        Ok(MintReceipt {
            request_address: address.to_string(),
            quantity,
            tx_hash: None,
            block_number: None,
            gas_used: None,
            value_wei: "0".to_string(),
            simulated: true,
            completed_at: Utc::now(),
        })
    }
}

fn validate_request(address: &str, quantity: u32, max: u32) -> Result<(), MintError> {
    if !abi::is_valid_address(address) {
        return Err(MintError::InvalidAddress(address.to_string()));
    }
    if quantity == 0 || quantity > max {
        return Err(MintError::InvalidQuantity {
            requested: quantity,
            max,
        });
    }
    Ok(())
}
