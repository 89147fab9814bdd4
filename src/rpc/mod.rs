use std::time::Duration;

use anyhow::{Context, Result};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::{Deserialize, Serialize};

use crate::abi;

const BLOCK_TAG_LATEST: &str = "latest";

#[derive(Clone)]
pub struct ChainClient {
    inner: HttpClient,
    contract_address: String,
    timeout: Duration,
}

impl ChainClient {
    pub fn new(endpoint: &str, contract_address: &str, timeout: Duration) -> Result<Self> {
        assert!(!endpoint.is_empty(), "RPC endpoint must be provided");
        assert!(
            timeout >= Duration::from_millis(100),
            "Timeout below 100ms is unsafe"
        );
        abi::parse_address(contract_address)
            .with_context(|| format!("Invalid contract address {contract_address}"))?;

        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(endpoint)
            .with_context(|| format!("Failed to build RPC client for {endpoint}"))?;

        Ok(Self {
            inner: client,
            contract_address: contract_address.to_string(),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        assert!(
            self.timeout <= Duration::from_secs(60),
            "Timeout exceeds maximum bound"
        );
        self.timeout
    }

    pub fn contract_address(&self) -> &str {
        &self.contract_address
    }

    pub async fn fetch_latest_block_number(&self) -> Result<u64> {
        let response: String = self
            .inner
            .request("eth_blockNumber", rpc_params![])
            .await
            .context("RPC call eth_blockNumber failed")?;
        let block_number = abi::parse_quantity(&response)?;
        assert!(
            block_number < 1_000_000_000_000,
            "Block height sanity check failed"
        );
        Ok(block_number)
    }

    pub async fn total_supply(&self) -> Result<u64> {
        let output = self.call(abi::encode_call(abi::TOTAL_SUPPLY, &[])).await?;
        let supply = abi::decode_uint(&output)?;
        u64::try_from(supply).context("Total supply exceeds u64 bounds")
    }

    pub async fn current_price(&self) -> Result<u128> {
        let output = self
            .call(abi::encode_call(abi::GET_CURRENT_PRICE, &[]))
            .await?;
        abi::decode_uint(&output)
    }

    pub async fn balance_of(&self, owner: &str) -> Result<u64> {
        let data = abi::encode_call(abi::BALANCE_OF, &[abi::encode_address(owner)?]);
        let balance = abi::decode_uint(&self.call(data).await?)?;
        u64::try_from(balance).context("Balance exceeds u64 bounds")
    }

    pub async fn token_of_owner_by_index(&self, owner: &str, index: u64) -> Result<u128> {
        let data = abi::encode_call(
            abi::TOKEN_OF_OWNER_BY_INDEX,
            &[
                abi::encode_address(owner)?,
                abi::encode_uint(u128::from(index)),
            ],
        );
        abi::decode_uint(&self.call(data).await?)
    }

    /// Native balance of `owner` in wei.
    pub async fn balance(&self, owner: &str) -> Result<u128> {
        abi::parse_address(owner).with_context(|| format!("Invalid owner address {owner}"))?;
        let response: String = self
            .inner
            .request("eth_getBalance", rpc_params![owner, BLOCK_TAG_LATEST])
            .await
            .context("RPC call eth_getBalance failed")?;
        abi::parse_wei(&response)
    }

    /// Submits a transaction signed by a node-managed account and returns its hash.
    pub async fn send_transaction(&self, request: &TransactionRequest) -> Result<String> {
        assert!(!request.from.is_empty(), "Sender address must be provided");
        let tx_hash: String = self
            .inner
            .request("eth_sendTransaction", rpc_params![request])
            .await
            .context("RPC call eth_sendTransaction failed")?;
        assert!(!tx_hash.is_empty(), "RPC returned empty transaction hash");
        Ok(tx_hash)
    }

    pub async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<TransactionReceipt>> {
        assert!(!tx_hash.is_empty(), "Transaction hash must be provided");
        self.inner
            .request("eth_getTransactionReceipt", rpc_params![tx_hash])
            .await
            .context("RPC call eth_getTransactionReceipt failed")
    }

    async fn call(&self, data: String) -> Result<String> {
        let request = CallRequest {
            to: &self.contract_address,
            data,
        };
        self.inner
            .request("eth_call", rpc_params![request, BLOCK_TAG_LATEST])
            .await
            .context("RPC call eth_call failed")
    }
}

#[derive(Debug, Serialize)]
struct CallRequest<'a> {
    to: &'a str,
    data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionRequest {
    pub from: String,
    pub to: String,
    pub value: String,
    pub gas: String,
    pub data: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    pub block_number: Option<String>,
    pub gas_used: Option<String>,
    pub status: Option<String>,
}

impl TransactionReceipt {
    /// Pre-Byzantium receipts carry no status and are treated as successful.
    pub fn succeeded(&self) -> bool {
        !matches!(self.status.as_deref(), Some("0x0"))
    }
}
