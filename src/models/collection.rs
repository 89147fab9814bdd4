use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionView {
    pub contract_address: String,
    pub total_supply: u64,
    /// Decimal string; wei amounts overflow JSON numbers.
    pub mint_price_wei: Option<String>,
    pub max_mint_per_tx: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerTokensView {
    pub address: String,
    pub balance: u64,
    pub token_ids: Vec<String>,
    pub truncated: bool,
}
