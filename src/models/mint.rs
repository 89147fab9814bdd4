use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::minter::MintReceipt;

#[derive(Debug, Clone, Deserialize)]
pub struct MintSubmissionRequest {
    pub address: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MintSubmissionResponse {
    pub request_id: Uuid,
    pub enqueued_at: DateTime<Utc>,
    pub receipt: MintReceipt,
}
