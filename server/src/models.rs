//! Data models for API requests/responses

use deepchain_ledger::primitives::{Address, U256};
use deepchain_ledger::{EventRecord, ModelHash};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub chain_id: u64,
    pub bridge: Address,
    pub oracle: Address,
    pub cross_chain_fee_bps: u64,
    pub events: u64,
    pub version: String,
    pub timestamp: i64,
}

/// A signed transaction as submitted by clients.
///
/// `payload` is the JSON text of a `Transaction`; `signature` is the
/// hex-encoded 65-byte signature over
/// `transaction_message(payload)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTransaction {
    pub payload: String,
    pub signature: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsQuery {
    pub since: Option<u64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    pub chain_id: u64,
    /// Cursor for the next page.
    pub next: u64,
    pub events: Vec<EventRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub address: Address,
    pub nonce: u64,
    pub native_balance: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelView {
    pub model_hash: ModelHash,
    pub owner: Address,
    pub uri: String,
    pub price: U256,
    pub registered_at: i64,
    pub verified: bool,
    pub verification_count: u64,
    pub verified_by: Option<Address>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationView {
    pub account: Address,
    pub cumulative_stake: U256,
    pub score: U256,
    pub staking_token: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub model_id: String,
    pub input: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub model_id: String,
    pub results: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredModel {
    pub model_id: String,
}
