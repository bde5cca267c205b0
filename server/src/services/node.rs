//! Devnet node service
//!
//! Wraps one `Chain` behind an async mutex so transactions apply strictly
//! one after another, plus the content-addressed model store used for
//! inference.

use deepchain_ledger::primitives::Address;
use deepchain_ledger::signature::recover_transaction_signer;
use deepchain_ledger::{
    AssetBank, AssetDirectory, Chain, EventRecord, InMemoryModelStore, ModelHash, ModelStore,
    Receipt, Transaction,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::AppError;
use crate::models::{AccountInfo, HealthResponse, ModelView, ReputationView};

/// Largest page served from the event log.
pub const MAX_EVENT_PAGE: usize = 500;

pub struct NodeService {
    chain: Mutex<Chain>,
    models: RwLock<InMemoryModelStore>,
}

impl NodeService {
    /// Build the chain and apply genesis allocations and registrations.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut chain = Chain::new(config.chain_config())?;

        for (account, amount) in &config.genesis_balances {
            chain.bank_mut().mint_native(*account, *amount)?;
        }
        for (token, holder, amount) in &config.genesis_tokens {
            chain.bank_mut().mint(*token, *holder, *amount)?;
        }
        for (asset, symbol) in &config.registered_tokens {
            chain.register_genesis_asset(*asset, symbol)?;
            info!(%asset, %symbol, "genesis asset registered");
        }

        Ok(Self {
            chain: Mutex::new(chain),
            models: RwLock::new(InMemoryModelStore::new()),
        })
    }

    pub async fn health(&self) -> HealthResponse {
        let chain = self.chain.lock().await;
        HealthResponse {
            status: "healthy".to_string(),
            chain_id: chain.chain_id(),
            bridge: chain.bridge().address(),
            oracle: chain.bridge().oracle(),
            cross_chain_fee_bps: chain.bridge().cross_chain_fee(),
            events: chain.log().len() as u64,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub async fn assets(&self) -> AssetDirectory {
        AssetDirectory::from_registry(self.chain.lock().await.registry())
    }

    /// One page of the event log starting at `since`, plus the next cursor.
    pub async fn events_since(&self, since: u64, limit: usize) -> (u64, Vec<EventRecord>) {
        let chain = self.chain.lock().await;
        let page: Vec<EventRecord> = chain
            .log()
            .since(since)
            .iter()
            .take(limit.min(MAX_EVENT_PAGE))
            .cloned()
            .collect();
        let next = page
            .last()
            .map(|record| record.id.sequence + 1)
            .unwrap_or(since);
        (next, page)
    }

    pub async fn account(&self, address: Address) -> AccountInfo {
        let chain = self.chain.lock().await;
        AccountInfo {
            address,
            nonce: chain.nonce(&address),
            native_balance: chain.bank().native_balance(address),
        }
    }

    pub async fn model(&self, model_hash: ModelHash) -> Option<ModelView> {
        let chain = self.chain.lock().await;
        let registered = chain.models().get(&model_hash)?;
        let indexed = chain.index().model(&model_hash);
        let attestation = chain.verifier().attestation(&model_hash);

        Some(ModelView {
            model_hash,
            owner: registered.owner,
            uri: registered.uri.clone(),
            price: registered.price,
            registered_at: registered.registered_at,
            verified: attestation.is_some(),
            verification_count: indexed.map(|m| m.verification_count).unwrap_or_default(),
            verified_by: attestation.map(|a| a.submitter),
        })
    }

    pub async fn reputation(&self, account: Address) -> ReputationView {
        let chain = self.chain.lock().await;
        let reputation = chain.reputation();
        ReputationView {
            account,
            cumulative_stake: reputation.cumulative_stake(&account),
            score: reputation.reputation_score(&account),
            staking_token: reputation.staking_token(),
        }
    }

    /// Authenticate and apply a signed transaction.
    pub async fn submit(&self, payload: &str, signature: &[u8]) -> Result<Receipt, AppError> {
        let caller = recover_transaction_signer(payload.as_bytes(), signature)
            .ok_or(AppError::InvalidSignature)?;
        let tx: Transaction = serde_json::from_str(payload)
            .map_err(|e| AppError::BadRequest(format!("Invalid transaction payload: {}", e)))?;
        debug!(%caller, method = tx.call.name(), nonce = tx.nonce, "transaction received");

        let mut chain = self.chain.lock().await;
        let receipt = chain.execute(caller, tx, chrono::Utc::now().timestamp())?;
        Ok(receipt)
    }

    pub async fn store_model(&self, artifact: &[u8]) -> Result<String, AppError> {
        Ok(self.models.write().await.put(artifact)?)
    }

    pub async fn infer(&self, model_id: &str, input: &[f32]) -> Result<Vec<f32>, AppError> {
        let model = self.models.read().await.load_model(model_id)?;
        Ok(model.predict(input)?)
    }
}
