//! Model registration

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::amount::Amount;
use crate::error::{LedgerError, Result};
use crate::events::LedgerEvent;
use crate::types::{CallContext, ModelHash};

/// Longest accepted storage URI (IPFS/Arweave), in bytes.
pub const MAX_URI_LEN: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredModel {
    pub model_hash: ModelHash,
    pub owner: Address,
    pub uri: String,
    pub price: Amount,
    pub registered_at: i64,
}

#[derive(Clone, Debug, Default)]
pub struct ModelRegistry {
    models: HashMap<ModelHash, RegisteredModel>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// List a model under its content hash, owned by the caller.
    pub fn register_model(
        &mut self,
        ctx: &CallContext,
        model_hash: ModelHash,
        uri: impl Into<String>,
        price: Amount,
    ) -> Result<LedgerEvent> {
        let uri = uri.into();
        if model_hash.is_zero() {
            return Err(LedgerError::InvalidHash);
        }
        if uri.len() > MAX_URI_LEN {
            return Err(LedgerError::UriTooLong { max: MAX_URI_LEN });
        }
        if self.models.contains_key(&model_hash) {
            return Err(LedgerError::ModelAlreadyRegistered(model_hash));
        }

        self.models.insert(
            model_hash,
            RegisteredModel {
                model_hash,
                owner: ctx.caller,
                uri: uri.clone(),
                price,
                registered_at: ctx.timestamp,
            },
        );

        info!(%model_hash, owner = %ctx.caller, %uri, "model registered");
        Ok(LedgerEvent::ModelRegistered {
            model_hash,
            owner: ctx.caller,
            timestamp: ctx.timestamp,
            price,
            uri,
        })
    }

    pub fn get(&self, model_hash: &ModelHash) -> Option<&RegisteredModel> {
        self.models.get(model_hash)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
