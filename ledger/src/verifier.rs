//! One-time model attestations
//!
//! Each model hash moves `Unverified -> Verified` exactly once, on a signature
//! from the configured validator key. `Verified` is terminal.

use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::{LedgerError, Result};
use crate::events::LedgerEvent;
use crate::signature::SignatureVerifier;
use crate::types::{CallContext, ModelHash};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttestationState {
    Unverified,
    Verified,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelAttestation {
    pub model_hash: ModelHash,
    /// Who submitted the attestation; the signer is always the validator.
    pub submitter: Address,
    pub validator_signature: Bytes,
    pub verified_at: i64,
}

#[derive(Clone, Debug)]
pub struct ModelVerificationLedger {
    validator: SignatureVerifier,
    attestations: HashMap<ModelHash, ModelAttestation>,
}

impl ModelVerificationLedger {
    pub fn new(validator: Address) -> Result<Self> {
        Ok(Self {
            validator: SignatureVerifier::new(validator)?,
            attestations: HashMap::new(),
        })
    }

    pub fn validator(&self) -> Address {
        self.validator.authorized()
    }

    pub fn state(&self, model_hash: &ModelHash) -> AttestationState {
        if self.attestations.contains_key(model_hash) {
            AttestationState::Verified
        } else {
            AttestationState::Unverified
        }
    }

    pub fn is_verified(&self, model_hash: &ModelHash) -> bool {
        self.state(model_hash) == AttestationState::Verified
    }

    pub fn attestation(&self, model_hash: &ModelHash) -> Option<&ModelAttestation> {
        self.attestations.get(model_hash)
    }

    /// Record the validator's attestation for `model_hash`.
    ///
    /// The signed message is the model hash itself. A repeat call after
    /// success always fails and emits nothing.
    pub fn verify_model(
        &mut self,
        ctx: &CallContext,
        model_hash: ModelHash,
        signature: &[u8],
    ) -> Result<LedgerEvent> {
        if self.is_verified(&model_hash) {
            return Err(LedgerError::AlreadyVerified(model_hash));
        }
        if !self.validator.verify(&model_hash, signature) {
            warn!(%model_hash, submitter = %ctx.caller, "rejected model attestation");
            return Err(LedgerError::InvalidSignature);
        }

        self.attestations.insert(
            model_hash,
            ModelAttestation {
                model_hash,
                submitter: ctx.caller,
                validator_signature: Bytes::copy_from_slice(signature),
                verified_at: ctx.timestamp,
            },
        );

        info!(%model_hash, submitter = %ctx.caller, "model verified");
        Ok(LedgerEvent::ModelVerified {
            model_hash,
            submitter: ctx.caller,
        })
    }
}
