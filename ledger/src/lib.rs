//! DeepChain Ledger
//!
//! State-transition logic for the DeepChain protocol:
//! - a lock-and-release bridge moving native value or registered tokens
//!   between two independent ledgers
//! - one-time model attestations signed by a trusted validator
//! - stake-weighted reputation scores
//!
//! Every mutating operation is all-or-nothing: it validates, moves external
//! assets, and only then commits its own state and returns the notification
//! it emitted.

pub mod amount;
pub mod bank;
pub mod bridge;
pub mod chain;
pub mod error;
pub mod events;
pub mod indexer;
pub mod inference;
pub mod model_registry;
pub mod relay;
pub mod reputation;
pub mod signature;
pub mod token_registry;
pub mod types;
pub mod verifier;

pub use alloy_primitives as primitives;

pub use crate::amount::{fee, isqrt, net_of, Amount, BPS_DENOMINATOR, MINIMUM_DEPOSIT};
pub use crate::bank::{AssetBank, InMemoryBank};
pub use crate::bridge::{claim_digest, BridgeConfig, BridgeLedger, ProofValidator};
pub use crate::chain::{Call, Chain, ChainConfig, Receipt, ReceiptError, ReceiptStatus, Transaction};
pub use crate::error::{LedgerError, Result};
pub use crate::events::{EventId, EventLog, EventRecord, LedgerEvent};
pub use crate::indexer::{ModelIndex, ModelRecord};
pub use crate::inference::{InMemoryModelStore, InferenceError, LoadedModel, ModelArtifact, ModelStore};
pub use crate::model_registry::ModelRegistry;
pub use crate::relay::{decode_proof, plan_claim, AssetDirectory, AssetEntry, ClaimOrder, SkipReason, SymbolDirectory};
pub use crate::reputation::ReputationLedger;
pub use crate::signature::{recover_transaction_signer, transaction_message, SignatureVerifier};
pub use crate::token_registry::TokenRegistry;
pub use crate::types::{AssetId, CallContext, ModelHash, Symbol};
pub use crate::verifier::ModelVerificationLedger;
