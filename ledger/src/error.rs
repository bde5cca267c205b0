//! Error taxonomy shared by every ledger

use alloy_primitives::{Address, B256, U256};
use thiserror::Error;

use crate::types::AssetId;

/// Every way a ledger call can fail.
///
/// A failed call never leaves partial state behind, and none of these are
/// retried internally. `kind()` is the stable name relayers and clients match
/// on; the `Display` text is for humans.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("caller {0} is not authorized")]
    Unauthorized(Address),

    #[error("caller {0} is not the bridge oracle")]
    UnauthorizedOracle(Address),

    #[error("invalid address: {0}")]
    InvalidAddress(&'static str),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("token {0} is not registered")]
    UnregisteredToken(AssetId),

    #[error("asset {0} has no registration")]
    UnregisteredAsset(AssetId),

    #[error("transfer failed: {0}")]
    TransferFailed(String),

    #[error("invalid validator signature")]
    InvalidSignature,

    #[error("model {0} already verified")]
    AlreadyVerified(B256),

    #[error("model {0} is not registered")]
    ModelNotRegistered(B256),

    #[error("arithmetic overflow")]
    Overflow,

    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: U256, available: U256 },

    #[error("invalid claim proof: {0}")]
    InvalidProof(String),

    #[error("claim proof {0} already used")]
    ProofAlreadyUsed(B256),

    #[error("use depositTokens for native bridging")]
    DirectTransferRejected,

    #[error("invalid model hash")]
    InvalidHash,

    #[error("model uri exceeds maximum length ({max} bytes)")]
    UriTooLong { max: usize },

    #[error("model {0} already registered")]
    ModelAlreadyRegistered(B256),

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("wrong chain: expected {expected}, got {actual}")]
    WrongChain { expected: u64, actual: u64 },

    #[error("invalid nonce: expected {expected}, got {actual}")]
    InvalidNonce { expected: u64, actual: u64 },
}

impl LedgerError {
    /// Stable taxonomy name of this failure.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::Unauthorized(_) => "Unauthorized",
            LedgerError::UnauthorizedOracle(_) => "UnauthorizedOracle",
            LedgerError::InvalidAddress(_) => "InvalidAddress",
            LedgerError::InvalidAmount(_) => "InvalidAmount",
            LedgerError::UnregisteredToken(_) => "UnregisteredToken",
            LedgerError::UnregisteredAsset(_) => "UnregisteredAsset",
            LedgerError::TransferFailed(_) => "TransferFailed",
            LedgerError::InvalidSignature => "InvalidSignature",
            LedgerError::AlreadyVerified(_) => "AlreadyVerified",
            LedgerError::ModelNotRegistered(_) => "ModelNotRegistered",
            LedgerError::Overflow => "Overflow",
            LedgerError::InsufficientBalance { .. } => "InsufficientBalance",
            LedgerError::InvalidProof(_) => "InvalidProof",
            LedgerError::ProofAlreadyUsed(_) => "ProofAlreadyUsed",
            LedgerError::DirectTransferRejected => "DirectTransferRejected",
            LedgerError::InvalidHash => "InvalidHash",
            LedgerError::UriTooLong { .. } => "UriTooLong",
            LedgerError::ModelAlreadyRegistered(_) => "ModelAlreadyRegistered",
            LedgerError::InvalidSymbol(_) => "InvalidSymbol",
            LedgerError::WrongChain { .. } => "WrongChain",
            LedgerError::InvalidNonce { .. } => "InvalidNonce",
        }
    }

    /// Whether resubmitting the same call can succeed once outside conditions
    /// change (an approval is granted, liquidity arrives).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::TransferFailed(_) | LedgerError::InsufficientBalance { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
