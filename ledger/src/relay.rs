//! Turning source deposits into destination claims
//!
//! The relayer is the only link between the two ledgers. Each
//! `TokensDeposited` record maps to exactly one claim whose proof is the
//! record's own `EventId`, so the destination bridge's replay check makes
//! relaying idempotent.

use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amount::Amount;
use crate::events::{EventId, EventRecord, LedgerEvent};
use crate::token_registry::TokenRegistry;
use crate::types::{symbol_to_string, AssetId, Symbol};

/// Where assets and cross-chain symbols can be looked up.
pub trait SymbolDirectory {
    fn lookup_symbol(&self, asset: AssetId) -> Option<Symbol>;
    fn lookup_asset(&self, symbol: &Symbol) -> Option<AssetId>;
}

impl SymbolDirectory for TokenRegistry {
    fn lookup_symbol(&self, asset: AssetId) -> Option<Symbol> {
        self.symbol_of(asset).ok()
    }

    fn lookup_asset(&self, symbol: &Symbol) -> Option<AssetId> {
        self.asset_by_symbol(symbol)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub asset: AssetId,
    pub symbol: Symbol,
}

/// Snapshot of a remote ledger's registry, as served by a node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDirectory {
    pub entries: Vec<AssetEntry>,
}

impl AssetDirectory {
    pub fn from_registry(registry: &TokenRegistry) -> Self {
        registry.iter().map(|(asset, symbol)| AssetEntry { asset, symbol }).collect()
    }
}

impl FromIterator<AssetEntry> for AssetDirectory {
    fn from_iter<I: IntoIterator<Item = AssetEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl SymbolDirectory for AssetDirectory {
    fn lookup_symbol(&self, asset: AssetId) -> Option<Symbol> {
        self.entries.iter().find(|e| e.asset == asset).map(|e| e.symbol)
    }

    fn lookup_asset(&self, symbol: &Symbol) -> Option<AssetId> {
        self.entries.iter().find(|e| &e.symbol == symbol).map(|e| e.asset)
    }
}

/// A claim ready to be submitted to the destination ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimOrder {
    pub source: EventId,
    pub proof: Bytes,
    pub asset: AssetId,
    pub recipient: Address,
    pub amount: Amount,
}

/// Why a record produced no claim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("not a deposit")]
    NotADeposit,

    #[error("source asset {0} has no symbol")]
    UnknownSourceAsset(AssetId),

    #[error("symbol {0} is not registered on the destination")]
    UnknownDestinationSymbol(String),

    #[error("destination account is not an address")]
    InvalidRecipient,

    #[error("nothing left to release after fees")]
    ZeroAmount,
}

/// Plan the destination claim for one source record.
pub fn plan_claim(
    record: &EventRecord,
    source: &impl SymbolDirectory,
    destination: &impl SymbolDirectory,
) -> Result<ClaimOrder, SkipReason> {
    let LedgerEvent::TokensDeposited {
        asset,
        net_amount,
        destination: account,
        ..
    } = &record.event
    else {
        return Err(SkipReason::NotADeposit);
    };

    let symbol = source
        .lookup_symbol(*asset)
        .ok_or(SkipReason::UnknownSourceAsset(*asset))?;
    let target = destination
        .lookup_asset(&symbol)
        .ok_or_else(|| SkipReason::UnknownDestinationSymbol(symbol_to_string(&symbol)))?;

    // Account ids are left-padded addresses
    if account[..12].iter().any(|&b| b != 0) {
        return Err(SkipReason::InvalidRecipient);
    }
    let recipient = Address::from_word(*account);
    if recipient.is_zero() {
        return Err(SkipReason::InvalidRecipient);
    }
    if net_amount.is_zero() {
        return Err(SkipReason::ZeroAmount);
    }

    Ok(ClaimOrder {
        source: record.id,
        proof: Bytes::copy_from_slice(&record.id.encode()),
        asset: target,
        recipient,
        amount: *net_amount,
    })
}

/// Source event a claim proof refers to.
pub fn decode_proof(proof: &[u8]) -> Option<EventId> {
    EventId::decode(proof)
}
