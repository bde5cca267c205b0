//! Accepted assets and their canonical cross-chain symbols

use alloy_primitives::Address;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

use crate::error::{LedgerError, Result};
use crate::events::LedgerEvent;
use crate::types::{symbol_to_string, AssetId, Symbol};

/// Owner-managed table of assets the bridge will move.
///
/// An asset missing from this table can never be deposited or claimed.
#[derive(Clone, Debug)]
pub struct TokenRegistry {
    owner: Address,
    symbols: BTreeMap<AssetId, Symbol>,
    assets: HashMap<Symbol, AssetId>,
}

impl TokenRegistry {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            symbols: BTreeMap::new(),
            assets: HashMap::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Register `asset` under `symbol`, or move an existing registration to a
    /// new symbol. Owner only.
    pub fn register(&mut self, caller: Address, asset: AssetId, symbol: Symbol) -> Result<LedgerEvent> {
        if caller != self.owner {
            return Err(LedgerError::Unauthorized(caller));
        }
        if symbol.is_zero() {
            return Err(LedgerError::InvalidSymbol("empty symbol".to_string()));
        }
        if let Some(existing) = self.assets.get(&symbol) {
            if *existing != asset {
                return Err(LedgerError::InvalidSymbol(format!(
                    "{} is already bound to {}",
                    symbol_to_string(&symbol),
                    existing
                )));
            }
        }

        if let Some(previous) = self.symbols.insert(asset, symbol) {
            self.assets.remove(&previous);
        }
        self.assets.insert(symbol, asset);

        info!(%asset, symbol = %symbol_to_string(&symbol), "asset registered");
        Ok(LedgerEvent::TokenRegistered { asset, symbol })
    }

    pub fn is_registered(&self, asset: AssetId) -> bool {
        self.symbols.contains_key(&asset)
    }

    pub fn symbol_of(&self, asset: AssetId) -> Result<Symbol> {
        self.symbols
            .get(&asset)
            .copied()
            .ok_or(LedgerError::UnregisteredAsset(asset))
    }

    /// Reverse lookup used to map an asset onto the counterpart ledger.
    pub fn asset_by_symbol(&self, symbol: &Symbol) -> Option<AssetId> {
        self.assets.get(symbol).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AssetId, Symbol)> + '_ {
        self.symbols.iter().map(|(asset, symbol)| (*asset, *symbol))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
