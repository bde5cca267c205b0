//! Identifiers and the per-call execution context

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::amount::Amount;
use crate::error::{LedgerError, Result};

/// 32-byte content hash identifying a model artifact.
pub type ModelHash = B256;

/// Canonical cross-chain asset symbol, right-padded with zeros.
pub type Symbol = B256;

/// Asset the bridge can move: the chain's native currency or a token.
///
/// On the wire the native asset is the zero address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "Address", into = "Address")]
pub enum AssetId {
    Native,
    Token(Address),
}

impl AssetId {
    pub fn is_native(&self) -> bool {
        matches!(self, AssetId::Native)
    }

    pub fn address(&self) -> Address {
        match self {
            AssetId::Native => Address::ZERO,
            AssetId::Token(token) => *token,
        }
    }
}

impl From<Address> for AssetId {
    fn from(address: Address) -> Self {
        if address.is_zero() {
            AssetId::Native
        } else {
            AssetId::Token(address)
        }
    }
}

impl From<AssetId> for Address {
    fn from(asset: AssetId) -> Self {
        asset.address()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Native => write!(f, "native"),
            AssetId::Token(token) => write!(f, "{}", token),
        }
    }
}

/// Encode a short string as a symbol (at most 31 bytes, zero terminated).
pub fn symbol_from_str(symbol: &str) -> Result<Symbol> {
    let bytes = symbol.as_bytes();
    if bytes.is_empty() || bytes.len() > 31 {
        return Err(LedgerError::InvalidSymbol(symbol.to_string()));
    }
    Ok(B256::right_padding_from(bytes))
}

/// Decode a symbol back to text, dropping the zero padding.
pub fn symbol_to_string(symbol: &Symbol) -> String {
    let end = symbol
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(symbol.len());
    String::from_utf8_lossy(&symbol[..end]).into_owned()
}

/// Destination account id for an address on the counterpart ledger.
pub fn account_id(address: Address) -> B256 {
    address.into_word()
}

/// Who is calling, what native value rides along, and when.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    pub value: Amount,
    pub timestamp: i64,
}

impl CallContext {
    /// Context at time zero; callers that record time supply it with `at`.
    pub fn new(caller: Address) -> Self {
        Self {
            caller,
            value: U256::ZERO,
            timestamp: 0,
        }
    }

    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_time_is_explicit() {
        let ctx = CallContext::new(Address::repeat_byte(0x11));
        assert_eq!(ctx.timestamp, 0);
        assert_eq!(ctx.value, U256::ZERO);
        assert_eq!(ctx.at(1_700_000_000).timestamp, 1_700_000_000);
    }

    #[test]
    fn test_zero_address_is_native() {
        assert_eq!(AssetId::from(Address::ZERO), AssetId::Native);
        let token = Address::repeat_byte(0x42);
        assert_eq!(AssetId::from(token), AssetId::Token(token));
        assert_eq!(Address::from(AssetId::Native), Address::ZERO);
    }

    #[test]
    fn test_asset_serializes_as_address() {
        let json = serde_json::to_string(&AssetId::Native).unwrap();
        assert_eq!(json, format!("\"{}\"", Address::ZERO));
        let back: AssetId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AssetId::Native);
    }

    #[test]
    fn test_symbol_encoding() {
        let tkn = symbol_from_str("TKN").unwrap();
        assert_eq!(&tkn[..3], b"TKN");
        assert!(tkn[3..].iter().all(|&b| b == 0));
        assert_eq!(symbol_to_string(&tkn), "TKN");

        assert!(symbol_from_str("").is_err());
        assert!(symbol_from_str(&"X".repeat(32)).is_err());
    }

    #[test]
    fn test_account_id_keeps_address_in_low_bytes() {
        let user = Address::repeat_byte(0x07);
        let id = account_id(user);
        assert_eq!(Address::from_word(id), user);
        assert!(id[..12].iter().all(|&b| b == 0));
    }
}
