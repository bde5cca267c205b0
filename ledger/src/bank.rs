//! External asset movement
//!
//! The ledgers never hold balances of their own accounts' assets directly;
//! they move value through an `AssetBank`, which stands for the chain's native
//! balances and its token contracts. Each bank call is atomic on its own: it
//! either moves the full amount or changes nothing.

use alloy_primitives::{Address, U256};
use std::collections::HashMap;

use crate::amount::Amount;
use crate::error::{LedgerError, Result};
use crate::types::AssetId;

pub trait AssetBank {
    fn native_balance(&self, account: Address) -> Amount;

    fn token_balance(&self, token: Address, account: Address) -> Amount;

    fn allowance(&self, token: Address, owner: Address, spender: Address) -> Amount;

    /// Move native value between accounts.
    fn native_transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<()>;

    /// Token transfer initiated by the holder.
    fn token_transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<()>;

    /// Token pull by `spender` against an allowance granted by `from`.
    fn token_transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<()>;

    fn balance(&self, asset: AssetId, account: Address) -> Amount {
        match asset {
            AssetId::Native => self.native_balance(account),
            AssetId::Token(token) => self.token_balance(token, account),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct TokenBook {
    balances: HashMap<Address, Amount>,
    allowances: HashMap<(Address, Address), Amount>,
}

/// Native balances plus ERC20-style token books, held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryBank {
    native: HashMap<Address, Amount>,
    tokens: HashMap<Address, TokenBook>,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit native value out of thin air (genesis allocations, tests).
    pub fn mint_native(&mut self, account: Address, amount: Amount) -> Result<()> {
        let balance = self.native.entry(account).or_default();
        *balance = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Mint `amount` of `token` to `account`.
    pub fn mint(&mut self, token: Address, account: Address, amount: Amount) -> Result<()> {
        if token.is_zero() {
            return Err(LedgerError::InvalidAddress("token"));
        }
        let book = self.tokens.entry(token).or_default();
        let balance = book.balances.entry(account).or_default();
        *balance = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Set the allowance `spender` may pull from `owner`.
    pub fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: Amount) {
        self.tokens
            .entry(token)
            .or_default()
            .allowances
            .insert((owner, spender), amount);
    }

    pub fn is_token(&self, token: Address) -> bool {
        self.tokens.contains_key(&token)
    }
}

/// Compute both sides of a move before touching either.
fn settle(
    balances: &mut HashMap<Address, Amount>,
    from: Address,
    to: Address,
    amount: Amount,
    what: &str,
) -> Result<()> {
    let available = balances.get(&from).copied().unwrap_or_default();
    let debited = available.checked_sub(amount).ok_or_else(|| {
        LedgerError::TransferFailed(format!(
            "{} balance of {} is {}, need {}",
            what, from, available, amount
        ))
    })?;
    if from == to {
        return Ok(());
    }
    let credited = balances
        .get(&to)
        .copied()
        .unwrap_or_default()
        .checked_add(amount)
        .ok_or(LedgerError::Overflow)?;

    balances.insert(from, debited);
    balances.insert(to, credited);
    Ok(())
}

impl AssetBank for InMemoryBank {
    fn native_balance(&self, account: Address) -> Amount {
        self.native.get(&account).copied().unwrap_or_default()
    }

    fn token_balance(&self, token: Address, account: Address) -> Amount {
        self.tokens
            .get(&token)
            .and_then(|book| book.balances.get(&account))
            .copied()
            .unwrap_or_default()
    }

    fn allowance(&self, token: Address, owner: Address, spender: Address) -> Amount {
        self.tokens
            .get(&token)
            .and_then(|book| book.allowances.get(&(owner, spender)))
            .copied()
            .unwrap_or_default()
    }

    fn native_transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<()> {
        settle(&mut self.native, from, to, amount, "native")
    }

    fn token_transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<()> {
        let book = self
            .tokens
            .get_mut(&token)
            .ok_or_else(|| LedgerError::TransferFailed(format!("no token contract at {}", token)))?;
        settle(&mut book.balances, from, to, amount, "token")
    }

    fn token_transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<()> {
        let book = self
            .tokens
            .get_mut(&token)
            .ok_or_else(|| LedgerError::TransferFailed(format!("no token contract at {}", token)))?;

        let allowance = book
            .allowances
            .get(&(from, spender))
            .copied()
            .unwrap_or_default();
        if allowance < amount {
            return Err(LedgerError::TransferFailed(format!(
                "allowance of {} for {} is {}, need {}",
                from, spender, allowance, amount
            )));
        }

        settle(&mut book.balances, from, to, amount, "token")?;

        // An unlimited approval is never drawn down
        if allowance != U256::MAX {
            book.allowances.insert((from, spender), allowance - amount);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: Address = Address::repeat_byte(0xAA);
    const ALICE: Address = Address::repeat_byte(0x01);
    const BOB: Address = Address::repeat_byte(0x02);
    const SPENDER: Address = Address::repeat_byte(0x03);

    #[test]
    fn test_native_transfer_moves_value() {
        let mut bank = InMemoryBank::new();
        bank.mint_native(ALICE, U256::from(100)).unwrap();

        bank.native_transfer(ALICE, BOB, U256::from(40)).unwrap();
        assert_eq!(bank.native_balance(ALICE), U256::from(60));
        assert_eq!(bank.native_balance(BOB), U256::from(40));
    }

    #[test]
    fn test_shortfall_changes_nothing() {
        let mut bank = InMemoryBank::new();
        bank.mint_native(ALICE, U256::from(10)).unwrap();

        let err = bank.native_transfer(ALICE, BOB, U256::from(11)).unwrap_err();
        assert_eq!(err.kind(), "TransferFailed");
        assert_eq!(bank.native_balance(ALICE), U256::from(10));
        assert_eq!(bank.native_balance(BOB), U256::ZERO);
    }

    #[test]
    fn test_transfer_from_requires_allowance() {
        let mut bank = InMemoryBank::new();
        bank.mint(TOKEN, ALICE, U256::from(100)).unwrap();

        let err = bank
            .token_transfer_from(TOKEN, SPENDER, ALICE, BOB, U256::from(5))
            .unwrap_err();
        assert!(matches!(err, LedgerError::TransferFailed(_)));

        bank.approve(TOKEN, ALICE, SPENDER, U256::from(30));
        bank.token_transfer_from(TOKEN, SPENDER, ALICE, BOB, U256::from(20))
            .unwrap();
        assert_eq!(bank.token_balance(TOKEN, BOB), U256::from(20));
        assert_eq!(bank.allowance(TOKEN, ALICE, SPENDER), U256::from(10));
    }

    #[test]
    fn test_unlimited_allowance_is_not_consumed() {
        let mut bank = InMemoryBank::new();
        bank.mint(TOKEN, ALICE, U256::from(100)).unwrap();
        bank.approve(TOKEN, ALICE, SPENDER, U256::MAX);

        bank.token_transfer_from(TOKEN, SPENDER, ALICE, BOB, U256::from(50))
            .unwrap();
        assert_eq!(bank.allowance(TOKEN, ALICE, SPENDER), U256::MAX);
    }

    #[test]
    fn test_unknown_token_fails_transfer() {
        let mut bank = InMemoryBank::new();
        let err = bank
            .token_transfer(TOKEN, ALICE, BOB, U256::from(1))
            .unwrap_err();
        assert_eq!(err.kind(), "TransferFailed");
    }

    #[test]
    fn test_balance_dispatches_on_asset() {
        let mut bank = InMemoryBank::new();
        bank.mint_native(ALICE, U256::from(7)).unwrap();
        bank.mint(TOKEN, ALICE, U256::from(9)).unwrap();

        assert_eq!(bank.balance(AssetId::Native, ALICE), U256::from(7));
        assert_eq!(bank.balance(AssetId::Token(TOKEN), ALICE), U256::from(9));
    }
}
