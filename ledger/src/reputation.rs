//! Stake-weighted reputation
//!
//! `score = isqrt(cumulative_stake)`, recomputed from the full total on every
//! stake. Stake only grows; there is no unstake path.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::amount::{isqrt, Amount};
use crate::bank::AssetBank;
use crate::error::{LedgerError, Result};
use crate::events::LedgerEvent;
use crate::types::CallContext;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationAccount {
    pub cumulative_stake: Amount,
    pub score: Amount,
}

#[derive(Clone, Debug)]
pub struct ReputationLedger {
    owner: Address,
    /// Account that takes custody of staked tokens.
    address: Address,
    staking_token: Address,
    accounts: HashMap<Address, ReputationAccount>,
}

impl ReputationLedger {
    pub fn new(owner: Address, address: Address, staking_token: Address) -> Result<Self> {
        if address.is_zero() {
            return Err(LedgerError::InvalidAddress("reputation ledger"));
        }
        if staking_token.is_zero() {
            return Err(LedgerError::InvalidAddress("staking token"));
        }
        Ok(Self {
            owner,
            address,
            staking_token,
            accounts: HashMap::new(),
        })
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn staking_token(&self) -> Address {
        self.staking_token
    }

    pub fn account(&self, account: &Address) -> Option<&ReputationAccount> {
        self.accounts.get(account)
    }

    pub fn reputation_score(&self, account: &Address) -> Amount {
        self.accounts
            .get(account)
            .map(|a| a.score)
            .unwrap_or_default()
    }

    pub fn cumulative_stake(&self, account: &Address) -> Amount {
        self.accounts
            .get(account)
            .map(|a| a.cumulative_stake)
            .unwrap_or_default()
    }

    /// Pull `amount` of the staking token from the caller and rescore them.
    ///
    /// The caller must have approved this ledger's address beforehand.
    pub fn stake_for_reputation(
        &mut self,
        ctx: &CallContext,
        bank: &mut impl AssetBank,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        if amount == U256::ZERO {
            return Err(LedgerError::InvalidAmount("stake must be positive".to_string()));
        }
        let total = self
            .cumulative_stake(&ctx.caller)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;

        bank.token_transfer_from(self.staking_token, self.address, ctx.caller, self.address, amount)?;

        let score = isqrt(total);
        self.accounts.insert(
            ctx.caller,
            ReputationAccount {
                cumulative_stake: total,
                score,
            },
        );

        info!(account = %ctx.caller, %amount, %total, %score, "reputation updated");
        Ok(LedgerEvent::ReputationUpdated {
            account: ctx.caller,
            score,
        })
    }

    /// Point staking at a different token. Owner only.
    pub fn set_token_registry(&mut self, ctx: &CallContext, staking_token: Address) -> Result<LedgerEvent> {
        if ctx.caller != self.owner {
            return Err(LedgerError::Unauthorized(ctx.caller));
        }
        if staking_token.is_zero() {
            return Err(LedgerError::InvalidAddress("staking token"));
        }
        self.staking_token = staking_token;

        info!(token = %staking_token, "staking token updated");
        Ok(LedgerEvent::StakingTokenUpdated {
            token: staking_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::ether;
    use crate::bank::InMemoryBank;

    const OWNER: Address = Address::repeat_byte(0x01);
    const LEDGER: Address = Address::repeat_byte(0x02);
    const REP: Address = Address::repeat_byte(0x03);
    const USER1: Address = Address::repeat_byte(0x11);
    const USER2: Address = Address::repeat_byte(0x12);

    fn setup() -> (ReputationLedger, InMemoryBank) {
        let ledger = ReputationLedger::new(OWNER, LEDGER, REP).unwrap();
        let mut bank = InMemoryBank::new();
        bank.mint(REP, OWNER, ether(1_000_000)).unwrap();
        (ledger, bank)
    }

    fn fund(bank: &mut InMemoryBank, user: Address, amount: Amount) {
        bank.token_transfer(REP, OWNER, user, amount).unwrap();
        bank.approve(REP, user, LEDGER, amount);
    }

    #[test]
    fn test_calculates_reputation() {
        let (mut ledger, mut bank) = setup();
        let stake = ether(1_000);
        fund(&mut bank, USER1, stake);

        let event = ledger
            .stake_for_reputation(&CallContext::new(USER1), &mut bank, stake)
            .unwrap();

        assert_eq!(
            event,
            LedgerEvent::ReputationUpdated {
                account: USER1,
                score: isqrt(stake)
            }
        );
        assert_eq!(ledger.reputation_score(&USER1), isqrt(stake));
        assert_eq!(bank.token_balance(REP, LEDGER), stake);
    }

    #[test]
    fn test_multiple_stakes_score_the_total() {
        let (mut ledger, mut bank) = setup();
        let s1 = ether(1_000);
        let s2 = ether(2_500);
        fund(&mut bank, USER1, s1);
        ledger
            .stake_for_reputation(&CallContext::new(USER1), &mut bank, s1)
            .unwrap();
        fund(&mut bank, USER1, s2);
        ledger
            .stake_for_reputation(&CallContext::new(USER1), &mut bank, s2)
            .unwrap();

        assert_eq!(ledger.cumulative_stake(&USER1), s1 + s2);
        assert_eq!(ledger.reputation_score(&USER1), isqrt(s1 + s2));
        assert_ne!(ledger.reputation_score(&USER1), isqrt(s1) + isqrt(s2));
    }

    #[test]
    fn test_zero_stake_rejected() {
        let (mut ledger, mut bank) = setup();
        let err = ledger
            .stake_for_reputation(&CallContext::new(USER1), &mut bank, U256::ZERO)
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidAmount");
        assert!(ledger.account(&USER1).is_none());
    }

    #[test]
    fn test_failed_transfer_gives_no_credit() {
        let (mut ledger, mut bank) = setup();
        // Tokens but no approval
        bank.token_transfer(REP, OWNER, USER2, ether(10)).unwrap();

        let err = ledger
            .stake_for_reputation(&CallContext::new(USER2), &mut bank, ether(10))
            .unwrap_err();

        assert_eq!(err.kind(), "TransferFailed");
        assert_eq!(ledger.cumulative_stake(&USER2), U256::ZERO);
        assert_eq!(bank.token_balance(REP, USER2), ether(10));
    }

    #[test]
    fn test_only_owner_sets_staking_token() {
        let (mut ledger, _) = setup();
        let err = ledger
            .set_token_registry(&CallContext::new(USER1), Address::ZERO)
            .unwrap_err();
        assert_eq!(err, LedgerError::Unauthorized(USER1));

        let err = ledger
            .set_token_registry(&CallContext::new(OWNER), Address::ZERO)
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidAddress");

        let other = Address::repeat_byte(0x44);
        ledger
            .set_token_registry(&CallContext::new(OWNER), other)
            .unwrap();
        assert_eq!(ledger.staking_token(), other);
    }
}
