//! Lock-and-release bridge
//!
//! # Deposit (source ledger)
//! 1. Caller deposits a registered asset at or above the minimum
//! 2. The fee is retained in custody, `TokensDeposited` reports the net amount
//! 3. A relayer watches the event and asks the oracle to authorize a claim
//!
//! # Claim (destination ledger)
//! 1. The oracle (or anyone holding an oracle-signed attestation) submits
//!    the claim with its proof
//! 2. The proof is checked for reuse and recorded
//! 3. Exactly `amount` is released to the recipient, no fee
//!
//! # Security
//! - Single oracle key gates every release
//! - Each proof is single-use
//! - Bare value transfers are rejected
//! - Check, move external assets, then commit: a failed transfer leaves no trace

use alloy_primitives::{keccak256, Address, B256, U256};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::amount::{self, Amount, BPS_DENOMINATOR, MINIMUM_DEPOSIT};
use crate::bank::AssetBank;
use crate::error::{LedgerError, Result};
use crate::events::LedgerEvent;
use crate::signature;
use crate::token_registry::TokenRegistry;
use crate::types::{AssetId, CallContext, Symbol};

/// Default cross-chain fee: 0.5%.
pub const DEFAULT_FEE_BPS: u64 = 50;

const CLAIM_DOMAIN: &[u8] = b"DEEPCHAIN_CLAIM_V1";

/// Extension point for deeper validation of claim proofs.
///
/// The bridge itself only requires a non-empty, never-seen proof from an
/// oracle-authorized caller.
pub trait ProofValidator: Send + Sync {
    fn validate(&self, proof: &[u8], asset: AssetId, recipient: Address, amount: Amount) -> Result<()>;
}

/// Accepts every proof the oracle vouches for.
#[derive(Clone, Copy, Debug, Default)]
pub struct OracleAttested;

impl ProofValidator for OracleAttested {
    fn validate(&self, _proof: &[u8], _asset: AssetId, _recipient: Address, _amount: Amount) -> Result<()> {
        Ok(())
    }
}

/// Digest the oracle signs to authorize a claim submitted by someone else.
///
/// `keccak256(domain || bridge || asset || recipient || amount || keccak256(proof))`
pub fn claim_digest(
    bridge: Address,
    asset: AssetId,
    recipient: Address,
    amount: Amount,
    proof: &[u8],
) -> B256 {
    let mut data = Vec::with_capacity(CLAIM_DOMAIN.len() + 3 * 20 + 2 * 32);
    data.extend_from_slice(CLAIM_DOMAIN);
    data.extend_from_slice(bridge.as_slice());
    data.extend_from_slice(asset.address().as_slice());
    data.extend_from_slice(recipient.as_slice());
    data.extend_from_slice(&amount.to_be_bytes::<32>());
    data.extend_from_slice(keccak256(proof).as_slice());
    keccak256(&data)
}

#[derive(Clone, Copy, Debug)]
pub struct BridgeConfig {
    pub owner: Address,
    /// Account that holds the bridge's custody on this ledger.
    pub address: Address,
    pub oracle: Address,
    pub fee_bps: u64,
    pub minimum_deposit: Amount,
}

impl BridgeConfig {
    pub fn new(owner: Address, address: Address, oracle: Address) -> Self {
        Self {
            owner,
            address,
            oracle,
            fee_bps: DEFAULT_FEE_BPS,
            minimum_deposit: MINIMUM_DEPOSIT,
        }
    }
}

pub struct BridgeLedger {
    owner: Address,
    address: Address,
    oracle: Address,
    fee_bps: u64,
    minimum_deposit: Amount,
    registry: TokenRegistry,
    /// Everything held per asset, fees included.
    custody: HashMap<AssetId, Amount>,
    /// Portion of custody that is fee revenue and never released on claim.
    fees: HashMap<AssetId, Amount>,
    used_proofs: HashSet<B256>,
    proof_validator: Box<dyn ProofValidator>,
}

impl fmt::Debug for BridgeLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeLedger")
            .field("owner", &self.owner)
            .field("address", &self.address)
            .field("oracle", &self.oracle)
            .field("fee_bps", &self.fee_bps)
            .field("custody", &self.custody)
            .field("used_proofs", &self.used_proofs.len())
            .finish()
    }
}

impl BridgeLedger {
    pub fn new(config: BridgeConfig, registry: TokenRegistry) -> Result<Self> {
        if config.oracle.is_zero() {
            return Err(LedgerError::InvalidAddress("oracle"));
        }
        if config.address.is_zero() {
            return Err(LedgerError::InvalidAddress("bridge"));
        }
        if config.fee_bps > BPS_DENOMINATOR {
            return Err(LedgerError::InvalidAmount(format!(
                "fee of {} bps exceeds {}",
                config.fee_bps, BPS_DENOMINATOR
            )));
        }

        Ok(Self {
            owner: config.owner,
            address: config.address,
            oracle: config.oracle,
            fee_bps: config.fee_bps,
            minimum_deposit: config.minimum_deposit,
            registry,
            custody: HashMap::new(),
            fees: HashMap::new(),
            used_proofs: HashSet::new(),
            proof_validator: Box::new(OracleAttested),
        })
    }

    pub fn with_proof_validator(mut self, validator: impl ProofValidator + 'static) -> Self {
        self.proof_validator = Box::new(validator);
        self
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn oracle(&self) -> Address {
        self.oracle
    }

    pub fn cross_chain_fee(&self) -> u64 {
        self.fee_bps
    }

    pub fn minimum_deposit(&self) -> Amount {
        self.minimum_deposit
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn get_cross_chain_id(&self, asset: AssetId) -> Result<Symbol> {
        self.registry.symbol_of(asset)
    }

    /// Total held for `asset`, fees included.
    pub fn custodied(&self, asset: AssetId) -> Amount {
        self.custody.get(&asset).copied().unwrap_or_default()
    }

    pub fn collected_fees(&self, asset: AssetId) -> Amount {
        self.fees.get(&asset).copied().unwrap_or_default()
    }

    /// Custody available to claims.
    pub fn releasable(&self, asset: AssetId) -> Amount {
        self.custodied(asset).saturating_sub(self.collected_fees(asset))
    }

    pub fn is_proof_used(&self, proof: &[u8]) -> bool {
        self.used_proofs.contains(&keccak256(proof))
    }

    /// Register or re-symbol an asset. Owner only.
    pub fn set_token_registry(&mut self, ctx: &CallContext, asset: AssetId, symbol: Symbol) -> Result<LedgerEvent> {
        self.registry.register(ctx.caller, asset, symbol)
    }

    pub fn set_cross_chain_fee(&mut self, ctx: &CallContext, fee_bps: u64) -> Result<LedgerEvent> {
        if ctx.caller != self.owner {
            return Err(LedgerError::Unauthorized(ctx.caller));
        }
        if fee_bps > BPS_DENOMINATOR {
            return Err(LedgerError::InvalidAmount(format!(
                "fee of {} bps exceeds {}",
                fee_bps, BPS_DENOMINATOR
            )));
        }
        self.fee_bps = fee_bps;

        info!(fee_bps, "cross-chain fee updated");
        Ok(LedgerEvent::CrossChainFeeUpdated { fee_bps })
    }

    /// Value sent to the bridge without a call. Always refused.
    pub fn receive(&self, ctx: &CallContext) -> Result<()> {
        warn!(from = %ctx.caller, value = %ctx.value, "bare transfer to bridge rejected");
        Err(LedgerError::DirectTransferRejected)
    }

    /// Lock `amount` of `asset` for release to `destination` on the
    /// counterpart ledger.
    pub fn deposit_tokens(
        &mut self,
        ctx: &CallContext,
        bank: &mut impl AssetBank,
        asset: AssetId,
        amount: Amount,
        destination: B256,
    ) -> Result<LedgerEvent> {
        if !self.registry.is_registered(asset) {
            return Err(LedgerError::UnregisteredToken(asset));
        }
        check_attached_value(ctx, asset, amount)?;
        if amount < self.minimum_deposit {
            return Err(LedgerError::InvalidAmount(format!(
                "deposit of {} is below the minimum of {}",
                amount, self.minimum_deposit
            )));
        }
        if destination.is_zero() {
            return Err(LedgerError::InvalidAddress("destination"));
        }

        let fee = amount::fee(amount, self.fee_bps)?;
        let net_amount = amount::net_of(amount, self.fee_bps)?;
        let custody = self
            .custodied(asset)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        let fees = self
            .collected_fees(asset)
            .checked_add(fee)
            .ok_or(LedgerError::Overflow)?;

        self.pull(ctx.caller, bank, asset, amount)?;

        self.custody.insert(asset, custody);
        self.fees.insert(asset, fees);

        info!(
            depositor = %ctx.caller,
            %asset,
            gross = %amount,
            net = %net_amount,
            %fee,
            %destination,
            "tokens deposited"
        );
        Ok(LedgerEvent::TokensDeposited {
            depositor: ctx.caller,
            asset,
            net_amount,
            fee,
            destination,
        })
    }

    /// Add releasable custody for future claims.
    pub fn add_liquidity(
        &mut self,
        ctx: &CallContext,
        bank: &mut impl AssetBank,
        asset: AssetId,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        if !self.registry.is_registered(asset) {
            return Err(LedgerError::UnregisteredToken(asset));
        }
        if amount == U256::ZERO {
            return Err(LedgerError::InvalidAmount("liquidity must be positive".to_string()));
        }
        check_attached_value(ctx, asset, amount)?;
        let custody = self
            .custodied(asset)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;

        self.pull(ctx.caller, bank, asset, amount)?;
        self.custody.insert(asset, custody);

        info!(provider = %ctx.caller, %asset, %amount, "liquidity added");
        Ok(LedgerEvent::LiquidityAdded {
            provider: ctx.caller,
            asset,
            amount,
        })
    }

    /// Release `amount` of `asset` to `recipient`. Oracle only.
    pub fn claim_tokens(
        &mut self,
        ctx: &CallContext,
        bank: &mut impl AssetBank,
        proof: &[u8],
        asset: AssetId,
        recipient: Address,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        if ctx.caller != self.oracle {
            warn!(caller = %ctx.caller, "claim from non-oracle rejected");
            return Err(LedgerError::UnauthorizedOracle(ctx.caller));
        }
        self.release(ctx, bank, proof, asset, recipient, amount)
    }

    /// Release on behalf of the oracle, authorized by its signature over
    /// [`claim_digest`]. Any caller may submit.
    #[allow(clippy::too_many_arguments)]
    pub fn claim_with_attestation(
        &mut self,
        ctx: &CallContext,
        bank: &mut impl AssetBank,
        proof: &[u8],
        asset: AssetId,
        recipient: Address,
        amount: Amount,
        oracle_signature: &[u8],
    ) -> Result<LedgerEvent> {
        let digest = claim_digest(self.address, asset, recipient, amount, proof);
        if !signature::verify(&digest, oracle_signature, self.oracle) {
            warn!(caller = %ctx.caller, "claim attestation not signed by oracle");
            return Err(LedgerError::UnauthorizedOracle(ctx.caller));
        }
        self.release(ctx, bank, proof, asset, recipient, amount)
    }

    fn release(
        &mut self,
        ctx: &CallContext,
        bank: &mut impl AssetBank,
        proof: &[u8],
        asset: AssetId,
        recipient: Address,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        if proof.is_empty() {
            return Err(LedgerError::InvalidProof("proof is empty".to_string()));
        }
        let proof_hash = keccak256(proof);
        if self.used_proofs.contains(&proof_hash) {
            return Err(LedgerError::ProofAlreadyUsed(proof_hash));
        }
        if !self.registry.is_registered(asset) {
            return Err(LedgerError::UnregisteredToken(asset));
        }
        if recipient.is_zero() {
            return Err(LedgerError::InvalidAddress("recipient"));
        }
        if amount == U256::ZERO {
            return Err(LedgerError::InvalidAmount("claim must be positive".to_string()));
        }
        self.proof_validator.validate(proof, asset, recipient, amount)?;

        // Native value riding on the claim tops up custody first
        let top_up = match asset {
            AssetId::Native => ctx.value,
            AssetId::Token(_) if ctx.value > U256::ZERO => {
                return Err(LedgerError::InvalidAmount(
                    "native value sent with token claim".to_string(),
                ));
            }
            AssetId::Token(_) => U256::ZERO,
        };
        let available = self
            .releasable(asset)
            .checked_add(top_up)
            .ok_or(LedgerError::Overflow)?;
        if available < amount {
            return Err(match asset {
                AssetId::Native => LedgerError::InsufficientBalance {
                    needed: amount,
                    available,
                },
                AssetId::Token(token) => LedgerError::TransferFailed(format!(
                    "bridge holds {} releasable of {}, claim needs {}",
                    available, token, amount
                )),
            });
        }
        let custody = self
            .custodied(asset)
            .checked_add(top_up)
            .ok_or(LedgerError::Overflow)?
            - amount;

        if top_up > U256::ZERO {
            bank.native_transfer(ctx.caller, self.address, top_up)?;
        }
        if let Err(err) = self.push(bank, asset, recipient, amount) {
            if top_up > U256::ZERO {
                if let Err(refund) = bank.native_transfer(self.address, ctx.caller, top_up) {
                    error!(%refund, caller = %ctx.caller, "failed to unwind claim top-up");
                }
            }
            return Err(err);
        }

        self.custody.insert(asset, custody);
        self.used_proofs.insert(proof_hash);

        info!(%recipient, %asset, %amount, %proof_hash, "tokens claimed");
        Ok(LedgerEvent::TokensClaimed {
            recipient,
            asset,
            amount,
            proof_hash,
        })
    }

    fn pull(&self, from: Address, bank: &mut impl AssetBank, asset: AssetId, amount: Amount) -> Result<()> {
        debug!(%from, %asset, %amount, "pulling into custody");
        match asset {
            AssetId::Native => bank.native_transfer(from, self.address, amount),
            AssetId::Token(token) => bank.token_transfer_from(token, self.address, from, self.address, amount),
        }
    }

    fn push(&self, bank: &mut impl AssetBank, asset: AssetId, to: Address, amount: Amount) -> Result<()> {
        debug!(%to, %asset, %amount, "releasing from custody");
        match asset {
            AssetId::Native => bank.native_transfer(self.address, to, amount),
            AssetId::Token(token) => bank.token_transfer(token, self.address, to, amount),
        }
    }
}

/// Native deposits must attach exactly `amount`; token deposits attach nothing.
fn check_attached_value(ctx: &CallContext, asset: AssetId, amount: Amount) -> Result<()> {
    match asset {
        AssetId::Native if ctx.value != amount => Err(LedgerError::InvalidAmount(format!(
            "attached value {} does not match amount {}",
            ctx.value, amount
        ))),
        AssetId::Token(_) if ctx.value > U256::ZERO => Err(LedgerError::InvalidAmount(
            "native value sent with token transfer".to_string(),
        )),
        _ => Ok(()),
    }
}
