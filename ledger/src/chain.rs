//! One ledger environment
//!
//! A `Chain` owns everything that lives on one side of the bridge: the asset
//! world, the bridge and its registry, the model ledgers, reputation, the
//! event log and its read model. Transactions are applied one at a time, so
//! calls on the same chain never interleave.
//!
//! Nonce rules follow an EVM-style account model: a transaction for the
//! wrong chain or with the wrong nonce is refused outright and consumes
//! nothing; any other transaction consumes its nonce even if the call fails.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::amount::Amount;
use crate::bank::{AssetBank, InMemoryBank};
use crate::bridge::{BridgeConfig, BridgeLedger};
use crate::error::{LedgerError, Result};
use crate::events::{EventLog, EventRecord, LedgerEvent};
use crate::indexer::ModelIndex;
use crate::model_registry::ModelRegistry;
use crate::reputation::ReputationLedger;
use crate::token_registry::TokenRegistry;
use crate::types::{symbol_from_str, AssetId, CallContext, ModelHash};
use crate::verifier::ModelVerificationLedger;

/// Every state-changing operation a transaction can carry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Call {
    RegisterToken {
        asset: AssetId,
        symbol: String,
    },
    SetCrossChainFee {
        fee_bps: u64,
    },
    Deposit {
        asset: AssetId,
        amount: Amount,
        destination: B256,
    },
    AddLiquidity {
        asset: AssetId,
        amount: Amount,
    },
    ClaimTokens {
        proof: Bytes,
        asset: AssetId,
        recipient: Address,
        amount: Amount,
    },
    ClaimWithAttestation {
        proof: Bytes,
        asset: AssetId,
        recipient: Address,
        amount: Amount,
        signature: Bytes,
    },
    RegisterModel {
        model_hash: ModelHash,
        uri: String,
        price: Amount,
    },
    VerifyModel {
        model_hash: ModelHash,
        signature: Bytes,
    },
    Stake {
        amount: Amount,
    },
    SetStakingToken {
        token: Address,
    },
    Approve {
        token: Address,
        spender: Address,
        amount: Amount,
    },
    TransferToken {
        token: Address,
        to: Address,
        amount: Amount,
    },
    /// Plain native value transfer of the transaction's `value`.
    Send {
        to: Address,
    },
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::RegisterToken { .. } => "register_token",
            Call::SetCrossChainFee { .. } => "set_cross_chain_fee",
            Call::Deposit { .. } => "deposit",
            Call::AddLiquidity { .. } => "add_liquidity",
            Call::ClaimTokens { .. } => "claim_tokens",
            Call::ClaimWithAttestation { .. } => "claim_with_attestation",
            Call::RegisterModel { .. } => "register_model",
            Call::VerifyModel { .. } => "verify_model",
            Call::Stake { .. } => "stake",
            Call::SetStakingToken { .. } => "set_staking_token",
            Call::Approve { .. } => "approve",
            Call::TransferToken { .. } => "transfer_token",
            Call::Send { .. } => "send",
        }
    }

    /// Whether native value may ride along with this call.
    pub fn is_payable(&self) -> bool {
        matches!(
            self,
            Call::Deposit { .. }
                | Call::AddLiquidity { .. }
                | Call::ClaimTokens { .. }
                | Call::ClaimWithAttestation { .. }
                | Call::Send { .. }
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    #[serde(default)]
    pub value: Amount,
    pub call: Call,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Success,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptError {
    pub kind: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&LedgerError> for ReceiptError {
    fn from(err: &LedgerError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub chain_id: u64,
    pub caller: Address,
    pub nonce: u64,
    pub status: ReceiptStatus,
    pub error: Option<ReceiptError>,
    pub events: Vec<EventRecord>,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }

    pub fn error_kind(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.kind.as_str())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub owner: Address,
    pub bridge_address: Address,
    pub reputation_address: Address,
    pub oracle: Address,
    pub validator: Address,
    pub staking_token: Address,
    pub fee_bps: u64,
}

#[derive(Debug)]
pub struct Chain {
    chain_id: u64,
    owner: Address,
    bank: InMemoryBank,
    bridge: BridgeLedger,
    verifier: ModelVerificationLedger,
    models: ModelRegistry,
    reputation: ReputationLedger,
    log: EventLog,
    index: ModelIndex,
    nonces: HashMap<Address, u64>,
}

impl Chain {
    pub fn new(config: ChainConfig) -> Result<Self> {
        let bridge = BridgeLedger::new(
            BridgeConfig {
                fee_bps: config.fee_bps,
                ..BridgeConfig::new(config.owner, config.bridge_address, config.oracle)
            },
            TokenRegistry::new(config.owner),
        )?;
        let verifier = ModelVerificationLedger::new(config.validator)?;
        let reputation =
            ReputationLedger::new(config.owner, config.reputation_address, config.staking_token)?;

        info!(
            chain_id = config.chain_id,
            bridge = %config.bridge_address,
            oracle = %config.oracle,
            fee_bps = config.fee_bps,
            "chain initialized"
        );

        Ok(Self {
            chain_id: config.chain_id,
            owner: config.owner,
            bank: InMemoryBank::new(),
            bridge,
            verifier,
            models: ModelRegistry::new(),
            reputation,
            log: EventLog::new(config.chain_id),
            index: ModelIndex::new(),
            nonces: HashMap::new(),
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn bank(&self) -> &InMemoryBank {
        &self.bank
    }

    /// Direct access to balances, for genesis allocations.
    pub fn bank_mut(&mut self) -> &mut InMemoryBank {
        &mut self.bank
    }

    pub fn bridge(&self) -> &BridgeLedger {
        &self.bridge
    }

    pub fn registry(&self) -> &TokenRegistry {
        self.bridge.registry()
    }

    pub fn verifier(&self) -> &ModelVerificationLedger {
        &self.verifier
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn reputation(&self) -> &ReputationLedger {
        &self.reputation
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn index(&self) -> &ModelIndex {
        &self.index
    }

    /// Next nonce `account` must use.
    pub fn nonce(&self, account: &Address) -> u64 {
        self.nonces.get(account).copied().unwrap_or_default()
    }

    /// Register an asset at genesis, as the owner, without a transaction.
    pub fn register_genesis_asset(&mut self, asset: AssetId, symbol: &str) -> Result<EventRecord> {
        let ctx = CallContext::new(self.owner);
        let event = self
            .bridge
            .set_token_registry(&ctx, asset, symbol_from_str(symbol)?)?;
        Ok(self.commit(vec![event]).remove(0))
    }

    /// Apply one transaction from an authenticated `caller`.
    ///
    /// Returns `Err` only when the transaction is refused before execution.
    /// A call that runs and fails still yields a receipt, with no events.
    pub fn execute(&mut self, caller: Address, tx: Transaction, timestamp: i64) -> Result<Receipt> {
        if tx.chain_id != self.chain_id {
            return Err(LedgerError::WrongChain {
                expected: self.chain_id,
                actual: tx.chain_id,
            });
        }
        let expected = self.nonce(&caller);
        if tx.nonce != expected {
            return Err(LedgerError::InvalidNonce {
                expected,
                actual: tx.nonce,
            });
        }
        self.nonces.insert(caller, expected + 1);

        let method = tx.call.name();
        let ctx = CallContext::new(caller).with_value(tx.value).at(timestamp);
        debug!(%caller, nonce = tx.nonce, method, value = %tx.value, "executing transaction");

        let (status, error, events) = match self.dispatch(&ctx, tx.call) {
            Ok(events) => {
                let records = self.commit(events);
                info!(%caller, nonce = tx.nonce, method, events = records.len(), "transaction succeeded");
                (ReceiptStatus::Success, None, records)
            }
            Err(err) => {
                warn!(%caller, nonce = tx.nonce, method, kind = err.kind(), %err, "transaction failed");
                (ReceiptStatus::Failed, Some(ReceiptError::from(&err)), Vec::new())
            }
        };

        Ok(Receipt {
            chain_id: self.chain_id,
            caller,
            nonce: tx.nonce,
            status,
            error,
            events,
        })
    }

    fn commit(&mut self, events: Vec<LedgerEvent>) -> Vec<EventRecord> {
        let records = self.log.extend(events);
        self.index.apply_all(&records);
        records
    }

    fn dispatch(&mut self, ctx: &CallContext, call: Call) -> Result<Vec<LedgerEvent>> {
        if !call.is_payable() && ctx.value > U256::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "{} does not accept native value",
                call.name()
            )));
        }

        let event = match call {
            Call::RegisterToken { asset, symbol } => {
                self.bridge
                    .set_token_registry(ctx, asset, symbol_from_str(&symbol)?)?
            }
            Call::SetCrossChainFee { fee_bps } => self.bridge.set_cross_chain_fee(ctx, fee_bps)?,
            Call::Deposit {
                asset,
                amount,
                destination,
            } => self
                .bridge
                .deposit_tokens(ctx, &mut self.bank, asset, amount, destination)?,
            Call::AddLiquidity { asset, amount } => {
                self.bridge.add_liquidity(ctx, &mut self.bank, asset, amount)?
            }
            Call::ClaimTokens {
                proof,
                asset,
                recipient,
                amount,
            } => self
                .bridge
                .claim_tokens(ctx, &mut self.bank, &proof, asset, recipient, amount)?,
            Call::ClaimWithAttestation {
                proof,
                asset,
                recipient,
                amount,
                signature,
            } => self.bridge.claim_with_attestation(
                ctx,
                &mut self.bank,
                &proof,
                asset,
                recipient,
                amount,
                &signature,
            )?,
            Call::RegisterModel {
                model_hash,
                uri,
                price,
            } => self.models.register_model(ctx, model_hash, uri, price)?,
            Call::VerifyModel {
                model_hash,
                signature,
            } => {
                // Attestations are terminal, so one for an unknown hash could never reach the index
                if self.models.get(&model_hash).is_none() {
                    return Err(LedgerError::ModelNotRegistered(model_hash));
                }
                self.verifier.verify_model(ctx, model_hash, &signature)?
            }
            Call::Stake { amount } => {
                self.reputation
                    .stake_for_reputation(ctx, &mut self.bank, amount)?
            }
            Call::SetStakingToken { token } => self.reputation.set_token_registry(ctx, token)?,
            Call::Approve {
                token,
                spender,
                amount,
            } => {
                if !self.bank.is_token(token) {
                    return Err(LedgerError::InvalidAddress("token"));
                }
                self.bank.approve(token, ctx.caller, spender, amount);
                return Ok(Vec::new());
            }
            Call::TransferToken { token, to, amount } => {
                self.bank.token_transfer(token, ctx.caller, to, amount)?;
                return Ok(Vec::new());
            }
            Call::Send { to } => {
                if to == self.bridge.address() {
                    self.bridge.receive(ctx)?;
                }
                if to == self.reputation.address() {
                    return Err(LedgerError::DirectTransferRejected);
                }
                self.bank.native_transfer(ctx.caller, to, ctx.value)?;
                return Ok(Vec::new());
            }
        };
        Ok(vec![event])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::ether;
    use crate::types::account_id;
    use alloy::signers::{local::PrivateKeySigner, SignerSync};

    const OWNER: Address = Address::repeat_byte(0x01);
    const ORACLE: Address = Address::repeat_byte(0x02);
    const VALIDATOR: Address = Address::repeat_byte(0x03);
    const BRIDGE: Address = Address::repeat_byte(0xB0);
    const REPUTATION: Address = Address::repeat_byte(0xB1);
    const REP_TOKEN: Address = Address::repeat_byte(0xA0);
    const USER: Address = Address::repeat_byte(0x11);

    fn chain() -> Chain {
        chain_with_validator(VALIDATOR)
    }

    fn chain_with_validator(validator: Address) -> Chain {
        let mut chain = Chain::new(ChainConfig {
            chain_id: 31337,
            owner: OWNER,
            bridge_address: BRIDGE,
            reputation_address: REPUTATION,
            oracle: ORACLE,
            validator,
            staking_token: REP_TOKEN,
            fee_bps: 50,
        })
        .unwrap();
        chain.register_genesis_asset(AssetId::Native, "ETH").unwrap();
        chain.bank_mut().mint_native(USER, ether(10)).unwrap();
        chain.bank_mut().mint(REP_TOKEN, USER, ether(100)).unwrap();
        chain
    }

    fn tx(nonce: u64, value: Amount, call: Call) -> Transaction {
        Transaction {
            chain_id: 31337,
            nonce,
            value,
            call,
        }
    }

    fn deposit(amount: Amount) -> Call {
        Call::Deposit {
            asset: AssetId::Native,
            amount,
            destination: account_id(USER),
        }
    }

    #[test]
    fn test_deposit_appends_record() {
        let mut chain = chain();
        let receipt = chain
            .execute(USER, tx(0, ether(1), deposit(ether(1))), 1_000)
            .unwrap();

        assert!(receipt.is_success());
        assert_eq!(receipt.events.len(), 1);
        // Genesis registration holds sequence 0
        assert_eq!(receipt.events[0].id.sequence, 1);
        assert_eq!(chain.log().len(), 2);
        assert_eq!(chain.nonce(&USER), 1);
    }

    #[test]
    fn test_wrong_chain_and_nonce_consume_nothing() {
        let mut chain = chain();
        let mut wrong_chain = tx(0, ether(1), deposit(ether(1)));
        wrong_chain.chain_id = 1;

        assert_eq!(
            chain.execute(USER, wrong_chain, 0).unwrap_err(),
            LedgerError::WrongChain {
                expected: 31337,
                actual: 1
            }
        );
        assert_eq!(
            chain
                .execute(USER, tx(5, ether(1), deposit(ether(1))), 0)
                .unwrap_err(),
            LedgerError::InvalidNonce {
                expected: 0,
                actual: 5
            }
        );
        assert_eq!(chain.nonce(&USER), 0);
    }

    #[test]
    fn test_failed_call_consumes_nonce_without_events() {
        let mut chain = chain();
        let small = ether(1) / U256::from(200);
        let receipt = chain
            .execute(USER, tx(0, small, deposit(small)), 0)
            .unwrap();

        assert_eq!(receipt.status, ReceiptStatus::Failed);
        assert_eq!(receipt.error_kind(), Some("InvalidAmount"));
        assert!(receipt.events.is_empty());
        assert_eq!(chain.nonce(&USER), 1);
        assert_eq!(chain.bank().native_balance(USER), ether(10));
    }

    #[test]
    fn test_value_on_non_payable_call_rejected() {
        let mut chain = chain();
        let receipt = chain
            .execute(USER, tx(0, ether(1), Call::Stake { amount: ether(1) }), 0)
            .unwrap();
        assert_eq!(receipt.error_kind(), Some("InvalidAmount"));
        assert_eq!(chain.bank().native_balance(USER), ether(10));
    }

    #[test]
    fn test_send_to_bridge_rejected() {
        let mut chain = chain();
        let receipt = chain
            .execute(USER, tx(0, ether(1), Call::Send { to: BRIDGE }), 0)
            .unwrap();
        assert_eq!(receipt.error_kind(), Some("DirectTransferRejected"));
        assert_eq!(chain.bank().native_balance(BRIDGE), U256::ZERO);

        let other = Address::repeat_byte(0x99);
        let receipt = chain
            .execute(USER, tx(1, ether(1), Call::Send { to: other }), 0)
            .unwrap();
        assert!(receipt.is_success());
        assert_eq!(chain.bank().native_balance(other), ether(1));
    }

    #[test]
    fn test_stake_through_approve() {
        let mut chain = chain();
        let stake = ether(16);
        chain
            .execute(
                USER,
                tx(
                    0,
                    U256::ZERO,
                    Call::Approve {
                        token: REP_TOKEN,
                        spender: REPUTATION,
                        amount: stake,
                    },
                ),
                0,
            )
            .unwrap();
        let receipt = chain
            .execute(USER, tx(1, U256::ZERO, Call::Stake { amount: stake }), 0)
            .unwrap();

        assert!(receipt.is_success());
        assert_eq!(chain.reputation().reputation_score(&USER), crate::amount::isqrt(stake));
        assert_eq!(chain.index().reputation(&USER), Some(crate::amount::isqrt(stake)));
    }

    fn register(model_hash: B256) -> Call {
        Call::RegisterModel {
            model_hash,
            uri: "ipfs://QmModel".to_string(),
            price: U256::from(1),
        }
    }

    fn attest(validator: &PrivateKeySigner, model_hash: B256) -> Call {
        let signature = validator
            .sign_message_sync(model_hash.as_slice())
            .unwrap()
            .as_bytes();
        Call::VerifyModel {
            model_hash,
            signature: signature.to_vec().into(),
        }
    }

    #[test]
    fn test_model_lifecycle_reaches_read_model() {
        let validator = PrivateKeySigner::random();
        let mut chain = chain_with_validator(validator.address());
        let hash = B256::repeat_byte(0x42);
        let receipt = chain
            .execute(USER, tx(0, U256::ZERO, register(hash)), 1_700_000_000)
            .unwrap();

        assert!(receipt.is_success());
        let model = chain.index().model(&hash).unwrap();
        assert_eq!(model.timestamp, 1_700_000_000);
        assert!(!model.is_verified);

        let receipt = chain
            .execute(USER, tx(1, U256::ZERO, attest(&validator, hash)), 1_700_000_100)
            .unwrap();
        assert!(receipt.is_success());
        assert_eq!(chain.verifier().attestation(&hash).unwrap().verified_at, 1_700_000_100);

        let again = chain
            .execute(USER, tx(2, U256::ZERO, attest(&validator, hash)), 1_700_000_200)
            .unwrap();
        assert_eq!(again.error_kind(), Some("AlreadyVerified"));
        assert!(again.events.is_empty());

        let model = chain.index().model(&hash).unwrap();
        assert!(model.is_verified);
        assert_eq!(model.verification_count, 1);
        assert_eq!(chain.nonce(&USER), 3);
    }

    #[test]
    fn test_verifying_before_registration_is_refused() {
        let validator = PrivateKeySigner::random();
        let mut chain = chain_with_validator(validator.address());
        let hash = B256::repeat_byte(0x43);

        let early = chain
            .execute(USER, tx(0, U256::ZERO, attest(&validator, hash)), 10)
            .unwrap();
        assert_eq!(early.error_kind(), Some("ModelNotRegistered"));
        assert!(!chain.verifier().is_verified(&hash));

        chain
            .execute(USER, tx(1, U256::ZERO, register(hash)), 20)
            .unwrap();
        let receipt = chain
            .execute(USER, tx(2, U256::ZERO, attest(&validator, hash)), 30)
            .unwrap();
        assert!(receipt.is_success());

        // Ledger and read model agree
        let model = chain.index().model(&hash).unwrap();
        assert!(chain.verifier().is_verified(&hash));
        assert!(model.is_verified);
        assert_eq!(model.verification_count, 1);
    }

    #[test]
    fn test_call_json_shape() {
        let call: Call = serde_json::from_value(serde_json::json!({
            "method": "set_cross_chain_fee",
            "fee_bps": 25
        }))
        .unwrap();
        assert_eq!(call, Call::SetCrossChainFee { fee_bps: 25 });

        let tx: Transaction = serde_json::from_value(serde_json::json!({
            "chain_id": 1,
            "nonce": 0,
            "call": { "method": "send", "to": Address::repeat_byte(1) }
        }))
        .unwrap();
        assert_eq!(tx.value, U256::ZERO);
    }
}
