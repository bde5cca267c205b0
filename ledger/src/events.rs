//! Notification records emitted by the ledgers
//!
//! Records are immutable and carry a gap-free sequence per chain. Off-chain
//! consumers (the read-model indexer, the relayer) may see a record more than
//! once and must dedupe on `EventId`.

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::types::{AssetId, ModelHash, Symbol};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LedgerEvent {
    TokenRegistered {
        asset: AssetId,
        symbol: Symbol,
    },
    CrossChainFeeUpdated {
        fee_bps: u64,
    },
    /// Authoritative record a relayer watches to authorize the counterpart claim.
    TokensDeposited {
        depositor: Address,
        asset: AssetId,
        net_amount: Amount,
        fee: Amount,
        destination: B256,
    },
    LiquidityAdded {
        provider: Address,
        asset: AssetId,
        amount: Amount,
    },
    TokensClaimed {
        recipient: Address,
        asset: AssetId,
        amount: Amount,
        proof_hash: B256,
    },
    ModelRegistered {
        model_hash: ModelHash,
        owner: Address,
        timestamp: i64,
        price: Amount,
        uri: String,
    },
    ModelVerified {
        model_hash: ModelHash,
        submitter: Address,
    },
    ReputationUpdated {
        account: Address,
        score: Amount,
    },
    StakingTokenUpdated {
        token: Address,
    },
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::TokenRegistered { .. } => "TokenRegistered",
            LedgerEvent::CrossChainFeeUpdated { .. } => "CrossChainFeeUpdated",
            LedgerEvent::TokensDeposited { .. } => "TokensDeposited",
            LedgerEvent::LiquidityAdded { .. } => "LiquidityAdded",
            LedgerEvent::TokensClaimed { .. } => "TokensClaimed",
            LedgerEvent::ModelRegistered { .. } => "ModelRegistered",
            LedgerEvent::ModelVerified { .. } => "ModelVerified",
            LedgerEvent::ReputationUpdated { .. } => "ReputationUpdated",
            LedgerEvent::StakingTokenUpdated { .. } => "StakingTokenUpdated",
        }
    }
}

/// Identity of a record: which chain emitted it and where in that chain's log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId {
    pub chain_id: u64,
    pub sequence: u64,
}

impl EventId {
    pub const ENCODED_LEN: usize = 16;

    /// Big-endian `chain_id || sequence`.
    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[..8].copy_from_slice(&self.chain_id.to_be_bytes());
        out[8..].copy_from_slice(&self.sequence.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::ENCODED_LEN {
            return None;
        }
        let chain_id = u64::from_be_bytes(bytes[..8].try_into().ok()?);
        let sequence = u64::from_be_bytes(bytes[8..].try_into().ok()?);
        Some(Self { chain_id, sequence })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub event: LedgerEvent,
}

/// Append-only, ordered log for one chain.
#[derive(Clone, Debug)]
pub struct EventLog {
    chain_id: u64,
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            records: Vec::new(),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn append(&mut self, event: LedgerEvent) -> EventRecord {
        let record = EventRecord {
            id: EventId {
                chain_id: self.chain_id,
                sequence: self.records.len() as u64,
            },
            event,
        };
        self.records.push(record.clone());
        record
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = LedgerEvent>) -> Vec<EventRecord> {
        events.into_iter().map(|event| self.append(event)).collect()
    }

    /// Records with `sequence >= from`, in order.
    pub fn since(&self, from: u64) -> &[EventRecord] {
        let start = usize::try_from(from)
            .unwrap_or(usize::MAX)
            .min(self.records.len());
        &self.records[start..]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fee_event(bps: u64) -> LedgerEvent {
        LedgerEvent::CrossChainFeeUpdated { fee_bps: bps }
    }

    #[test]
    fn test_sequences_are_gap_free() {
        let mut log = EventLog::new(7);
        let records = log.extend([fee_event(1), fee_event(2), fee_event(3)]);

        let sequences: Vec<u64> = records.iter().map(|r| r.id.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert!(records.iter().all(|r| r.id.chain_id == 7));
    }

    #[test]
    fn test_since_pages_from_cursor() {
        let mut log = EventLog::new(1);
        log.extend([fee_event(1), fee_event(2), fee_event(3)]);

        assert_eq!(log.since(0).len(), 3);
        assert_eq!(log.since(2)[0].event, fee_event(3));
        assert!(log.since(3).is_empty());
        assert!(log.since(u64::MAX).is_empty());
    }

    #[test]
    fn test_event_id_encoding() {
        let id = EventId {
            chain_id: 31337,
            sequence: 42,
        };
        assert_eq!(EventId::decode(&id.encode()), Some(id));
        assert_eq!(EventId::decode(&[1, 2, 3]), None);
    }

    #[test]
    fn test_events_are_tagged_by_name() {
        let json = serde_json::to_value(fee_event(50)).unwrap();
        assert_eq!(json["type"], "CrossChainFeeUpdated");
        assert_eq!(json["fee_bps"], 50);
    }
}
