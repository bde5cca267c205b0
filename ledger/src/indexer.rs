//! Read-model projection of ledger events
//!
//! Consumes records at-least-once and dedupes on `EventId`, so replaying a
//! page of the log is always safe.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::amount::Amount;
use crate::events::{EventId, EventRecord, LedgerEvent};
use crate::types::ModelHash;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub model_hash: ModelHash,
    pub owner: Address,
    pub timestamp: i64,
    pub price: Amount,
    pub uri: String,
    pub is_verified: bool,
    pub verification_count: u64,
}

#[derive(Clone, Debug, Default)]
pub struct ModelIndex {
    models: HashMap<ModelHash, ModelRecord>,
    reputations: HashMap<Address, Amount>,
    applied: HashSet<EventId>,
}

impl ModelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record into the projection. Returns `false` if this record
    /// was already applied.
    pub fn apply(&mut self, record: &EventRecord) -> bool {
        if !self.applied.insert(record.id) {
            debug!(id = ?record.id, "skipping already applied event");
            return false;
        }

        match &record.event {
            LedgerEvent::ModelRegistered {
                model_hash,
                owner,
                timestamp,
                price,
                uri,
            } => {
                self.models.entry(*model_hash).or_insert_with(|| ModelRecord {
                    model_hash: *model_hash,
                    owner: *owner,
                    timestamp: *timestamp,
                    price: *price,
                    uri: uri.clone(),
                    is_verified: false,
                    verification_count: 0,
                });
            }
            LedgerEvent::ModelVerified { model_hash, .. } => {
                if let Some(model) = self.models.get_mut(model_hash) {
                    model.is_verified = true;
                    model.verification_count += 1;
                }
            }
            LedgerEvent::ReputationUpdated { account, score } => {
                self.reputations.insert(*account, *score);
            }
            _ => {}
        }
        true
    }

    pub fn apply_all<'a>(&mut self, records: impl IntoIterator<Item = &'a EventRecord>) -> usize {
        records
            .into_iter()
            .filter(|record| self.apply(record))
            .count()
    }

    pub fn model(&self, model_hash: &ModelHash) -> Option<&ModelRecord> {
        self.models.get(model_hash)
    }

    pub fn reputation(&self, account: &Address) -> Option<Amount> {
        self.reputations.get(account).copied()
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelRecord> {
        self.models.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventLog;
    use alloy_primitives::{B256, U256};

    const OWNER: Address = Address::repeat_byte(0x0E);

    fn registered(hash: ModelHash) -> LedgerEvent {
        LedgerEvent::ModelRegistered {
            model_hash: hash,
            owner: OWNER,
            timestamp: 1_700_000_000,
            price: U256::from(5),
            uri: "ipfs://model".to_string(),
        }
    }

    fn verified(hash: ModelHash) -> LedgerEvent {
        LedgerEvent::ModelVerified {
            model_hash: hash,
            submitter: OWNER,
        }
    }

    #[test]
    fn test_projects_registration_and_verification() {
        let hash = B256::repeat_byte(0x10);
        let mut log = EventLog::new(1);
        let records = log.extend([registered(hash), verified(hash)]);

        let mut index = ModelIndex::new();
        assert_eq!(index.apply_all(&records), 2);

        let model = index.model(&hash).unwrap();
        assert!(model.is_verified);
        assert_eq!(model.verification_count, 1);
        assert_eq!(model.uri, "ipfs://model");
    }

    #[test]
    fn test_redelivery_is_idempotent() {
        let hash = B256::repeat_byte(0x11);
        let mut log = EventLog::new(1);
        let records = log.extend([registered(hash), verified(hash)]);

        let mut index = ModelIndex::new();
        index.apply_all(&records);
        assert!(!index.apply(&records[1]), "second delivery must be ignored");
        assert_eq!(index.apply_all(&records), 0);

        assert_eq!(index.model(&hash).unwrap().verification_count, 1);
    }

    #[test]
    fn test_same_sequence_on_other_chain_is_distinct() {
        let hash = B256::repeat_byte(0x12);
        let mut a = EventLog::new(1);
        let mut b = EventLog::new(2);
        let ra = a.append(registered(hash));
        let rb = b.append(verified(hash));

        let mut index = ModelIndex::new();
        assert!(index.apply(&ra));
        assert!(index.apply(&rb));
        assert!(index.model(&hash).unwrap().is_verified);
    }

    #[test]
    fn test_verification_of_unknown_model_creates_nothing() {
        let hash = B256::repeat_byte(0x13);
        let mut log = EventLog::new(1);
        let record = log.append(verified(hash));

        let mut index = ModelIndex::new();
        assert!(index.apply(&record));
        assert!(index.model(&hash).is_none());
    }

    #[test]
    fn test_tracks_latest_reputation() {
        let mut log = EventLog::new(1);
        let records = log.extend([
            LedgerEvent::ReputationUpdated {
                account: OWNER,
                score: U256::from(10),
            },
            LedgerEvent::ReputationUpdated {
                account: OWNER,
                score: U256::from(12),
            },
        ]);

        let mut index = ModelIndex::new();
        index.apply_all(&records);
        assert_eq!(index.reputation(&OWNER), Some(U256::from(12)));
    }
}
