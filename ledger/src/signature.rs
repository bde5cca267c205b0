//! Single-key secp256k1 signature checks
//!
//! Signers sign the EIP-191 personal message built from the raw 32-byte
//! message hash, i.e. `keccak256("\x19Ethereum Signed Message:\n32" || hash)`.
//! Recovery never panics or errors: anything malformed simply fails to verify.
//!
//! Node transactions are signed over a different message,
//! `TRANSACTION_DOMAIN || keccak256(payload)`. Its length is not 32, so the
//! personal-message prefix differs and a transaction signature can never
//! pass as an attestation over a raw hash.

use alloy_primitives::{eip191_hash_message, keccak256, Address, Signature, B256};

use crate::error::{LedgerError, Result};

/// Digest that is actually signed for `message_hash`.
pub fn signing_digest(message_hash: &B256) -> B256 {
    eip191_hash_message(message_hash.as_slice())
}

/// Recover the address that signed `message_hash`, if the signature parses.
pub fn recover_signer(message_hash: &B256, signature: &[u8]) -> Option<Address> {
    let signature = Signature::try_from(signature).ok()?;
    signature
        .recover_address_from_prehash(&signing_digest(message_hash))
        .ok()
}

pub const TRANSACTION_DOMAIN: &[u8] = b"DEEPCHAIN_TX_V1";

/// Message a sender signs to authenticate a transaction `payload`.
pub fn transaction_message(payload: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(TRANSACTION_DOMAIN.len() + 32);
    message.extend_from_slice(TRANSACTION_DOMAIN);
    message.extend_from_slice(keccak256(payload).as_slice());
    message
}

/// Recover the sender of a signed transaction `payload`.
pub fn recover_transaction_signer(payload: &[u8], signature: &[u8]) -> Option<Address> {
    let signature = Signature::try_from(signature).ok()?;
    signature
        .recover_address_from_prehash(&eip191_hash_message(transaction_message(payload)))
        .ok()
}

/// Whether `signature` over `message_hash` was produced by `expected_signer`.
pub fn verify(message_hash: &B256, signature: &[u8], expected_signer: Address) -> bool {
    if expected_signer.is_zero() {
        return false;
    }
    recover_signer(message_hash, signature) == Some(expected_signer)
}

/// A verifier bound to one authorized key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignatureVerifier {
    authorized: Address,
}

impl SignatureVerifier {
    pub fn new(authorized: Address) -> Result<Self> {
        if authorized.is_zero() {
            return Err(LedgerError::InvalidAddress("authorized signer"));
        }
        Ok(Self { authorized })
    }

    pub fn authorized(&self) -> Address {
        self.authorized
    }

    pub fn verify(&self, message_hash: &B256, signature: &[u8]) -> bool {
        verify(message_hash, signature, self.authorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::{local::PrivateKeySigner, SignerSync};

    fn sign(signer: &PrivateKeySigner, hash: &B256) -> Vec<u8> {
        signer
            .sign_message_sync(hash.as_slice())
            .unwrap()
            .as_bytes()
            .to_vec()
    }

    #[test]
    fn test_recovers_personal_message_signer() {
        let signer = PrivateKeySigner::random();
        let hash = keccak256(b"test-model");
        let signature = sign(&signer, &hash);

        assert_eq!(recover_signer(&hash, &signature), Some(signer.address()));
        assert!(verify(&hash, &signature, signer.address()));
    }

    #[test]
    fn test_other_key_does_not_verify() {
        let validator = PrivateKeySigner::random();
        let intruder = PrivateKeySigner::random();
        let hash = keccak256(b"test-model");
        let signature = sign(&intruder, &hash);

        assert!(!verify(&hash, &signature, validator.address()));
    }

    #[test]
    fn test_signature_over_other_message_does_not_verify() {
        let signer = PrivateKeySigner::random();
        let signature = sign(&signer, &keccak256(b"model-a"));
        assert!(!verify(&keccak256(b"model-b"), &signature, signer.address()));
    }

    #[test]
    fn test_malformed_signatures_fail_closed() {
        let signer = PrivateKeySigner::random();
        let hash = keccak256(b"test-model");
        let mut signature = sign(&signer, &hash);

        assert!(!verify(&hash, &[], signer.address()));
        assert!(!verify(&hash, &signature[..64], signer.address()));
        assert!(!verify(&hash, &[0u8; 65], signer.address()));

        signature[64] = 5;
        assert!(!verify(&hash, &signature, signer.address()));
    }

    #[test]
    fn test_zero_signer_never_verifies() {
        let hash = keccak256(b"anything");
        assert!(!verify(&hash, &[0u8; 65], Address::ZERO));
        assert!(SignatureVerifier::new(Address::ZERO).is_err());
    }

    #[test]
    fn test_transaction_signature_is_not_an_attestation() {
        let validator = PrivateKeySigner::random();
        let payload = br#"{"chain_id":1,"nonce":0,"call":{"method":"set_cross_chain_fee","fee_bps":1}}"#;
        let signature = validator
            .sign_message_sync(&transaction_message(payload))
            .unwrap()
            .as_bytes();

        assert_eq!(
            recover_transaction_signer(payload, &signature),
            Some(validator.address())
        );
        // Neither the payload hash nor the tagged message hash can be attested with it
        assert!(!verify(&keccak256(payload), &signature, validator.address()));
        assert!(!verify(
            &keccak256(transaction_message(payload)),
            &signature,
            validator.address()
        ));
    }

    #[test]
    fn test_attestation_is_not_a_transaction_signature() {
        let validator = PrivateKeySigner::random();
        let payload = b"{}";
        let signature = sign(&validator, &keccak256(payload));
        assert_ne!(
            recover_transaction_signer(payload, &signature),
            Some(validator.address())
        );
    }
}
