//! Confirmation Verifier
//!
//! Checks that an Ethereum signature over a checkpoint was produced by the
//! expected Ethereum address. Signatures are the 65-byte `r || s || v` form
//! produced by `eth_sign`, so the digest is wrapped in the Ethereum signed
//! message prefix before recovery.

use common::EthAddress;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

use crate::error::GravityError;
use crate::hash::{keccak256, keccak256_concat};

/// Prefix applied by `eth_sign` to a 32-byte message
pub const ETHEREUM_SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Length of an `r || s || v` signature
pub const SIGNATURE_LEN: usize = 65;

/// The digest actually signed for a checkpoint hash
pub fn ethereum_signed_message_hash(hash: &[u8; 32]) -> [u8; 32] {
    keccak256_concat(&[ETHEREUM_SIGNED_MESSAGE_PREFIX, hash])
}

/// Ethereum address of an uncompressed public key
pub fn ethereum_address(key: &VerifyingKey) -> EthAddress {
    let point = key.to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[12..]);
    EthAddress::new(address)
}

/// Recover the address that signed `hash` (before prefixing)
pub fn recover_signer(hash: &[u8; 32], signature: &[u8]) -> Result<EthAddress, GravityError> {
    if signature.len() < SIGNATURE_LEN {
        return Err(invalid(format!(
            "expected {SIGNATURE_LEN} bytes, got {}",
            signature.len()
        )));
    }

    let mut v = signature[64];
    if v >= 27 {
        v -= 27;
    }
    let recovery_id =
        RecoveryId::from_byte(v).ok_or_else(|| invalid(format!("bad recovery id {}", signature[64])))?;
    let sig = Signature::from_slice(&signature[..64]).map_err(|e| invalid(e.to_string()))?;

    let digest = ethereum_signed_message_hash(hash);
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|e| invalid(e.to_string()))?;
    Ok(ethereum_address(&key))
}

/// Verify that `signature` over `hash` was produced by `expected`
pub fn verify(hash: &[u8; 32], signature: &[u8], expected: &EthAddress) -> Result<(), GravityError> {
    let recovered = recover_signer(hash, signature)?;
    if &recovered != expected {
        return Err(GravityError::SignerMismatch {
            expected: expected.to_string(),
            got: recovered.to_string(),
        });
    }
    Ok(())
}

pub fn is_valid(hash: &[u8; 32], signature: &[u8], expected: &EthAddress) -> bool {
    verify(hash, signature, expected).is_ok()
}

fn invalid(reason: String) -> GravityError {
    GravityError::InvalidSignature { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::EthereumKey;

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let key = EthereumKey::from_seed(7);
        let hash = keccak256(b"checkpoint");
        let signature = key.sign(&hash);

        assert_eq!(signature.len(), SIGNATURE_LEN);
        assert_eq!(recover_signer(&hash, &signature).unwrap(), key.address());
        assert!(is_valid(&hash, &signature, &key.address()));
    }

    #[test]
    fn test_accepts_raw_recovery_id() {
        let key = EthereumKey::from_seed(7);
        let hash = keccak256(b"checkpoint");
        let mut signature = key.sign(&hash);
        signature[64] -= 27;
        assert!(is_valid(&hash, &signature, &key.address()));
    }

    #[test]
    fn test_wrong_signer_rejected() {
        let key = EthereumKey::from_seed(7);
        let other = EthereumKey::from_seed(8);
        let hash = keccak256(b"checkpoint");
        let signature = key.sign(&hash);

        let err = verify(&hash, &signature, &other.address()).unwrap_err();
        assert!(matches!(err, GravityError::SignerMismatch { .. }));
    }

    #[test]
    fn test_any_flipped_byte_rejected() {
        let key = EthereumKey::from_seed(3);
        let hash = keccak256(b"batch");
        let signature = key.sign(&hash);

        for i in 0..SIGNATURE_LEN {
            let mut corrupted = signature.clone();
            corrupted[i] ^= 0x01;
            assert!(
                !is_valid(&hash, &corrupted, &key.address()),
                "flipping byte {i} still verified"
            );
        }

        let mut wrong_hash = hash;
        wrong_hash[0] ^= 0x01;
        assert!(!is_valid(&wrong_hash, &signature, &key.address()));
    }

    #[test]
    fn test_short_signature_rejected() {
        let key = EthereumKey::from_seed(3);
        let hash = keccak256(b"batch");
        let signature = key.sign(&hash);
        let err = verify(&hash, &signature[..64], &key.address()).unwrap_err();
        assert!(matches!(err, GravityError::InvalidSignature { .. }));
    }
}
