//! Execute handlers and block-level operations for the Gravity bridge core.
//!
//! - `attestation` - claim recording, tally and application of Ethereum events
//! - `pool` - the outgoing transfer pool and ERC20/denom mapping
//! - `batch` - batch building, execution, cancellation and timeouts
//! - `contract_call` - arbitrary outgoing calls
//! - `signer_set` - signer set snapshots and the snapshot trigger
//! - `confirm` - checkpoint confirmations
//! - `delegate` - orchestrator and Ethereum key registration
//! - `slashing` - punishment for missing confirmations

mod attestation;
mod batch;
mod confirm;
mod contract_call;
mod delegate;
mod pool;
mod signer_set;
mod slashing;

pub use attestation::*;
pub use batch::*;
pub use confirm::*;
pub use contract_call::*;
pub use delegate::*;
pub use pool::*;
pub use signer_set::*;
pub use slashing::*;

use bech32::{FromBase32, Variant};
use cosmwasm_std::{Addr, StdError, StdResult};

/// Decode a bech32 account address, checksum included.
///
/// Wallet (20-byte) and contract (32-byte) payloads are accepted. The address
/// is returned in its canonical lowercase form.
pub fn validate_cosmos_address(address: &str) -> StdResult<Addr> {
    let invalid = |reason: String| {
        StdError::generic_err(format!("Invalid account address {address}: {reason}"))
    };
    let (_, data, variant) = bech32::decode(address).map_err(|e| invalid(e.to_string()))?;
    if variant != Variant::Bech32 {
        return Err(invalid("bech32m encoding".to_string()));
    }
    let bytes = Vec::<u8>::from_base32(&data).map_err(|e| invalid(e.to_string()))?;
    if bytes.len() != 20 && bytes.len() != 32 {
        return Err(invalid(format!(
            "expected 20 or 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(Addr::unchecked(address.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bech32::ToBase32;

    fn encode(hrp: &str, bytes: &[u8]) -> String {
        bech32::encode(hrp, bytes.to_base32(), Variant::Bech32).unwrap()
    }

    #[test]
    fn test_validate_cosmos_address() {
        let wallet = encode("cosmos", &[0x11; 20]);
        assert_eq!(validate_cosmos_address(&wallet).unwrap().as_str(), wallet);
        assert!(validate_cosmos_address(&encode("cosmos", &[0x22; 32])).is_ok());
        assert_eq!(
            validate_cosmos_address(&wallet.to_uppercase()).unwrap().as_str(),
            wallet
        );

        assert!(validate_cosmos_address("").is_err());
        assert!(validate_cosmos_address("0x9FC9C2DfBA3b6cF204C37a5F690619772b926e39").is_err());
        // 'i' is outside the bech32 alphabet
        assert!(validate_cosmos_address("cosmos1receiver").is_err());
        assert!(validate_cosmos_address(&encode("cosmos", &[0x11; 19])).is_err());
        let mixed_case = format!("{}{}", &wallet[..10], wallet[10..].to_uppercase());
        assert!(validate_cosmos_address(&mixed_case).is_err());
    }

    #[test]
    fn test_validate_cosmos_address_checksum() {
        let wallet = encode("cosmos", &[0x11; 20]);
        let last = wallet.chars().last().unwrap();
        let replacement = if last == 'q' { 'p' } else { 'q' };
        let corrupted = format!("{}{replacement}", &wallet[..wallet.len() - 1]);
        assert!(validate_cosmos_address(&corrupted).is_err());
    }
}
