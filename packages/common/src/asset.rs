//! ERC20 amounts and bridge voucher denominations.
//!
//! Tokens that originate on Ethereum are represented on the chain by a voucher
//! denom derived from the token contract (`gravity0x...`). Tokens that
//! originate on the chain keep their own denom and are mapped to an ERC20 once
//! the Ethereum side reports the deployment.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::Uint128;

use crate::address::EthAddress;

/// Prefix of every voucher denom minted for an Ethereum-originated token
pub const VOUCHER_DENOM_PREFIX: &str = "gravity";

/// An amount of a specific ERC20 token
#[cw_serde]
pub struct Erc20Token {
    /// Token contract on Ethereum
    pub contract: EthAddress,
    /// Amount in the token's smallest unit
    pub amount: Uint128,
}

impl Erc20Token {
    pub fn new(contract: EthAddress, amount: impl Into<Uint128>) -> Self {
        Self {
            contract,
            amount: amount.into(),
        }
    }
}

/// Voucher denom for an Ethereum-originated token contract
pub fn voucher_denom(contract: &EthAddress) -> String {
    format!("{VOUCHER_DENOM_PREFIX}{contract}")
}

/// Returns the token contract if `denom` is a well-formed voucher denom
pub fn parse_voucher_denom(denom: &str) -> Option<EthAddress> {
    denom
        .strip_prefix(VOUCHER_DENOM_PREFIX)
        .and_then(|rest| EthAddress::parse(rest).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voucher_denom_roundtrip() {
        let contract = EthAddress::new([0x42; 20]);
        let denom = voucher_denom(&contract);
        assert_eq!(denom, "gravity0x4242424242424242424242424242424242424242");
        assert_eq!(parse_voucher_denom(&denom), Some(contract));
    }

    #[test]
    fn test_native_denom_is_not_voucher() {
        assert_eq!(parse_voucher_denom("uatom"), None);
        assert_eq!(parse_voucher_denom("gravity"), None);
        assert_eq!(parse_voucher_denom("gravity0x12"), None);
    }
}
