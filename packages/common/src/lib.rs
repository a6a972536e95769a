//! Common - Shared Types and Utilities for the Gravity Bridge
//!
//! This package provides the Ethereum-facing primitive types that both the
//! bridge core and its off-chain tooling agree on.

pub mod address;
pub mod asset;

pub use address::EthAddress;
pub use asset::{parse_voucher_denom, voucher_denom, Erc20Token, VOUCHER_DENOM_PREFIX};
