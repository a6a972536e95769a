//! Gravity Bridge Core - Chain-Side State Machine for an Ethereum Bridge
//!
//! The chain side of a validator-secured bridge to an Ethereum contract.
//!
//! # Incoming Flow (Ethereum to chain)
//! 1. A user locks tokens in the Ethereum contract, which emits an event with
//!    a strictly increasing event nonce
//! 2. Every validator's orchestrator reports the event (`SubmitEthereumEvent`)
//! 3. At the end of the block the tally accepts the event once validators with
//!    the threshold share of bonded power agree on it, and applies it
//!
//! # Outgoing Flow (chain to Ethereum)
//! 1. A user escrows tokens into the outgoing pool (`SendToEthereum`)
//! 2. Anyone requests a batch for a token; the highest fees go first
//! 3. Validators sign the batch checkpoint (`SubmitConfirmation`)
//! 4. A relayer submits the batch and signatures to Ethereum; the resulting
//!    `BatchExecuted` event finalizes it
//!
//! # Security
//! - Signer sets mirror the bonded validator set on Ethereum
//! - Validators that fail to sign signer sets or batches are slashed and jailed
//! - Checkpoints are salted with the bridge id

pub mod cache;
pub mod checkpoint;
pub mod contract;
pub mod error;
pub mod ethereum_event;
pub mod execute;
mod genesis;
pub mod hash;
pub mod keepers;
pub mod msg;
pub mod params;
mod query;
pub mod signature;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use crate::error::GravityError;
pub use crate::ethereum_event::EthereumEvent;
pub use crate::hash::keccak256;
pub use crate::keepers::{BankKeeper, Ctx, StakingKeeper};
pub use crate::params::Params;
