//! State definitions for the Gravity bridge core
//!
//! This module defines every persisted entity and the storage namespaces they
//! live under. All components read and write through these items and maps
//! directly; execution is single-threaded so no further coordination exists at
//! this boundary.

use std::fmt;

use common::{Erc20Token, EthAddress};
use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Binary, Empty, OverflowError, StdResult, Storage, Timestamp, Uint128};
use cw_storage_plus::{Item, Map};

use crate::ethereum_event::EthereumEvent;

// ============================================================================
// Event Attestation
// ============================================================================

/// Aggregated validator votes for one candidate Ethereum event at one nonce.
///
/// Several records can exist for the same nonce when validators disagree
/// about what happened; at most one of them is ever accepted.
#[cw_serde]
pub struct EventVoteRecord {
    /// The claimed event (content only, never the submitter)
    pub event: EthereumEvent,
    /// Validator operator addresses in the order their votes arrived
    pub votes: Vec<Addr>,
    /// Set once the record reaches the vote threshold; never reverts
    pub accepted: bool,
    /// Chain height at which the record was created
    pub height: u64,
}

/// The most recent Ethereum height carried by an accepted event, together with
/// the chain height and time at which it was observed. Used to project the
/// current Ethereum height for batch and contract call timeouts.
#[cw_serde]
pub struct LatestEthereumHeight {
    pub ethereum_height: u64,
    pub cosmos_height: u64,
    pub cosmos_time: Timestamp,
}

// ============================================================================
// Outgoing Pool & Batches
// ============================================================================

/// An unbatched send-to-Ethereum waiting in the outgoing pool
#[cw_serde]
pub struct PendingTransfer {
    pub id: u64,
    pub sender: Addr,
    pub ethereum_recipient: EthAddress,
    pub token: Erc20Token,
    pub fee: Erc20Token,
}

/// A bundle of transfers for one token contract awaiting confirmation and
/// relay to Ethereum
#[cw_serde]
pub struct Batch {
    /// Per token contract, strictly increasing
    pub nonce: u64,
    /// Ethereum height after which the contract rejects the batch
    pub timeout: u64,
    pub token_contract: EthAddress,
    pub transactions: Vec<PendingTransfer>,
    /// Chain height at creation, used by the slashing sweep
    pub height: u64,
}

impl Batch {
    pub fn total_fees(&self) -> Result<Uint128, OverflowError> {
        sum_fees(&self.transactions)
    }
}

/// Sum of the bridge fees of `transfers`
pub fn sum_fees(transfers: &[PendingTransfer]) -> Result<Uint128, OverflowError> {
    transfers
        .iter()
        .try_fold(Uint128::zero(), |acc, tx| acc.checked_add(tx.fee.amount))
}

// ============================================================================
// Signer Sets & Contract Calls
// ============================================================================

/// One member of the Ethereum-side multisig
#[cw_serde]
pub struct EthereumSigner {
    pub ethereum_address: EthAddress,
    /// Normalized power; all members of a set sum to at most `u32::MAX`
    pub power: u64,
}

/// Immutable snapshot of the bonded validator set as Ethereum signers
#[cw_serde]
pub struct SignerSet {
    pub nonce: u64,
    /// Chain height at which the snapshot was taken
    pub height: u64,
    pub signers: Vec<EthereumSigner>,
}

/// An arbitrary call executed by the Ethereum contract on behalf of the chain.
///
/// A call with the same scope and a higher nonce supersedes every earlier call
/// in that scope.
#[cw_serde]
pub struct ContractCall {
    /// Up to 32 bytes, right-padded into a `bytes32` when checkpointed
    pub invalidation_scope: Binary,
    pub invalidation_nonce: u64,
    pub timeout: u64,
    pub tokens: Vec<Erc20Token>,
    pub fees: Vec<Erc20Token>,
    pub payload: Binary,
    pub address: EthAddress,
    pub height: u64,
}

// ============================================================================
// Confirmations
// ============================================================================

/// Identifies an outgoing artifact validators sign
#[cw_serde]
pub enum OutgoingArtifact {
    SignerSet {
        nonce: u64,
    },
    Batch {
        token_contract: EthAddress,
        nonce: u64,
    },
    ContractCall {
        invalidation_scope: Binary,
        invalidation_nonce: u64,
    },
}

const ARTIFACT_SIGNER_SET: u8 = 0x01;
const ARTIFACT_BATCH: u8 = 0x02;
const ARTIFACT_CONTRACT_CALL: u8 = 0x03;

impl OutgoingArtifact {
    /// Storage prefix for confirmations of this artifact.
    ///
    /// Layout: kind byte, then the artifact's identifying fields with the
    /// nonce last as 8 big-endian bytes.
    pub fn store_key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(1 + 32 + 8);
        match self {
            OutgoingArtifact::SignerSet { nonce } => {
                key.push(ARTIFACT_SIGNER_SET);
                key.extend_from_slice(&nonce.to_be_bytes());
            }
            OutgoingArtifact::Batch {
                token_contract,
                nonce,
            } => {
                key.push(ARTIFACT_BATCH);
                key.extend_from_slice(token_contract.as_slice());
                key.extend_from_slice(&nonce.to_be_bytes());
            }
            OutgoingArtifact::ContractCall {
                invalidation_scope,
                invalidation_nonce,
            } => {
                key.push(ARTIFACT_CONTRACT_CALL);
                key.extend_from_slice(invalidation_scope.as_slice());
                key.extend_from_slice(&invalidation_nonce.to_be_bytes());
            }
        }
        key
    }
}

impl fmt::Display for OutgoingArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutgoingArtifact::SignerSet { nonce } => write!(f, "signer set {nonce}"),
            OutgoingArtifact::Batch {
                token_contract,
                nonce,
            } => write!(f, "batch {token_contract}/{nonce}"),
            OutgoingArtifact::ContractCall {
                invalidation_scope,
                invalidation_nonce,
            } => write!(
                f,
                "contract call 0x{}/{invalidation_nonce}",
                hex::encode(invalidation_scope.as_slice())
            ),
        }
    }
}

/// A validator's Ethereum signature over an artifact checkpoint
#[cw_serde]
pub struct Confirmation {
    pub artifact: OutgoingArtifact,
    pub validator: Addr,
    pub ethereum_signer: EthAddress,
    pub signature: Binary,
}

// ============================================================================
// Delegate Keys
// ============================================================================

/// The keys a validator delegates bridge duties to
#[cw_serde]
pub struct DelegateKeys {
    pub validator: Addr,
    /// Account that submits claims and confirmations on the validator's behalf
    pub orchestrator: Addr,
    /// Key the validator signs checkpoints with on Ethereum
    pub ethereum_address: EthAddress,
}

// ============================================================================
// Constants
// ============================================================================

/// Module name for cw2 version info
pub const CONTRACT_NAME: &str = "crates.io:gravity";

/// Module version for cw2 version info
pub const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Event Attestation State
// ============================================================================

/// Event vote records
/// Key: (event_nonce, event_hash), Value: EventVoteRecord
pub const EVENT_VOTE_RECORDS: Map<(u64, &[u8]), EventVoteRecord> = Map::new("event_vote_records");

/// Last event nonce each validator has claimed
/// Key: validator operator address, Value: event nonce
pub const LAST_EVENT_NONCE_BY_VALIDATOR: Map<&Addr, u64> = Map::new("last_event_nonce_by_validator");

/// Highest event nonce that reached consensus
pub const LAST_OBSERVED_EVENT_NONCE: Item<u64> = Item::new("last_observed_event_nonce");

/// Ethereum height carried by the last accepted event
pub const LAST_OBSERVED_ETHEREUM_HEIGHT: Item<LatestEthereumHeight> =
    Item::new("last_observed_ethereum_height");

/// Signer set most recently reported as executed on Ethereum
pub const LAST_OBSERVED_SIGNER_SET: Item<SignerSet> = Item::new("last_observed_signer_set");

// ============================================================================
// Outgoing Pool State
// ============================================================================

/// Next id handed out to a pending transfer
pub const NEXT_TRANSFER_ID: Item<u64> = Item::new("next_transfer_id");

/// Pending (unbatched) transfers
/// Key: transfer id, Value: PendingTransfer
pub const PENDING_TRANSFERS: Map<u64, PendingTransfer> = Map::new("pending_transfers");

/// Fee index over pending transfers.
/// Key: (token contract, u128::MAX - fee, id) so that ascending iteration
/// yields the highest fee first and, within a fee, the oldest id first.
pub const FEE_INDEX: Map<(&[u8], u128, u64), Empty> = Map::new("fee_index");

/// Last batch nonce issued per token contract
pub const LAST_BATCH_NONCE: Map<&[u8], u64> = Map::new("last_batch_nonce");

/// Open batches
/// Key: (token contract, batch nonce), Value: Batch
pub const BATCHES: Map<(&[u8], u64), Batch> = Map::new("batches");

/// Open contract calls
/// Key: (invalidation scope, invalidation nonce), Value: ContractCall
pub const CONTRACT_CALLS: Map<(&[u8], u64), ContractCall> = Map::new("contract_calls");

// ============================================================================
// Signer Set State
// ============================================================================

/// Signer set snapshots
/// Key: nonce, Value: SignerSet
pub const SIGNER_SETS: Map<u64, SignerSet> = Map::new("signer_sets");

/// Nonce of the newest signer set
pub const LATEST_SIGNER_SET_NONCE: Item<u64> = Item::new("latest_signer_set_nonce");

/// Height at which a validator most recently began unbonding
pub const LAST_UNBONDING_HEIGHT: Item<u64> = Item::new("last_unbonding_height");

// ============================================================================
// Confirmation & Delegate State
// ============================================================================

/// Confirmations
/// Key: (artifact store key, validator), Value: Confirmation
pub const CONFIRMATIONS: Map<(&[u8], &Addr), Confirmation> = Map::new("confirmations");

/// Delegate keys by validator
pub const DELEGATE_KEYS: Map<&Addr, DelegateKeys> = Map::new("delegate_keys");

/// Reverse lookup: orchestrator account to validator
pub const VALIDATOR_BY_ORCHESTRATOR: Map<&Addr, Addr> = Map::new("validator_by_orchestrator");

/// Reverse lookup: Ethereum address to validator
pub const VALIDATOR_BY_ETHEREUM_ADDRESS: Map<&[u8], Addr> =
    Map::new("validator_by_ethereum_address");

// ============================================================================
// Token Mapping State
// ============================================================================

/// Native denom to deployed ERC20
pub const DENOM_TO_ERC20: Map<&str, EthAddress> = Map::new("denom_to_erc20");

/// Deployed ERC20 to native denom
pub const ERC20_TO_DENOM: Map<&[u8], String> = Map::new("erc20_to_denom");

// ============================================================================
// Slashing State
// ============================================================================

/// Nonce of the last signer set evaluated by the slashing sweep
pub const LAST_SLASHED_SIGNER_SET_NONCE: Item<u64> = Item::new("last_slashed_signer_set_nonce");

/// Creation height of the last batch evaluated by the slashing sweep
pub const LAST_SLASHED_BATCH_HEIGHT: Item<u64> = Item::new("last_slashed_batch_height");

// ============================================================================
// Accessors
// ============================================================================

pub fn last_observed_event_nonce(storage: &dyn Storage) -> StdResult<u64> {
    Ok(LAST_OBSERVED_EVENT_NONCE.may_load(storage)?.unwrap_or_default())
}

pub fn last_observed_ethereum_height(storage: &dyn Storage) -> StdResult<Option<LatestEthereumHeight>> {
    LAST_OBSERVED_ETHEREUM_HEIGHT.may_load(storage)
}

pub fn latest_signer_set(storage: &dyn Storage) -> StdResult<Option<SignerSet>> {
    match LATEST_SIGNER_SET_NONCE.may_load(storage)? {
        Some(nonce) => SIGNER_SETS.may_load(storage, nonce),
        None => Ok(None),
    }
}

/// Invert a fee so ascending key order is descending fee order
pub fn fee_index_key(fee: Uint128) -> u128 {
    u128::MAX - fee.u128()
}
