//! Query handlers for the Gravity bridge core.

use common::EthAddress;
use cosmwasm_std::{Addr, Binary, Order, StdError, StdResult, Storage};
use cw_storage_plus::Bound;

use crate::execute::{
    artifact_checkpoint, denom_to_erc20, erc20_to_denom, last_event_nonce_by_validator,
    pending_transfers_by_fee,
};
use crate::hash::bytes32_to_hex;
use crate::msg::{
    BatchesResponse, CheckpointResponse, ConfirmationsResponse, ContractCallsResponse,
    DenomResponse, Erc20Response, EventNonceResponse, EventVoteRecordEntry,
    EventVoteRecordsResponse, LastObservedResponse, PendingTransfersResponse,
};
use crate::params::{load_params, Params};
use crate::state::{
    last_observed_ethereum_height, last_observed_event_nonce, latest_signer_set, Batch,
    DelegateKeys, OutgoingArtifact, SignerSet, BATCHES, CONFIRMATIONS, CONTRACT_CALLS,
    DELEGATE_KEYS, EVENT_VOTE_RECORDS, LAST_OBSERVED_SIGNER_SET, SIGNER_SETS,
    VALIDATOR_BY_ETHEREUM_ADDRESS, VALIDATOR_BY_ORCHESTRATOR,
};

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;

fn clamp(limit: Option<u32>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize
}

// ============================================================================
// Attestation Queries
// ============================================================================

pub fn query_params(storage: &dyn Storage) -> StdResult<Params> {
    load_params(storage)
}

pub fn query_last_observed(storage: &dyn Storage) -> StdResult<LastObservedResponse> {
    Ok(LastObservedResponse {
        event_nonce: last_observed_event_nonce(storage)?,
        ethereum_height: last_observed_ethereum_height(storage)?,
    })
}

pub fn query_event_vote_records(
    storage: &dyn Storage,
    event_nonce: u64,
) -> StdResult<EventVoteRecordsResponse> {
    let records = EVENT_VOTE_RECORDS
        .prefix(event_nonce)
        .range(storage, None, None, Order::Ascending)
        .map(|item| {
            item.map(|(hash, record)| EventVoteRecordEntry {
                hash: format!("0x{}", hex::encode(hash)),
                record,
            })
        })
        .collect::<StdResult<Vec<_>>>()?;
    Ok(EventVoteRecordsResponse { records })
}

pub fn query_last_event_nonce_by_validator(
    storage: &dyn Storage,
    validator: String,
) -> StdResult<EventNonceResponse> {
    Ok(EventNonceResponse {
        event_nonce: last_event_nonce_by_validator(storage, &Addr::unchecked(validator))?,
    })
}

// ============================================================================
// Pool & Batch Queries
// ============================================================================

pub fn query_pending_transfers(
    storage: &dyn Storage,
    token_contract: EthAddress,
    limit: Option<u32>,
) -> StdResult<PendingTransfersResponse> {
    Ok(PendingTransfersResponse {
        transfers: pending_transfers_by_fee(storage, &token_contract, clamp(limit))?,
    })
}

pub fn query_batch(
    storage: &dyn Storage,
    token_contract: EthAddress,
    nonce: u64,
) -> StdResult<Option<Batch>> {
    BATCHES.may_load(storage, (token_contract.as_slice(), nonce))
}

pub fn query_batches(
    storage: &dyn Storage,
    start_after: Option<(EthAddress, u64)>,
    limit: Option<u32>,
) -> StdResult<BatchesResponse> {
    let start = start_after
        .as_ref()
        .map(|(contract, nonce)| Bound::exclusive((contract.as_slice(), *nonce)));
    let batches = BATCHES
        .range(storage, start, None, Order::Ascending)
        .take(clamp(limit))
        .map(|item| item.map(|(_, batch)| batch))
        .collect::<StdResult<Vec<_>>>()?;
    Ok(BatchesResponse { batches })
}

pub fn query_contract_calls(
    storage: &dyn Storage,
    start_after: Option<(Binary, u64)>,
    limit: Option<u32>,
) -> StdResult<ContractCallsResponse> {
    let start = start_after
        .as_ref()
        .map(|(scope, nonce)| Bound::exclusive((scope.as_slice(), *nonce)));
    let calls = CONTRACT_CALLS
        .range(storage, start, None, Order::Ascending)
        .take(clamp(limit))
        .map(|item| item.map(|(_, call)| call))
        .collect::<StdResult<Vec<_>>>()?;
    Ok(ContractCallsResponse { calls })
}

// ============================================================================
// Signer Set & Confirmation Queries
// ============================================================================

pub fn query_signer_set(storage: &dyn Storage, nonce: u64) -> StdResult<Option<SignerSet>> {
    SIGNER_SETS.may_load(storage, nonce)
}

pub fn query_latest_signer_set(storage: &dyn Storage) -> StdResult<Option<SignerSet>> {
    latest_signer_set(storage)
}

pub fn query_last_observed_signer_set(storage: &dyn Storage) -> StdResult<Option<SignerSet>> {
    LAST_OBSERVED_SIGNER_SET.may_load(storage)
}

pub fn query_confirmations(
    storage: &dyn Storage,
    artifact: OutgoingArtifact,
) -> StdResult<ConfirmationsResponse> {
    let key = artifact.store_key();
    let confirmations = CONFIRMATIONS
        .prefix(key.as_slice())
        .range(storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, confirmation)| confirmation))
        .collect::<StdResult<Vec<_>>>()?;
    Ok(ConfirmationsResponse { confirmations })
}

pub fn query_checkpoint(
    storage: &dyn Storage,
    artifact: OutgoingArtifact,
) -> StdResult<CheckpointResponse> {
    let params = load_params(storage)?;
    let checkpoint = artifact_checkpoint(storage, &params, &artifact)
        .map_err(|e| StdError::generic_err(e.to_string()))?;
    Ok(CheckpointResponse {
        checkpoint: bytes32_to_hex(&checkpoint),
    })
}

// ============================================================================
// Token & Delegate Queries
// ============================================================================

pub fn query_erc20_to_denom(
    storage: &dyn Storage,
    token_contract: EthAddress,
) -> StdResult<DenomResponse> {
    let (denom, native) = erc20_to_denom(storage, &token_contract)?;
    Ok(DenomResponse { denom, native })
}

pub fn query_denom_to_erc20(storage: &dyn Storage, denom: String) -> StdResult<Erc20Response> {
    let (token_contract, is_voucher) =
        denom_to_erc20(storage, &denom).map_err(|e| StdError::generic_err(e.to_string()))?;
    Ok(Erc20Response {
        token_contract,
        native: !is_voucher,
    })
}

pub fn query_delegate_keys_by_validator(
    storage: &dyn Storage,
    validator: String,
) -> StdResult<Option<DelegateKeys>> {
    DELEGATE_KEYS.may_load(storage, &Addr::unchecked(validator))
}

pub fn query_delegate_keys_by_orchestrator(
    storage: &dyn Storage,
    orchestrator: String,
) -> StdResult<Option<DelegateKeys>> {
    match VALIDATOR_BY_ORCHESTRATOR.may_load(storage, &Addr::unchecked(orchestrator))? {
        Some(validator) => DELEGATE_KEYS.may_load(storage, &validator),
        None => Ok(None),
    }
}

pub fn query_delegate_keys_by_ethereum_address(
    storage: &dyn Storage,
    ethereum_address: EthAddress,
) -> StdResult<Option<DelegateKeys>> {
    match VALIDATOR_BY_ETHEREUM_ADDRESS.may_load(storage, ethereum_address.as_slice())? {
        Some(validator) => DELEGATE_KEYS.may_load(storage, &validator),
        None => Ok(None),
    }
}
