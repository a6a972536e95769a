//! Genesis import and export.
//!
//! Export reads every namespace back into a `GenesisState`; import writes it
//! and rebuilds derived indexes (the fee index and the delegate key reverse
//! lookups). Importing an export reproduces the same state.

use common::EthAddress;
use cosmwasm_std::{Order, StdResult, Storage};
use cw2::set_contract_version;

use crate::error::GravityError;
use crate::execute::insert_into_pool;
use crate::msg::{Erc20ToDenom, GenesisState, TokenBatchNonce, ValidatorEventNonce};
use crate::params::{load_params, set_params};
use crate::state::{
    BATCHES, CONFIRMATIONS, CONTRACT_CALLS, CONTRACT_NAME, CONTRACT_VERSION, DELEGATE_KEYS, DENOM_TO_ERC20,
    ERC20_TO_DENOM, EVENT_VOTE_RECORDS, LAST_BATCH_NONCE, LAST_EVENT_NONCE_BY_VALIDATOR,
    LAST_OBSERVED_ETHEREUM_HEIGHT, LAST_OBSERVED_EVENT_NONCE, LAST_OBSERVED_SIGNER_SET,
    LAST_SLASHED_BATCH_HEIGHT, LAST_SLASHED_SIGNER_SET_NONCE, LAST_UNBONDING_HEIGHT,
    LATEST_SIGNER_SET_NONCE, NEXT_TRANSFER_ID, PENDING_TRANSFERS, SIGNER_SETS,
    VALIDATOR_BY_ETHEREUM_ADDRESS, VALIDATOR_BY_ORCHESTRATOR,
};

fn invalid(reason: String) -> GravityError {
    GravityError::InvalidGenesis { reason }
}

/// Cross-entity checks that the individual saves cannot catch
pub fn validate_genesis(genesis: &GenesisState) -> Result<(), GravityError> {
    genesis.params.validate()?;

    let max_id = genesis
        .pending_transfers
        .iter()
        .chain(genesis.batches.iter().flat_map(|b| b.transactions.iter()))
        .map(|tx| tx.id)
        .max()
        .unwrap_or_default();
    if max_id > 0 && genesis.next_transfer_id <= max_id {
        return Err(invalid(format!(
            "next_transfer_id {} must exceed every transfer id (max {max_id})",
            genesis.next_transfer_id
        )));
    }

    if let Some(latest) = genesis.latest_signer_set_nonce {
        if !genesis.signer_sets.iter().any(|set| set.nonce == latest) {
            return Err(invalid(format!("latest signer set {latest} is missing")));
        }
    }

    for record in &genesis.event_vote_records {
        let mut votes = record.votes.clone();
        votes.sort();
        votes.dedup();
        if votes.len() != record.votes.len() {
            return Err(invalid(format!(
                "duplicate votes in record at nonce {}",
                record.event.event_nonce()
            )));
        }
    }

    for batch in &genesis.batches {
        let last = genesis
            .last_batch_nonces
            .iter()
            .find(|n| n.token_contract == batch.token_contract)
            .map(|n| n.nonce)
            .unwrap_or_default();
        if batch.nonce > last {
            return Err(invalid(format!(
                "batch {}/{} is above the last batch nonce {last}",
                batch.token_contract, batch.nonce
            )));
        }
    }
    Ok(())
}

pub fn init_genesis(storage: &mut dyn Storage, genesis: GenesisState) -> Result<(), GravityError> {
    validate_genesis(&genesis)?;
    set_contract_version(storage, CONTRACT_NAME, CONTRACT_VERSION)?;
    set_params(storage, &genesis.params)?;

    LAST_OBSERVED_EVENT_NONCE.save(storage, &genesis.last_observed_event_nonce)?;
    if let Some(height) = &genesis.last_observed_ethereum_height {
        LAST_OBSERVED_ETHEREUM_HEIGHT.save(storage, height)?;
    }
    if let Some(set) = &genesis.last_observed_signer_set {
        LAST_OBSERVED_SIGNER_SET.save(storage, set)?;
    }
    for record in &genesis.event_vote_records {
        let hash = record.event.hash()?;
        EVENT_VOTE_RECORDS.save(storage, (record.event.event_nonce(), hash.as_slice()), record)?;
    }
    for entry in &genesis.validator_event_nonces {
        LAST_EVENT_NONCE_BY_VALIDATOR.save(storage, &entry.validator, &entry.event_nonce)?;
    }

    NEXT_TRANSFER_ID.save(storage, &genesis.next_transfer_id.max(1))?;
    for transfer in &genesis.pending_transfers {
        insert_into_pool(storage, transfer)?;
    }
    for entry in &genesis.last_batch_nonces {
        LAST_BATCH_NONCE.save(storage, entry.token_contract.as_slice(), &entry.nonce)?;
    }
    for batch in &genesis.batches {
        BATCHES.save(storage, (batch.token_contract.as_slice(), batch.nonce), batch)?;
    }
    for call in &genesis.contract_calls {
        CONTRACT_CALLS.save(
            storage,
            (call.invalidation_scope.as_slice(), call.invalidation_nonce),
            call,
        )?;
    }

    for set in &genesis.signer_sets {
        SIGNER_SETS.save(storage, set.nonce, set)?;
    }
    if let Some(nonce) = genesis.latest_signer_set_nonce {
        LATEST_SIGNER_SET_NONCE.save(storage, &nonce)?;
    }
    for confirmation in &genesis.confirmations {
        let key = confirmation.artifact.store_key();
        CONFIRMATIONS.save(storage, (key.as_slice(), &confirmation.validator), confirmation)?;
    }

    for keys in &genesis.delegate_keys {
        DELEGATE_KEYS.save(storage, &keys.validator, keys)?;
        VALIDATOR_BY_ORCHESTRATOR.save(storage, &keys.orchestrator, &keys.validator)?;
        VALIDATOR_BY_ETHEREUM_ADDRESS.save(
            storage,
            keys.ethereum_address.as_slice(),
            &keys.validator,
        )?;
    }
    for entry in &genesis.erc20_to_denoms {
        ERC20_TO_DENOM.save(storage, entry.token_contract.as_slice(), &entry.denom)?;
        DENOM_TO_ERC20.save(storage, &entry.denom, &entry.token_contract)?;
    }

    LAST_SLASHED_SIGNER_SET_NONCE.save(storage, &genesis.last_slashed_signer_set_nonce)?;
    LAST_SLASHED_BATCH_HEIGHT.save(storage, &genesis.last_slashed_batch_height)?;
    LAST_UNBONDING_HEIGHT.save(storage, &genesis.last_unbonding_height)?;
    Ok(())
}

fn values<K, T>(iter: impl Iterator<Item = StdResult<(K, T)>>) -> StdResult<Vec<T>> {
    iter.map(|item| item.map(|(_, value)| value)).collect()
}

pub fn export_genesis(storage: &dyn Storage) -> StdResult<GenesisState> {
    let validator_event_nonces = LAST_EVENT_NONCE_BY_VALIDATOR
        .range(storage, None, None, Order::Ascending)
        .map(|item| {
            item.map(|(validator, event_nonce)| ValidatorEventNonce {
                validator,
                event_nonce,
            })
        })
        .collect::<StdResult<Vec<_>>>()?;

    let last_batch_nonces = LAST_BATCH_NONCE
        .range(storage, None, None, Order::Ascending)
        .map(|item| -> StdResult<TokenBatchNonce> {
            let (contract, nonce) = item?;
            Ok(TokenBatchNonce {
                token_contract: EthAddress::from_slice(&contract)?,
                nonce,
            })
        })
        .collect::<StdResult<Vec<_>>>()?;

    let erc20_to_denoms = ERC20_TO_DENOM
        .range(storage, None, None, Order::Ascending)
        .map(|item| -> StdResult<Erc20ToDenom> {
            let (contract, denom) = item?;
            Ok(Erc20ToDenom {
                token_contract: EthAddress::from_slice(&contract)?,
                denom,
            })
        })
        .collect::<StdResult<Vec<_>>>()?;

    Ok(GenesisState {
        params: load_params(storage)?,
        last_observed_event_nonce: LAST_OBSERVED_EVENT_NONCE
            .may_load(storage)?
            .unwrap_or_default(),
        last_observed_ethereum_height: LAST_OBSERVED_ETHEREUM_HEIGHT.may_load(storage)?,
        last_observed_signer_set: LAST_OBSERVED_SIGNER_SET.may_load(storage)?,
        event_vote_records: values(EVENT_VOTE_RECORDS.range(storage, None, None, Order::Ascending))?,
        validator_event_nonces,
        next_transfer_id: NEXT_TRANSFER_ID.may_load(storage)?.unwrap_or(1),
        pending_transfers: values(PENDING_TRANSFERS.range(storage, None, None, Order::Ascending))?,
        last_batch_nonces,
        batches: values(BATCHES.range(storage, None, None, Order::Ascending))?,
        contract_calls: values(CONTRACT_CALLS.range(storage, None, None, Order::Ascending))?,
        signer_sets: values(SIGNER_SETS.range(storage, None, None, Order::Ascending))?,
        latest_signer_set_nonce: LATEST_SIGNER_SET_NONCE.may_load(storage)?,
        confirmations: values(CONFIRMATIONS.range(storage, None, None, Order::Ascending))?,
        delegate_keys: values(DELEGATE_KEYS.range(storage, None, None, Order::Ascending))?,
        erc20_to_denoms,
        last_slashed_signer_set_nonce: LAST_SLASHED_SIGNER_SET_NONCE
            .may_load(storage)?
            .unwrap_or_default(),
        last_slashed_batch_height: LAST_SLASHED_BATCH_HEIGHT
            .may_load(storage)?
            .unwrap_or_default(),
        last_unbonding_height: LAST_UNBONDING_HEIGHT.may_load(storage)?.unwrap_or_default(),
    })
}
