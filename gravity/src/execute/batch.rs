//! Batch building, execution, cancellation and timeouts.

use common::EthAddress;
use cosmwasm_std::{Env, Event, Order, OverflowError, Response, StdResult, Storage};
use cw_storage_plus::Bound;
use tracing::{info, warn};

use crate::error::GravityError;
use crate::execute::{insert_into_pool, pending_transfers_by_fee, remove_from_pool};
use crate::keepers::Ctx;
use crate::params::{load_params, Params};
use crate::state::{
    sum_fees, Batch, OutgoingArtifact, BATCHES, CONFIRMATIONS, LAST_BATCH_NONCE,
    LAST_OBSERVED_ETHEREUM_HEIGHT,
};

pub fn execute_request_batch(
    ctx: &mut Ctx,
    env: Env,
    token_contract: EthAddress,
) -> Result<Response, GravityError> {
    let params = load_params(ctx.storage)?;
    let batch = build_batch(ctx, &env, &token_contract, params.batch_max_size as usize)?;

    Ok(Response::new()
        .add_attribute("method", "request_batch")
        .add_event(batch_event("gravity_batch_created", &batch)))
}

// ============================================================================
// Timeout Projection
// ============================================================================

/// Current Ethereum height extrapolated from the last observation and the
/// chain time elapsed since
pub fn projected_ethereum_height(
    storage: &dyn Storage,
    env: &Env,
    params: &Params,
) -> Result<u64, GravityError> {
    let observed = LAST_OBSERVED_ETHEREUM_HEIGHT
        .may_load(storage)?
        .ok_or(GravityError::EthereumHeightUnknown)?;
    let elapsed_ms = env
        .block
        .time
        .nanos()
        .saturating_sub(observed.cosmos_time.nanos())
        / 1_000_000;
    Ok(observed.ethereum_height + elapsed_ms / params.average_ethereum_block_time_ms)
}

/// Ethereum height after which a batch created now should be rejected
pub fn projected_batch_timeout(
    storage: &dyn Storage,
    env: &Env,
    params: &Params,
) -> Result<u64, GravityError> {
    Ok(projected_ethereum_height(storage, env, params)? + params.target_batch_timeout_blocks())
}

// ============================================================================
// Building
// ============================================================================

/// Move up to `max_size` of the best-paying transfers of a token into a new
/// batch.
pub fn build_batch(
    ctx: &mut Ctx,
    env: &Env,
    token_contract: &EthAddress,
    max_size: usize,
) -> Result<Batch, GravityError> {
    let params = load_params(ctx.storage)?;
    let selected = pending_transfers_by_fee(ctx.storage, token_contract, max_size)?;
    if selected.is_empty() {
        return Err(GravityError::EmptyPool {
            token_contract: token_contract.to_string(),
        });
    }

    let new_fees = sum_fees(&selected).map_err(fee_overflow)?;
    if let Some(latest) = latest_batch(ctx.storage, token_contract)? {
        let existing_fees = latest.total_fees().map_err(fee_overflow)?;
        if existing_fees >= new_fees {
            return Err(GravityError::BatchNotProfitable {
                batch_nonce: latest.nonce,
                existing_fees,
                new_fees,
            });
        }
    }

    let timeout = projected_batch_timeout(ctx.storage, env, &params)?;
    for tx in &selected {
        remove_from_pool(ctx.storage, tx);
    }

    let nonce = LAST_BATCH_NONCE
        .may_load(ctx.storage, token_contract.as_slice())?
        .unwrap_or_default()
        + 1;
    LAST_BATCH_NONCE.save(ctx.storage, token_contract.as_slice(), &nonce)?;

    let batch = Batch {
        nonce,
        timeout,
        token_contract: *token_contract,
        transactions: selected,
        height: env.block.height,
    };
    BATCHES.save(ctx.storage, (token_contract.as_slice(), nonce), &batch)?;

    info!(
        token_contract = %token_contract,
        batch_nonce = nonce,
        transactions = batch.transactions.len(),
        fees = %new_fees,
        timeout,
        "batch created"
    );
    Ok(batch)
}

/// Newest open batch of a token
pub fn latest_batch(storage: &dyn Storage, token_contract: &EthAddress) -> StdResult<Option<Batch>> {
    BATCHES
        .prefix(token_contract.as_slice())
        .range(storage, None, None, Order::Descending)
        .next()
        .map(|item| item.map(|(_, batch)| batch))
        .transpose()
}

// ============================================================================
// Execution & Cancellation
// ============================================================================

/// The Ethereum contract executed a batch. Its transfers are final; every
/// older open batch of the same token can never execute and is cancelled.
pub fn batch_executed(
    ctx: &mut Ctx,
    token_contract: &EthAddress,
    nonce: u64,
) -> Result<Vec<Event>, GravityError> {
    let batch = BATCHES
        .may_load(ctx.storage, (token_contract.as_slice(), nonce))?
        .ok_or_else(|| GravityError::not_found("batch", format!("{token_contract}/{nonce}")))?;

    let older = BATCHES
        .prefix(token_contract.as_slice())
        .keys(ctx.storage, None, Some(Bound::exclusive(nonce)), Order::Ascending)
        .collect::<StdResult<Vec<_>>>()?;

    let mut events = vec![];
    for older_nonce in older {
        events.push(cancel_batch(ctx, token_contract, older_nonce)?);
    }

    delete_batch(ctx.storage, &batch)?;
    events.push(batch_event("gravity_batch_executed", &batch));
    Ok(events)
}

/// Delete an open batch and return its transfers to the pool
pub fn cancel_batch(
    ctx: &mut Ctx,
    token_contract: &EthAddress,
    nonce: u64,
) -> Result<Event, GravityError> {
    let batch = BATCHES
        .may_load(ctx.storage, (token_contract.as_slice(), nonce))?
        .ok_or_else(|| GravityError::not_found("batch", format!("{token_contract}/{nonce}")))?;

    for tx in &batch.transactions {
        insert_into_pool(ctx.storage, tx)?;
    }
    delete_batch(ctx.storage, &batch)?;
    Ok(batch_event("gravity_batch_canceled", &batch))
}

/// Cancel every batch whose timeout is below the last observed Ethereum
/// height
pub fn cancel_timed_out_batches(ctx: &mut Ctx) -> Result<Vec<Event>, GravityError> {
    let Some(observed) = LAST_OBSERVED_ETHEREUM_HEIGHT.may_load(ctx.storage)? else {
        return Ok(vec![]);
    };

    let timed_out = BATCHES
        .range(ctx.storage, None, None, Order::Ascending)
        .filter_map(|item| match item {
            Ok((_, batch)) if batch.timeout < observed.ethereum_height => Some(Ok(batch)),
            Ok(_) => None,
            Err(err) => Some(Err(err)),
        })
        .collect::<StdResult<Vec<_>>>()?;

    let mut events = vec![];
    for batch in timed_out {
        warn!(
            token_contract = %batch.token_contract,
            batch_nonce = batch.nonce,
            timeout = batch.timeout,
            ethereum_height = observed.ethereum_height,
            "batch timed out"
        );
        events.push(cancel_batch(ctx, &batch.token_contract, batch.nonce)?);
    }
    Ok(events)
}

fn delete_batch(storage: &mut dyn Storage, batch: &Batch) -> StdResult<()> {
    BATCHES.remove(storage, (batch.token_contract.as_slice(), batch.nonce));
    let artifact = OutgoingArtifact::Batch {
        token_contract: batch.token_contract,
        nonce: batch.nonce,
    };
    remove_confirmations(storage, &artifact)
}

/// Drop every confirmation of an artifact
pub(crate) fn remove_confirmations(
    storage: &mut dyn Storage,
    artifact: &OutgoingArtifact,
) -> StdResult<()> {
    let key = artifact.store_key();
    let signers = CONFIRMATIONS
        .prefix(key.as_slice())
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<Vec<_>>>()?;
    for validator in signers {
        CONFIRMATIONS.remove(storage, (key.as_slice(), &validator));
    }
    Ok(())
}

fn fee_overflow(err: OverflowError) -> GravityError {
    GravityError::InvalidAmount {
        reason: format!("batch fees overflow: {err}"),
    }
}

fn batch_event(kind: &str, batch: &Batch) -> Event {
    Event::new(kind)
        .add_attribute("token_contract", batch.token_contract.to_string())
        .add_attribute("batch_nonce", batch.nonce.to_string())
        .add_attribute("transactions", batch.transactions.len().to_string())
        .add_attribute("timeout", batch.timeout.to_string())
}
