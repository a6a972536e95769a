//! Slashing for missing confirmations.
//!
//! Once an artifact is older than its signing window, every validator that
//! was tracked for liveness before the artifact existed and has not confirmed
//! it is slashed and jailed. Validators that started unbonding recently are
//! held to the same rule for `unbond_slashing_window` blocks.
//!
//! Each sweep resumes from a watermark: the last evaluated signer set nonce and
//! the creation height of the last evaluated batch.

use cosmwasm_std::{Decimal, Env, Event, Order, StdResult};
use cw_storage_plus::Bound;
use tracing::info;

use crate::error::GravityError;
use crate::keepers::{Ctx, Validator};
use crate::params::{load_params, Params};
use crate::state::{
    Batch, OutgoingArtifact, BATCHES, CONFIRMATIONS, LAST_SLASHED_BATCH_HEIGHT,
    LAST_SLASHED_SIGNER_SET_NONCE, SIGNER_SETS,
};

/// Run both sweeps
pub fn slash(ctx: &mut Ctx, env: &Env) -> Result<Vec<Event>, GravityError> {
    let params = load_params(ctx.storage)?;
    let mut events = signer_set_slashing(ctx, env, &params)?;
    events.extend(batch_slashing(ctx, env, &params)?);
    Ok(events)
}

pub fn signer_set_slashing(
    ctx: &mut Ctx,
    env: &Env,
    params: &Params,
) -> Result<Vec<Event>, GravityError> {
    let cursor = LAST_SLASHED_SIGNER_SET_NONCE
        .may_load(ctx.storage)?
        .unwrap_or_default();
    // Heights increase with nonces, so the first set still inside its window
    // ends the sweep
    let due = SIGNER_SETS
        .range(
            ctx.storage,
            Some(Bound::exclusive(cursor)),
            None,
            Order::Ascending,
        )
        .take_while(|item| match item {
            Ok((_, set)) => set.height + params.signed_signer_set_window < env.block.height,
            Err(_) => true,
        })
        .collect::<StdResult<Vec<_>>>()?;

    let mut events = vec![];
    for (nonce, set) in due {
        let artifact = OutgoingArtifact::SignerSet { nonce };
        events.extend(slash_missing_confirmations(
            ctx,
            params,
            &artifact,
            set.height,
            params.slash_fraction_signer_set,
        )?);
        LAST_SLASHED_SIGNER_SET_NONCE.save(ctx.storage, &nonce)?;
    }
    Ok(events)
}

pub fn batch_slashing(
    ctx: &mut Ctx,
    env: &Env,
    params: &Params,
) -> Result<Vec<Event>, GravityError> {
    let cursor = LAST_SLASHED_BATCH_HEIGHT.may_load(ctx.storage)?.unwrap_or_default();
    let mut due: Vec<Batch> = BATCHES
        .range(ctx.storage, None, None, Order::Ascending)
        .filter_map(|item| match item {
            Ok((_, batch))
                if batch.height > cursor
                    && batch.height + params.signed_batch_window < env.block.height =>
            {
                Some(Ok(batch))
            }
            Ok(_) => None,
            Err(err) => Some(Err(err)),
        })
        .collect::<StdResult<Vec<_>>>()?;
    due.sort_by(|a, b| {
        (a.height, a.token_contract, a.nonce).cmp(&(b.height, b.token_contract, b.nonce))
    });

    let mut events = vec![];
    for batch in due {
        let artifact = OutgoingArtifact::Batch {
            token_contract: batch.token_contract,
            nonce: batch.nonce,
        };
        events.extend(slash_missing_confirmations(
            ctx,
            params,
            &artifact,
            batch.height,
            params.slash_fraction_batch,
        )?);
        LAST_SLASHED_BATCH_HEIGHT.save(ctx.storage, &batch.height)?;
    }
    Ok(events)
}

fn slash_missing_confirmations(
    ctx: &mut Ctx,
    params: &Params,
    artifact: &OutgoingArtifact,
    artifact_height: u64,
    fraction: Decimal,
) -> Result<Vec<Event>, GravityError> {
    let bonded = ctx.staking.bonded_validators_by_power(ctx.storage)?;
    let unbonding = ctx
        .staking
        .unbonding_validators(ctx.storage)?
        .into_iter()
        .filter(|v| artifact_height < v.unbonding_height + params.unbond_slashing_window);

    let key = artifact.store_key();
    let mut events = vec![];
    for validator in bonded.into_iter().chain(unbonding) {
        let tracked_before = ctx
            .staking
            .signing_start_height(ctx.storage, &validator.operator)?
            .map_or(false, |start| start < artifact_height);
        if !tracked_before {
            continue;
        }
        if CONFIRMATIONS.has(ctx.storage, (key.as_slice(), &validator.operator)) {
            continue;
        }
        events.push(punish(ctx, &validator, artifact, artifact_height, fraction)?);
    }
    Ok(events)
}

fn punish(
    ctx: &mut Ctx,
    validator: &Validator,
    artifact: &OutgoingArtifact,
    artifact_height: u64,
    fraction: Decimal,
) -> Result<Event, GravityError> {
    ctx.staking.slash(
        ctx.storage,
        &validator.operator,
        artifact_height,
        validator.power,
        fraction,
    )?;
    if !validator.jailed {
        ctx.staking.jail(ctx.storage, &validator.operator)?;
    }

    info!(
        validator = %validator.operator,
        artifact = %artifact,
        fraction = %fraction,
        "validator slashed for missing confirmation"
    );
    Ok(Event::new("gravity_slash")
        .add_attribute("validator", validator.operator.to_string())
        .add_attribute("artifact", artifact.to_string())
        .add_attribute("fraction", fraction.to_string())
        .add_attribute("newly_jailed", (!validator.jailed).to_string()))
}
