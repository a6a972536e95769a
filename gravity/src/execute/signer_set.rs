//! Signer set snapshots.
//!
//! A signer set is the bonded validator set expressed as Ethereum keys with
//! powers normalized to `u32::MAX`. A new one is stored whenever the
//! Ethereum contract's set has drifted too far from the chain's.

use std::collections::BTreeMap;

use cosmwasm_std::{Addr, Decimal, Env, Event, Order, StdResult, Storage};
use cw_storage_plus::Bound;
use tracing::info;

use common::EthAddress;

use super::batch::remove_confirmations;
use crate::keepers::Ctx;
use crate::params::load_params;
use crate::state::{
    latest_signer_set, EthereumSigner, OutgoingArtifact, SignerSet, DELEGATE_KEYS,
    LAST_OBSERVED_SIGNER_SET, LAST_SLASHED_SIGNER_SET_NONCE, LAST_UNBONDING_HEIGHT,
    LATEST_SIGNER_SET_NONCE, SIGNER_SETS,
};

/// Upper bound of the sum of normalized powers in a signer set
pub const NORMALIZED_POWER_TOTAL: u64 = u32::MAX as u64;

/// The signer set the chain would publish right now. Not stored.
///
/// Bonded validators without a registered Ethereum key are left out of both
/// the members and the total used for normalization.
pub fn current_signer_set(ctx: &Ctx, env: &Env) -> StdResult<SignerSet> {
    let storage = &*ctx.storage;
    let mut keyed: Vec<(EthAddress, u64)> = vec![];
    for validator in ctx.staking.bonded_validators_by_power(storage)? {
        let Some(keys) = DELEGATE_KEYS.may_load(storage, &validator.operator)? else {
            continue;
        };
        let power = ctx.staking.last_validator_power(storage, &validator.operator)?;
        keyed.push((keys.ethereum_address, power));
    }

    let total: u128 = keyed.iter().map(|(_, power)| u128::from(*power)).sum();
    let mut signers: Vec<EthereumSigner> = keyed
        .into_iter()
        .map(|(ethereum_address, power)| EthereumSigner {
            ethereum_address,
            power: normalize_power(power, total),
        })
        .collect();
    signers.sort_by(|a, b| {
        b.power
            .cmp(&a.power)
            .then_with(|| a.ethereum_address.cmp(&b.ethereum_address))
    });

    let nonce = LATEST_SIGNER_SET_NONCE.may_load(storage)?.unwrap_or_default() + 1;
    Ok(SignerSet {
        nonce,
        height: env.block.height,
        signers,
    })
}

fn normalize_power(power: u64, total: u128) -> u64 {
    if total == 0 {
        return 0;
    }
    // power <= total, so the quotient fits in u32
    (u128::from(power) * u128::from(NORMALIZED_POWER_TOTAL) / total) as u64
}

/// Sum of absolute power differences between two sets, as a fraction of the
/// normalized total
pub fn power_drift(a: &[EthereumSigner], b: &[EthereumSigner]) -> Decimal {
    let mut powers: BTreeMap<EthAddress, (u64, u64)> = BTreeMap::new();
    for signer in a {
        powers.entry(signer.ethereum_address).or_default().0 = signer.power;
    }
    for signer in b {
        powers.entry(signer.ethereum_address).or_default().1 = signer.power;
    }
    let diff: u128 = powers
        .values()
        .map(|(x, y)| u128::from(x.abs_diff(*y)))
        .sum();
    Decimal::from_ratio(diff, NORMALIZED_POWER_TOTAL)
}

/// Store the current signer set under the next nonce
pub fn snapshot(ctx: &mut Ctx, env: &Env) -> StdResult<SignerSet> {
    let signer_set = current_signer_set(ctx, env)?;
    SIGNER_SETS.save(ctx.storage, signer_set.nonce, &signer_set)?;
    LATEST_SIGNER_SET_NONCE.save(ctx.storage, &signer_set.nonce)?;

    info!(
        signer_set_nonce = signer_set.nonce,
        signers = signer_set.signers.len(),
        "signer set created"
    );
    Ok(signer_set)
}

/// Snapshot if there is no set yet, a validator began unbonding in this
/// block, or power has drifted past the configured fraction. Empty sets are
/// never stored.
pub fn create_signer_set_if_needed(ctx: &mut Ctx, env: &Env) -> StdResult<Option<Event>> {
    let params = load_params(ctx.storage)?;
    let current = current_signer_set(ctx, env)?;
    if current.signers.is_empty() {
        return Ok(None);
    }

    let unbonding_now = LAST_UNBONDING_HEIGHT.may_load(ctx.storage)? == Some(env.block.height);
    let needed = match latest_signer_set(ctx.storage)? {
        None => true,
        Some(latest) => {
            unbonding_now
                || power_drift(&current.signers, &latest.signers) > params.signer_set_power_drift
        }
    };
    if !needed {
        return Ok(None);
    }

    let signer_set = snapshot(ctx, env)?;
    Ok(Some(
        Event::new("gravity_signer_set_created")
            .add_attribute("signer_set_nonce", signer_set.nonce.to_string())
            .add_attribute("signers", signer_set.signers.len().to_string()),
    ))
}

/// Staking hook for a validator starting to unbond
pub fn after_validator_begin_unbonding(
    storage: &mut dyn Storage,
    env: &Env,
    operator: &Addr,
) -> StdResult<()> {
    info!(validator = %operator, height = env.block.height, "validator began unbonding");
    LAST_UNBONDING_HEIGHT.save(storage, &env.block.height)
}

/// Remove signer sets older than the one last observed on Ethereum that the
/// slashing sweep has already evaluated, together with their confirmations
pub fn prune_signer_sets(storage: &mut dyn Storage) -> StdResult<u64> {
    let Some(observed) = LAST_OBSERVED_SIGNER_SET.may_load(storage)? else {
        return Ok(0);
    };
    let slashed = LAST_SLASHED_SIGNER_SET_NONCE
        .may_load(storage)?
        .unwrap_or_default();
    let bound = observed.nonce.min(slashed.saturating_add(1));

    let stale = SIGNER_SETS
        .keys(storage, None, Some(Bound::exclusive(bound)), Order::Ascending)
        .collect::<StdResult<Vec<_>>>()?;
    for nonce in &stale {
        SIGNER_SETS.remove(storage, *nonce);
        remove_confirmations(storage, &OutgoingArtifact::SignerSet { nonce: *nonce })?;
    }
    Ok(stale.len() as u64)
}
