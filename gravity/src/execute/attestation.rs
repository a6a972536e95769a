//! Event attestation: claim recording, tally and application.
//!
//! Orchestrators report Ethereum events in strict nonce order. Each report is
//! a vote on the record for `(event_nonce, event_hash)`. At the end of every
//! block the tally accepts, one nonce at a time, the first record at the next
//! unobserved nonce whose voters hold the threshold share of bonded power, and
//! applies its effect.

use cosmwasm_std::{Addr, Decimal, Env, Event, MessageInfo, Order, Response, StdResult, Storage};
use tracing::{error, info};

use common::{voucher_denom, EthAddress};
use cosmwasm_std::{coins, Uint128};

use crate::error::GravityError;
use crate::ethereum_event::EthereumEvent;
use crate::execute::{
    batch_executed, contract_call_executed, resolve_orchestrator, validate_cosmos_address,
};
use crate::hash::bytes32_to_hex;
use crate::keepers::Ctx;
use crate::params::{load_params, Params};
use crate::state::{
    last_observed_event_nonce, EventVoteRecord, LatestEthereumHeight, SignerSet, DENOM_TO_ERC20,
    ERC20_TO_DENOM, EVENT_VOTE_RECORDS, LAST_EVENT_NONCE_BY_VALIDATOR, LAST_OBSERVED_ETHEREUM_HEIGHT,
    LAST_OBSERVED_EVENT_NONCE, LAST_OBSERVED_SIGNER_SET, SIGNER_SETS,
};

/// Result of tallying a single event nonce
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TallyOutcome {
    Accepted { event_nonce: u64, hash: [u8; 32] },
    ThresholdNotMet,
}

// ============================================================================
// Claims
// ============================================================================

/// Orchestrator reports an Ethereum event on behalf of its validator.
pub fn execute_submit_ethereum_event(
    ctx: &mut Ctx,
    env: Env,
    info: MessageInfo,
    event: EthereumEvent,
) -> Result<Response, GravityError> {
    event.validate_basic()?;
    let validator = resolve_orchestrator(ctx, &info.sender)?;
    let hash = record_claim(ctx.storage, &env, &event, &validator)?;

    Ok(Response::new()
        .add_attribute("method", "submit_ethereum_event")
        .add_event(
            Event::new("gravity_claim")
                .add_attribute("validator", validator)
                .add_attribute("event_type", event.kind())
                .add_attribute("event_nonce", event.event_nonce().to_string())
                .add_attribute("event_hash", bytes32_to_hex(&hash)),
        ))
}

/// Record `validator`'s vote for `event`.
///
/// The event nonce must be exactly one above the validator's last claimed
/// nonce. Nothing is written when the claim is rejected.
pub fn record_claim(
    storage: &mut dyn Storage,
    env: &Env,
    event: &EthereumEvent,
    validator: &Addr,
) -> Result<[u8; 32], GravityError> {
    let nonce = event.event_nonce();
    let last = last_event_nonce_by_validator(storage, validator)?;
    if nonce != last + 1 {
        return Err(GravityError::NonContiguousNonce {
            expected: last + 1,
            got: nonce,
        });
    }

    let hash = event.hash()?;
    let key = (nonce, hash.as_slice());
    let mut record = EVENT_VOTE_RECORDS
        .may_load(storage, key)?
        .unwrap_or_else(|| EventVoteRecord {
            event: event.clone(),
            votes: vec![],
            accepted: false,
            height: env.block.height,
        });
    if record.votes.contains(validator) {
        return Err(GravityError::DuplicateVote {
            validator: validator.to_string(),
            nonce,
        });
    }
    record.votes.push(validator.clone());

    EVENT_VOTE_RECORDS.save(storage, key, &record)?;
    LAST_EVENT_NONCE_BY_VALIDATOR.save(storage, validator, &nonce)?;
    Ok(hash)
}

/// Last event nonce claimed by `validator`.
///
/// A validator that has never claimed starts just below the lowest accepted
/// record still in the store, so it can vote on every record that may still
/// be tallied. With no accepted record left it starts at the last observed
/// nonce.
pub fn last_event_nonce_by_validator(storage: &dyn Storage, validator: &Addr) -> StdResult<u64> {
    if let Some(nonce) = LAST_EVENT_NONCE_BY_VALIDATOR.may_load(storage, validator)? {
        return Ok(nonce);
    }
    for item in EVENT_VOTE_RECORDS.range(storage, None, None, Order::Ascending) {
        let ((nonce, _), record) = item?;
        if record.accepted {
            return Ok(nonce.saturating_sub(1));
        }
    }
    last_observed_event_nonce(storage)
}

// ============================================================================
// Tally
// ============================================================================

/// Accept and apply every consecutive event nonce that has reached the vote
/// threshold, starting right after the last observed nonce.
pub fn tally(ctx: &mut Ctx, env: &Env) -> Result<Vec<Event>, GravityError> {
    let params = load_params(ctx.storage)?;
    let mut events = vec![];
    loop {
        let nonce = last_observed_event_nonce(ctx.storage)? + 1;
        match tally_nonce(ctx, env, &params, nonce, &mut events)? {
            TallyOutcome::Accepted { .. } => continue,
            TallyOutcome::ThresholdNotMet => break,
        }
    }
    Ok(events)
}

/// Tally the records at `nonce`, accepting at most one of them
pub fn tally_nonce(
    ctx: &mut Ctx,
    env: &Env,
    params: &Params,
    nonce: u64,
    events: &mut Vec<Event>,
) -> Result<TallyOutcome, GravityError> {
    let total_power = ctx.staking.total_bonded_power(ctx.storage)?;
    if total_power == 0 {
        return Ok(TallyOutcome::ThresholdNotMet);
    }

    let records = EVENT_VOTE_RECORDS
        .prefix(nonce)
        .range(ctx.storage, None, None, Order::Ascending)
        .collect::<StdResult<Vec<_>>>()?;

    for (hash, mut record) in records {
        if record.accepted {
            continue;
        }
        let mut voted_power: u128 = 0;
        for validator in &record.votes {
            voted_power += u128::from(ctx.staking.last_validator_power(ctx.storage, validator)?);
        }
        if Decimal::from_ratio(voted_power, total_power) < params.vote_threshold {
            continue;
        }

        let hash: [u8; 32] = hash
            .as_slice()
            .try_into()
            .map_err(|_| GravityError::not_found("event vote record", nonce))?;
        record.accepted = true;
        EVENT_VOTE_RECORDS.save(ctx.storage, (nonce, hash.as_slice()), &record)?;
        LAST_OBSERVED_EVENT_NONCE.save(ctx.storage, &nonce)?;
        LAST_OBSERVED_ETHEREUM_HEIGHT.save(
            ctx.storage,
            &LatestEthereumHeight {
                ethereum_height: record.event.ethereum_height(),
                cosmos_height: env.block.height,
                cosmos_time: env.block.time,
            },
        )?;

        info!(
            event_type = record.event.kind(),
            event_nonce = nonce,
            votes = record.votes.len(),
            "ethereum event observed"
        );
        events.push(
            Event::new("gravity_observation")
                .add_attribute("event_type", record.event.kind())
                .add_attribute("event_nonce", nonce.to_string())
                .add_attribute("event_hash", bytes32_to_hex(&hash)),
        );
        events.extend(apply(ctx, env, &record.event, &hash));
        return Ok(TallyOutcome::Accepted {
            event_nonce: nonce,
            hash,
        });
    }
    Ok(TallyOutcome::ThresholdNotMet)
}

// ============================================================================
// Application
// ============================================================================

/// Apply an accepted event in its own overlay.
///
/// A failure discards only the event's own writes; the record stays accepted
/// and the observed nonce stays advanced.
pub fn apply(ctx: &mut Ctx, env: &Env, event: &EthereumEvent, hash: &[u8; 32]) -> Vec<Event> {
    match ctx.branch(|ctx| apply_event(ctx, env, event)) {
        Ok(events) => events,
        Err(err) => {
            error!(
                event_type = event.kind(),
                event_nonce = event.event_nonce(),
                record_key = %bytes32_to_hex(hash),
                error = %err,
                "failed to apply accepted ethereum event"
            );
            vec![Event::new("gravity_event_apply_failed")
                .add_attribute("event_type", event.kind())
                .add_attribute("event_nonce", event.event_nonce().to_string())
                .add_attribute("event_hash", bytes32_to_hex(hash))
                .add_attribute("error", err.to_string())]
        }
    }
}

fn apply_event(ctx: &mut Ctx, env: &Env, event: &EthereumEvent) -> Result<Vec<Event>, GravityError> {
    match event {
        EthereumEvent::SendToCosmos {
            token_contract,
            amount,
            cosmos_receiver,
            ethereum_sender,
            ..
        } => apply_send_to_cosmos(ctx, token_contract, *amount, ethereum_sender, cosmos_receiver),
        EthereumEvent::BatchExecuted {
            token_contract,
            batch_nonce,
            ..
        } => batch_executed(ctx, token_contract, *batch_nonce),
        EthereumEvent::ContractCallExecuted {
            invalidation_scope,
            invalidation_nonce,
            ..
        } => contract_call_executed(ctx, invalidation_scope, *invalidation_nonce),
        EthereumEvent::Erc20Deployed {
            cosmos_denom,
            token_contract,
            erc20_name,
            erc20_symbol,
            erc20_decimals,
            ..
        } => apply_erc20_deployed(
            ctx,
            cosmos_denom,
            token_contract,
            erc20_name,
            erc20_symbol,
            *erc20_decimals,
        ),
        EthereumEvent::SignerSetTxExecuted {
            signer_set_nonce,
            members,
            ..
        } => {
            let height = SIGNER_SETS
                .may_load(ctx.storage, *signer_set_nonce)?
                .map(|set| set.height)
                .unwrap_or(env.block.height);
            LAST_OBSERVED_SIGNER_SET.save(
                ctx.storage,
                &SignerSet {
                    nonce: *signer_set_nonce,
                    height,
                    signers: members.clone(),
                },
            )?;
            Ok(vec![Event::new("gravity_signer_set_observed")
                .add_attribute("signer_set_nonce", signer_set_nonce.to_string())])
        }
    }
}

/// Credit the receiver with vouchers, or unlock native coins when the token
/// is the ERC20 representation of a chain denom
fn apply_send_to_cosmos(
    ctx: &mut Ctx,
    token_contract: &EthAddress,
    amount: Uint128,
    ethereum_sender: &EthAddress,
    cosmos_receiver: &str,
) -> Result<Vec<Event>, GravityError> {
    let receiver = validate_cosmos_address(cosmos_receiver)?;
    let (denom, native) = match ERC20_TO_DENOM.may_load(ctx.storage, token_contract.as_slice())? {
        Some(denom) => (denom, true),
        None => (voucher_denom(token_contract), false),
    };
    let funds = coins(amount.u128(), &denom);
    if !native {
        ctx.bank.mint(ctx.storage, &funds)?;
    }
    ctx.bank.send_from_module(ctx.storage, &receiver, &funds)?;

    Ok(vec![Event::new("gravity_send_to_cosmos")
        .add_attribute("ethereum_sender", ethereum_sender.to_string())
        .add_attribute("receiver", receiver)
        .add_attribute("amount", amount.to_string())
        .add_attribute("denom", denom)])
}

/// Map a chain denom to its newly deployed ERC20 if the deployment matches
/// the denom's bank metadata
fn apply_erc20_deployed(
    ctx: &mut Ctx,
    cosmos_denom: &str,
    token_contract: &EthAddress,
    name: &str,
    symbol: &str,
    decimals: u32,
) -> Result<Vec<Event>, GravityError> {
    if DENOM_TO_ERC20.has(ctx.storage, cosmos_denom) {
        return Err(GravityError::DenomAlreadyMapped {
            denom: cosmos_denom.to_string(),
        });
    }
    if ERC20_TO_DENOM.has(ctx.storage, token_contract.as_slice()) {
        return Err(GravityError::ContractAlreadyMapped {
            contract: token_contract.to_string(),
        });
    }

    let metadata = ctx
        .bank
        .denom_metadata(ctx.storage, cosmos_denom)?
        .ok_or_else(|| GravityError::MetadataMismatch {
            reason: format!("no metadata for denom {cosmos_denom}"),
        })?;
    if metadata.name != name {
        return Err(mismatch("name", &metadata.name, name));
    }
    if metadata.symbol != symbol {
        return Err(mismatch("symbol", &metadata.symbol, symbol));
    }
    if metadata.decimals != decimals {
        return Err(mismatch(
            "decimals",
            &metadata.decimals.to_string(),
            &decimals.to_string(),
        ));
    }

    DENOM_TO_ERC20.save(ctx.storage, cosmos_denom, token_contract)?;
    ERC20_TO_DENOM.save(ctx.storage, token_contract.as_slice(), &cosmos_denom.to_string())?;

    Ok(vec![Event::new("gravity_erc20_deployed")
        .add_attribute("denom", cosmos_denom)
        .add_attribute("token_contract", token_contract.to_string())])
}

fn mismatch(field: &str, expected: &str, got: &str) -> GravityError {
    GravityError::MetadataMismatch {
        reason: format!("{field}: expected {expected}, got {got}"),
    }
}

// ============================================================================
// Pruning
// ============================================================================

/// Remove vote records older than the event vote window that can no longer
/// change the outcome: accepted records, and unaccepted records at nonces
/// that are already observed.
pub fn prune_event_vote_records(storage: &mut dyn Storage, env: &Env) -> StdResult<u64> {
    let params = load_params(storage)?;
    let last_observed = last_observed_event_nonce(storage)?;

    let stale = EVENT_VOTE_RECORDS
        .range(storage, None, None, Order::Ascending)
        .filter_map(|item| match item {
            Ok(((nonce, hash), record)) => {
                let expired = record.height + params.event_vote_window < env.block.height;
                let resolved = record.accepted || nonce <= last_observed;
                (expired && resolved).then_some(Ok((nonce, hash)))
            }
            Err(err) => Some(Err(err)),
        })
        .collect::<StdResult<Vec<_>>>()?;

    for (nonce, hash) in &stale {
        EVENT_VOTE_RECORDS.remove(storage, (*nonce, hash.as_slice()));
    }
    Ok(stale.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{deposit_event, TestApp};

    #[test]
    fn test_record_claim_requires_contiguous_nonce() {
        let mut app = TestApp::new();
        let validator = Addr::unchecked("cosmosvaloper1alice");
        let env = app.env.clone();

        let err = record_claim(&mut app.storage, &env, &deposit_event(2, 10), &validator).unwrap_err();
        assert_eq!(
            err,
            GravityError::NonContiguousNonce {
                expected: 1,
                got: 2
            }
        );
        assert!(LAST_EVENT_NONCE_BY_VALIDATOR
            .may_load(&app.storage, &validator)
            .unwrap()
            .is_none());

        record_claim(&mut app.storage, &env, &deposit_event(1, 10), &validator).unwrap();
        record_claim(&mut app.storage, &env, &deposit_event(2, 10), &validator).unwrap();
        let err = record_claim(&mut app.storage, &env, &deposit_event(2, 10), &validator).unwrap_err();
        assert!(matches!(err, GravityError::NonContiguousNonce { .. }));
        assert_eq!(last_event_nonce_by_validator(&app.storage, &validator).unwrap(), 2);
    }

    #[test]
    fn test_identical_claims_share_a_record() {
        let mut app = TestApp::new();
        let env = app.env.clone();
        let a = Addr::unchecked("cosmosvaloper1alice");
        let b = Addr::unchecked("cosmosvaloper1bob");

        let hash_a = record_claim(&mut app.storage, &env, &deposit_event(1, 10), &a).unwrap();
        let hash_b = record_claim(&mut app.storage, &env, &deposit_event(1, 10), &b).unwrap();
        assert_eq!(hash_a, hash_b);

        let record = EVENT_VOTE_RECORDS
            .load(&app.storage, (1, hash_a.as_slice()))
            .unwrap();
        assert_eq!(record.votes, vec![a, b]);
        assert!(!record.accepted);
    }

    #[test]
    fn test_bootstrap_nonce_for_unseen_validator() {
        let mut app = TestApp::new();
        let unseen = Addr::unchecked("cosmosvaloper1carol");
        assert_eq!(last_event_nonce_by_validator(&app.storage, &unseen).unwrap(), 0);

        let record = EventVoteRecord {
            event: deposit_event(7, 10),
            votes: vec![],
            accepted: true,
            height: 1,
        };
        let hash = record.event.hash().unwrap();
        EVENT_VOTE_RECORDS
            .save(&mut app.storage, (7, hash.as_slice()), &record)
            .unwrap();
        LAST_OBSERVED_EVENT_NONCE.save(&mut app.storage, &9).unwrap();
        assert_eq!(last_event_nonce_by_validator(&app.storage, &unseen).unwrap(), 6);

        EVENT_VOTE_RECORDS.remove(&mut app.storage, (7, hash.as_slice()));
        assert_eq!(last_event_nonce_by_validator(&app.storage, &unseen).unwrap(), 9);
    }
}
