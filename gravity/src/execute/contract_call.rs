//! Outgoing contract calls.
//!
//! A call is identified by its invalidation scope and nonce. Executing a call
//! on Ethereum invalidates every call in its scope with a lower nonce, so the
//! chain side drops those too.

use common::{Erc20Token, EthAddress};
use cosmwasm_std::{Binary, Env, Event, Order, Response, StdResult};
use cw_storage_plus::Bound;
use tracing::{info, warn};

use super::batch::remove_confirmations;
use crate::error::GravityError;
use crate::keepers::Ctx;
use crate::state::{ContractCall, OutgoingArtifact, CONTRACT_CALLS, LAST_OBSERVED_ETHEREUM_HEIGHT};

/// Parameters of a new contract call
#[derive(Clone, Debug, PartialEq)]
pub struct ContractCallRequest {
    pub invalidation_scope: Binary,
    pub invalidation_nonce: u64,
    pub timeout: u64,
    pub tokens: Vec<Erc20Token>,
    pub fees: Vec<Erc20Token>,
    pub payload: Binary,
    pub address: EthAddress,
}

/// Store a new contract call. Privileged; reached through `SudoMsg`.
pub fn create_contract_call(
    ctx: &mut Ctx,
    env: &Env,
    request: ContractCallRequest,
) -> Result<ContractCall, GravityError> {
    let scope = request.invalidation_scope;
    if scope.is_empty() || scope.len() > 32 {
        return Err(GravityError::InvalidAmount {
            reason: format!("invalidation scope must be 1-32 bytes, got {}", scope.len()),
        });
    }
    if request.address.is_zero() {
        return Err(GravityError::InvalidAmount {
            reason: "logic contract must not be the zero address".to_string(),
        });
    }
    if CONTRACT_CALLS.has(ctx.storage, (scope.as_slice(), request.invalidation_nonce)) {
        return Err(GravityError::ContractCallExists {
            scope: hex::encode(scope.as_slice()),
            nonce: request.invalidation_nonce,
        });
    }

    let call = ContractCall {
        invalidation_scope: scope,
        invalidation_nonce: request.invalidation_nonce,
        timeout: request.timeout,
        tokens: request.tokens,
        fees: request.fees,
        payload: request.payload,
        address: request.address,
        height: env.block.height,
    };
    CONTRACT_CALLS.save(
        ctx.storage,
        (call.invalidation_scope.as_slice(), call.invalidation_nonce),
        &call,
    )?;

    info!(
        scope = %hex::encode(call.invalidation_scope.as_slice()),
        invalidation_nonce = call.invalidation_nonce,
        "contract call created"
    );
    Ok(call)
}

pub fn execute_create_contract_call(
    ctx: &mut Ctx,
    env: Env,
    request: ContractCallRequest,
) -> Result<Response, GravityError> {
    let call = create_contract_call(ctx, &env, request)?;
    Ok(Response::new()
        .add_attribute("method", "create_contract_call")
        .add_event(call_event("gravity_contract_call_created", &call)))
}

/// The Ethereum contract executed a call; it and every lower nonce in its
/// scope are gone
pub fn contract_call_executed(
    ctx: &mut Ctx,
    invalidation_scope: &Binary,
    invalidation_nonce: u64,
) -> Result<Vec<Event>, GravityError> {
    let superseded = CONTRACT_CALLS
        .prefix(invalidation_scope.as_slice())
        .range(
            ctx.storage,
            None,
            Some(Bound::inclusive(invalidation_nonce)),
            Order::Ascending,
        )
        .collect::<StdResult<Vec<_>>>()?;

    let mut events = vec![];
    for (_, call) in superseded {
        let kind = if call.invalidation_nonce == invalidation_nonce {
            "gravity_contract_call_executed"
        } else {
            "gravity_contract_call_canceled"
        };
        delete_contract_call(ctx, &call)?;
        events.push(call_event(kind, &call));
    }
    Ok(events)
}

/// Drop calls whose timeout is below the last observed Ethereum height
pub fn cancel_timed_out_contract_calls(ctx: &mut Ctx) -> Result<Vec<Event>, GravityError> {
    let Some(observed) = LAST_OBSERVED_ETHEREUM_HEIGHT.may_load(ctx.storage)? else {
        return Ok(vec![]);
    };

    let timed_out = CONTRACT_CALLS
        .range(ctx.storage, None, None, Order::Ascending)
        .filter_map(|item| match item {
            Ok((_, call)) if call.timeout < observed.ethereum_height => Some(Ok(call)),
            Ok(_) => None,
            Err(err) => Some(Err(err)),
        })
        .collect::<StdResult<Vec<_>>>()?;

    let mut events = vec![];
    for call in timed_out {
        warn!(
            scope = %hex::encode(call.invalidation_scope.as_slice()),
            invalidation_nonce = call.invalidation_nonce,
            timeout = call.timeout,
            "contract call timed out"
        );
        delete_contract_call(ctx, &call)?;
        events.push(call_event("gravity_contract_call_canceled", &call));
    }
    Ok(events)
}

fn delete_contract_call(ctx: &mut Ctx, call: &ContractCall) -> StdResult<()> {
    CONTRACT_CALLS.remove(
        ctx.storage,
        (call.invalidation_scope.as_slice(), call.invalidation_nonce),
    );
    remove_confirmations(
        ctx.storage,
        &OutgoingArtifact::ContractCall {
            invalidation_scope: call.invalidation_scope.clone(),
            invalidation_nonce: call.invalidation_nonce,
        },
    )
}

fn call_event(kind: &str, call: &ContractCall) -> Event {
    Event::new(kind)
        .add_attribute("invalidation_scope", hex::encode(call.invalidation_scope.as_slice()))
        .add_attribute("invalidation_nonce", call.invalidation_nonce.to_string())
        .add_attribute("address", call.address.to_string())
        .add_attribute("timeout", call.timeout.to_string())
}
