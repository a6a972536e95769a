//! Gravity bridge core - Entry Points
//!
//! The host chain drives the bridge through these functions:
//! - `execute` for account transactions
//! - `sudo` for privileged chain calls
//! - `end_blocker` once at the end of every block
//! - `query` for reads
//! - `init_genesis` / `export_genesis` for state import and export
//!
//! Every transaction and every end-of-block run executes against a
//! copy-on-write overlay that is committed only when it succeeds.

use cosmwasm_std::{to_json_binary, Binary, Env, MessageInfo, Response, StdResult, Storage};

use crate::error::GravityError;
use crate::execute::{
    after_validator_begin_unbonding, cancel_timed_out_batches, cancel_timed_out_contract_calls,
    create_signer_set_if_needed, execute_cancel_send_to_ethereum, execute_create_contract_call,
    execute_request_batch, execute_send_to_ethereum, execute_set_delegate_keys,
    execute_submit_confirmation, execute_submit_ethereum_event, prune_event_vote_records,
    prune_signer_sets, slash, tally, ContractCallRequest,
};
use crate::genesis;
use crate::keepers::Ctx;
use crate::msg::{ExecuteMsg, GenesisState, QueryMsg, SudoMsg};
use crate::params::set_params;
use crate::query::{
    query_batch, query_batches, query_checkpoint, query_confirmations, query_contract_calls,
    query_delegate_keys_by_ethereum_address, query_delegate_keys_by_orchestrator,
    query_delegate_keys_by_validator, query_denom_to_erc20, query_erc20_to_denom,
    query_event_vote_records, query_last_event_nonce_by_validator, query_last_observed,
    query_last_observed_signer_set, query_latest_signer_set, query_params,
    query_pending_transfers, query_signer_set,
};

// ============================================================================
// Genesis
// ============================================================================

pub fn init_genesis(ctx: &mut Ctx, genesis: GenesisState) -> Result<Response, GravityError> {
    ctx.branch(|ctx| genesis::init_genesis(ctx.storage, genesis))?;
    Ok(Response::new().add_attribute("method", "init_genesis"))
}

pub fn export_genesis(storage: &dyn Storage) -> StdResult<GenesisState> {
    genesis::export_genesis(storage)
}

// ============================================================================
// Execute
// ============================================================================

pub fn execute(
    ctx: &mut Ctx,
    env: Env,
    info: MessageInfo,
    msg: ExecuteMsg,
) -> Result<Response, GravityError> {
    ctx.branch(|ctx| match msg {
        ExecuteMsg::SendToEthereum {
            ethereum_recipient,
            amount,
            bridge_fee,
        } => execute_send_to_ethereum(ctx, info, ethereum_recipient, amount, bridge_fee),
        ExecuteMsg::CancelSendToEthereum { id } => execute_cancel_send_to_ethereum(ctx, info, id),
        ExecuteMsg::RequestBatch { token_contract } => {
            execute_request_batch(ctx, env, token_contract)
        }
        ExecuteMsg::SubmitEthereumEvent { event } => {
            execute_submit_ethereum_event(ctx, env, info, event)
        }
        ExecuteMsg::SubmitConfirmation {
            artifact,
            signature,
        } => execute_submit_confirmation(ctx, info, artifact, signature),
        ExecuteMsg::SetDelegateKeys {
            orchestrator,
            ethereum_address,
            ethereum_signature,
        } => execute_set_delegate_keys(ctx, info, orchestrator, ethereum_address, ethereum_signature),
    })
}

// ============================================================================
// Sudo
// ============================================================================

pub fn sudo(ctx: &mut Ctx, env: Env, msg: SudoMsg) -> Result<Response, GravityError> {
    ctx.branch(|ctx| match msg {
        SudoMsg::UpdateParams { params } => {
            set_params(ctx.storage, &params)?;
            Ok(Response::new().add_attribute("method", "update_params"))
        }
        SudoMsg::CreateContractCall {
            invalidation_scope,
            invalidation_nonce,
            timeout,
            tokens,
            fees,
            payload,
            address,
        } => execute_create_contract_call(
            ctx,
            env,
            ContractCallRequest {
                invalidation_scope,
                invalidation_nonce,
                timeout,
                tokens,
                fees,
                payload,
                address,
            },
        ),
        SudoMsg::AfterValidatorBeginUnbonding { operator } => {
            after_validator_begin_unbonding(ctx.storage, &env, &operator)?;
            Ok(Response::new()
                .add_attribute("method", "after_validator_begin_unbonding")
                .add_attribute("validator", operator))
        }
    })
}

// ============================================================================
// End Block
// ============================================================================

/// Block-level bookkeeping, in order: slashing, tally, timeouts, signer set
/// creation, pruning.
pub fn end_blocker(ctx: &mut Ctx, env: Env) -> Result<Response, GravityError> {
    ctx.branch(|ctx| {
        let mut events = slash(ctx, &env)?;
        events.extend(tally(ctx, &env)?);
        events.extend(cancel_timed_out_batches(ctx)?);
        events.extend(cancel_timed_out_contract_calls(ctx)?);
        events.extend(create_signer_set_if_needed(ctx, &env)?);
        prune_signer_sets(ctx.storage)?;
        prune_event_vote_records(ctx.storage, &env)?;

        Ok(Response::new()
            .add_attribute("method", "end_blocker")
            .add_events(events))
    })
}

// ============================================================================
// Query
// ============================================================================

pub fn query(storage: &dyn Storage, _env: Env, msg: QueryMsg) -> StdResult<Binary> {
    match msg {
        QueryMsg::Params {} => to_json_binary(&query_params(storage)?),
        QueryMsg::LastObserved {} => to_json_binary(&query_last_observed(storage)?),
        QueryMsg::EventVoteRecords { event_nonce } => {
            to_json_binary(&query_event_vote_records(storage, event_nonce)?)
        }
        QueryMsg::LastEventNonceByValidator { validator } => {
            to_json_binary(&query_last_event_nonce_by_validator(storage, validator)?)
        }
        QueryMsg::PendingTransfers {
            token_contract,
            limit,
        } => to_json_binary(&query_pending_transfers(storage, token_contract, limit)?),
        QueryMsg::Batch {
            token_contract,
            nonce,
        } => to_json_binary(&query_batch(storage, token_contract, nonce)?),
        QueryMsg::Batches { start_after, limit } => {
            to_json_binary(&query_batches(storage, start_after, limit)?)
        }
        QueryMsg::SignerSet { nonce } => to_json_binary(&query_signer_set(storage, nonce)?),
        QueryMsg::LatestSignerSet {} => to_json_binary(&query_latest_signer_set(storage)?),
        QueryMsg::LastObservedSignerSet {} => {
            to_json_binary(&query_last_observed_signer_set(storage)?)
        }
        QueryMsg::Confirmations { artifact } => {
            to_json_binary(&query_confirmations(storage, artifact)?)
        }
        QueryMsg::Checkpoint { artifact } => to_json_binary(&query_checkpoint(storage, artifact)?),
        QueryMsg::ContractCalls { start_after, limit } => {
            to_json_binary(&query_contract_calls(storage, start_after, limit)?)
        }
        QueryMsg::Erc20ToDenom { token_contract } => {
            to_json_binary(&query_erc20_to_denom(storage, token_contract)?)
        }
        QueryMsg::DenomToErc20 { denom } => to_json_binary(&query_denom_to_erc20(storage, denom)?),
        QueryMsg::DelegateKeysByValidator { validator } => {
            to_json_binary(&query_delegate_keys_by_validator(storage, validator)?)
        }
        QueryMsg::DelegateKeysByOrchestrator { orchestrator } => {
            to_json_binary(&query_delegate_keys_by_orchestrator(storage, orchestrator)?)
        }
        QueryMsg::DelegateKeysByEthereumAddress { ethereum_address } => to_json_binary(
            &query_delegate_keys_by_ethereum_address(storage, ethereum_address)?,
        ),
    }
}
