//! Checkpoint confirmations.

use cosmwasm_std::{Binary, Event, MessageInfo, Response, Storage};

use crate::checkpoint::{batch_checkpoint, contract_call_checkpoint, signer_set_checkpoint};
use crate::error::GravityError;
use crate::execute::resolve_orchestrator;
use crate::hash::bytes32_to_hex;
use crate::keepers::Ctx;
use crate::params::{load_params, Params};
use crate::signature;
use crate::state::{
    Confirmation, OutgoingArtifact, BATCHES, CONFIRMATIONS, CONTRACT_CALLS, DELEGATE_KEYS,
    SIGNER_SETS,
};

/// Checkpoint of a stored artifact
pub fn artifact_checkpoint(
    storage: &dyn Storage,
    params: &Params,
    artifact: &OutgoingArtifact,
) -> Result<[u8; 32], GravityError> {
    let missing = || GravityError::not_found("artifact", artifact);
    Ok(match artifact {
        OutgoingArtifact::SignerSet { nonce } => {
            let signer_set = SIGNER_SETS.may_load(storage, *nonce)?.ok_or_else(missing)?;
            signer_set_checkpoint(&params.bridge_id, &signer_set)
        }
        OutgoingArtifact::Batch {
            token_contract,
            nonce,
        } => {
            let batch = BATCHES
                .may_load(storage, (token_contract.as_slice(), *nonce))?
                .ok_or_else(missing)?;
            batch_checkpoint(&params.bridge_id, &batch)
        }
        OutgoingArtifact::ContractCall {
            invalidation_scope,
            invalidation_nonce,
        } => {
            let call = CONTRACT_CALLS
                .may_load(storage, (invalidation_scope.as_slice(), *invalidation_nonce))?
                .ok_or_else(missing)?;
            contract_call_checkpoint(&params.bridge_id, &call)
        }
    })
}

/// Orchestrator submits its validator's signature over an artifact.
///
/// The signature must recover to the validator's registered Ethereum key,
/// and each validator confirms each artifact at most once.
pub fn execute_submit_confirmation(
    ctx: &mut Ctx,
    info: MessageInfo,
    artifact: OutgoingArtifact,
    signature: Binary,
) -> Result<Response, GravityError> {
    let validator = resolve_orchestrator(ctx, &info.sender)?;
    let keys = DELEGATE_KEYS
        .may_load(ctx.storage, &validator)?
        .ok_or_else(|| GravityError::EthereumAddressNotRegistered {
            validator: validator.to_string(),
        })?;

    let params = load_params(ctx.storage)?;
    let checkpoint = artifact_checkpoint(ctx.storage, &params, &artifact)?;

    let key = artifact.store_key();
    if CONFIRMATIONS.has(ctx.storage, (key.as_slice(), &validator)) {
        return Err(GravityError::DuplicateConfirmation {
            validator: validator.to_string(),
            artifact: artifact.to_string(),
        });
    }
    signature::verify(&checkpoint, signature.as_slice(), &keys.ethereum_address)?;

    CONFIRMATIONS.save(
        ctx.storage,
        (key.as_slice(), &validator),
        &Confirmation {
            artifact: artifact.clone(),
            validator: validator.clone(),
            ethereum_signer: keys.ethereum_address,
            signature,
        },
    )?;

    Ok(Response::new()
        .add_attribute("method", "submit_confirmation")
        .add_event(
            Event::new("gravity_confirmation")
                .add_attribute("artifact", artifact.to_string())
                .add_attribute("validator", validator)
                .add_attribute("checkpoint", bytes32_to_hex(&checkpoint)),
        ))
}
