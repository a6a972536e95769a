//! Delegate key registration.
//!
//! A validator hands its bridge duties to an orchestrator account and signs
//! Ethereum checkpoints with a dedicated Ethereum key. Both are bound to the
//! validator one to one.

use common::EthAddress;
use cosmwasm_std::{Addr, Binary, MessageInfo, Response};

use crate::error::GravityError;
use crate::execute::validate_cosmos_address;
use crate::hash::keccak256_concat;
use crate::keepers::Ctx;
use crate::params::load_params;
use crate::signature;
use crate::state::{
    DelegateKeys, DELEGATE_KEYS, VALIDATOR_BY_ETHEREUM_ADDRESS, VALIDATOR_BY_ORCHESTRATOR,
};

/// Domain tag of the delegate key digest
pub const DELEGATE_KEY_DOMAIN: &[u8] = b"gravity-delegate";

/// Digest the Ethereum key signs to prove it consents to the registration
pub fn delegate_key_digest(bridge_id: &str, validator: &Addr) -> [u8; 32] {
    keccak256_concat(&[
        DELEGATE_KEY_DOMAIN,
        bridge_id.as_bytes(),
        validator.as_str().as_bytes(),
    ])
}

/// Register or rotate the sender validator's delegate keys.
pub fn execute_set_delegate_keys(
    ctx: &mut Ctx,
    info: MessageInfo,
    orchestrator: String,
    ethereum_address: EthAddress,
    ethereum_signature: Binary,
) -> Result<Response, GravityError> {
    let validator = info.sender;
    if ctx.staking.validator(ctx.storage, &validator)?.is_none() {
        return Err(GravityError::ValidatorNotFound {
            validator: validator.to_string(),
        });
    }
    let orchestrator = validate_cosmos_address(&orchestrator)?;
    if ethereum_address.is_zero() {
        return Err(GravityError::InvalidSignature {
            reason: "Ethereum address must not be zero".to_string(),
        });
    }

    if let Some(owner) = VALIDATOR_BY_ORCHESTRATOR.may_load(ctx.storage, &orchestrator)? {
        if owner != validator {
            return Err(GravityError::DelegateKeyInUse {
                key: orchestrator.to_string(),
            });
        }
    }
    if let Some(owner) =
        VALIDATOR_BY_ETHEREUM_ADDRESS.may_load(ctx.storage, ethereum_address.as_slice())?
    {
        if owner != validator {
            return Err(GravityError::DelegateKeyInUse {
                key: ethereum_address.to_string(),
            });
        }
    }

    let params = load_params(ctx.storage)?;
    let digest = delegate_key_digest(&params.bridge_id, &validator);
    signature::verify(&digest, ethereum_signature.as_slice(), &ethereum_address)?;

    // Rotation releases the previous keys
    if let Some(previous) = DELEGATE_KEYS.may_load(ctx.storage, &validator)? {
        VALIDATOR_BY_ORCHESTRATOR.remove(ctx.storage, &previous.orchestrator);
        VALIDATOR_BY_ETHEREUM_ADDRESS.remove(ctx.storage, previous.ethereum_address.as_slice());
    }

    let keys = DelegateKeys {
        validator: validator.clone(),
        orchestrator: orchestrator.clone(),
        ethereum_address,
    };
    save_delegate_keys(ctx, &keys)?;

    Ok(Response::new()
        .add_attribute("method", "set_delegate_keys")
        .add_attribute("validator", validator)
        .add_attribute("orchestrator", orchestrator)
        .add_attribute("ethereum_address", ethereum_address.to_string()))
}

pub(crate) fn save_delegate_keys(ctx: &mut Ctx, keys: &DelegateKeys) -> Result<(), GravityError> {
    DELEGATE_KEYS.save(ctx.storage, &keys.validator, keys)?;
    VALIDATOR_BY_ORCHESTRATOR.save(ctx.storage, &keys.orchestrator, &keys.validator)?;
    VALIDATOR_BY_ETHEREUM_ADDRESS.save(
        ctx.storage,
        keys.ethereum_address.as_slice(),
        &keys.validator,
    )?;
    Ok(())
}

/// Resolve the validator an orchestrator acts for
pub fn resolve_orchestrator(ctx: &Ctx, orchestrator: &Addr) -> Result<Addr, GravityError> {
    let storage = &*ctx.storage;
    let validator = VALIDATOR_BY_ORCHESTRATOR
        .may_load(storage, orchestrator)?
        .ok_or_else(|| GravityError::UnknownOrchestrator {
            orchestrator: orchestrator.to_string(),
        })?;
    if ctx.staking.validator(storage, &validator)?.is_none() {
        return Err(GravityError::ValidatorNotFound {
            validator: validator.to_string(),
        });
    }
    Ok(validator)
}
