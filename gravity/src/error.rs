//! Error types for the Gravity bridge core
//!
//! Validation errors are returned before any state is written. Failures while
//! applying an already accepted Ethereum event never surface here; they are
//! logged and discarded by the tally (see `execute::attestation`).

use cosmwasm_std::{StdError, Uint128};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum GravityError {
    #[error("{0}")]
    Std(#[from] StdError),

    // ========================================================================
    // Authorization Errors
    // ========================================================================

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("No validator registered for orchestrator {orchestrator}")]
    UnknownOrchestrator { orchestrator: String },

    #[error("Validator not found: {validator}")]
    ValidatorNotFound { validator: String },

    #[error("No Ethereum address registered for validator {validator}")]
    EthereumAddressNotRegistered { validator: String },

    #[error("Delegate key already in use: {key}")]
    DelegateKeyInUse { key: String },

    // ========================================================================
    // Event Attestation Errors
    // ========================================================================

    #[error("Non contiguous event nonce: expected {expected}, got {got}")]
    NonContiguousNonce { expected: u64, got: u64 },

    #[error("Duplicate vote from {validator} for event nonce {nonce}")]
    DuplicateVote { validator: String, nonce: u64 },

    // ========================================================================
    // Confirmation Errors
    // ========================================================================

    #[error("Duplicate confirmation from {validator} for {artifact}")]
    DuplicateConfirmation { validator: String, artifact: String },

    #[error("Invalid signature: {reason}")]
    InvalidSignature { reason: String },

    #[error("Signer mismatch: expected {expected}, got {got}")]
    SignerMismatch { expected: String, got: String },

    // ========================================================================
    // Artifact Errors
    // ========================================================================

    #[error("{kind} not found: {id}")]
    ArtifactNotFound { kind: String, id: String },

    #[error("Transfer {id} is part of open batch {batch_nonce} and cannot be cancelled")]
    TransferInBatch { id: u64, batch_nonce: u64 },

    #[error("Contract call already exists: scope {scope} nonce {nonce}")]
    ContractCallExists { scope: String, nonce: u64 },

    // ========================================================================
    // Pool & Batch Errors
    // ========================================================================

    #[error("No pending transfers for token contract {token_contract}")]
    EmptyPool { token_contract: String },

    #[error("Open batch {batch_nonce} already carries fees {existing_fees} >= {new_fees}")]
    BatchNotProfitable {
        batch_nonce: u64,
        existing_fees: Uint128,
        new_fees: Uint128,
    },

    #[error("No Ethereum height observed yet, cannot project a timeout")]
    EthereumHeightUnknown,

    #[error("Insufficient funds: {denom} balance {available}, required {required}")]
    InsufficientFunds {
        denom: String,
        available: Uint128,
        required: Uint128,
    },

    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    #[error("No ERC20 contract mapped for denom {denom}")]
    ContractNotFound { denom: String },

    // ========================================================================
    // ERC20 Registration Errors
    // ========================================================================

    #[error("Denom {denom} is already mapped to an ERC20 contract")]
    DenomAlreadyMapped { denom: String },

    #[error("ERC20 {contract} is already mapped to a denom")]
    ContractAlreadyMapped { contract: String },

    #[error("ERC20 deployment does not match denom metadata: {reason}")]
    MetadataMismatch { reason: String },

    // ========================================================================
    // Configuration Errors
    // ========================================================================

    #[error("Invalid params: {reason}")]
    InvalidParams { reason: String },

    #[error("Invalid genesis: {reason}")]
    InvalidGenesis { reason: String },
}

impl GravityError {
    pub fn not_found(kind: &str, id: impl ToString) -> Self {
        GravityError::ArtifactNotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }
}
