//! Message types for the Gravity bridge core
//!
//! `ExecuteMsg` is what accounts submit, `SudoMsg` is reserved for the host
//! chain (governance, staking hooks and privileged modules), `QueryMsg` is
//! read-only. `GenesisState` is the full exported state.

use common::{Erc20Token, EthAddress};
use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{Addr, Binary, Coin};

use crate::ethereum_event::EthereumEvent;
use crate::params::Params;
use crate::state::{
    Batch, Confirmation, ContractCall, DelegateKeys, EventVoteRecord, LatestEthereumHeight,
    OutgoingArtifact, PendingTransfer, SignerSet,
};

// ============================================================================
// Execute Messages
// ============================================================================

#[cw_serde]
pub enum ExecuteMsg {
    /// Queue a transfer to Ethereum. `amount + bridge_fee` is escrowed from
    /// the sender; both must be in the same denom.
    SendToEthereum {
        ethereum_recipient: EthAddress,
        amount: Coin,
        bridge_fee: Coin,
    },

    /// Withdraw an unbatched transfer and refund it to its sender
    CancelSendToEthereum { id: u64 },

    /// Build a batch from the highest-fee pending transfers of a token
    RequestBatch { token_contract: EthAddress },

    /// Report an Ethereum event (orchestrator only)
    SubmitEthereumEvent { event: EthereumEvent },

    /// Sign an outgoing artifact's checkpoint (orchestrator only)
    SubmitConfirmation {
        artifact: OutgoingArtifact,
        signature: Binary,
    },

    /// Register the orchestrator account and Ethereum key of the sending
    /// validator. `ethereum_signature` must sign the delegate key digest with
    /// the Ethereum key being registered.
    SetDelegateKeys {
        orchestrator: String,
        ethereum_address: EthAddress,
        ethereum_signature: Binary,
    },
}

// ============================================================================
// Sudo Messages
// ============================================================================

#[cw_serde]
pub enum SudoMsg {
    /// Replace the bridge parameters
    UpdateParams { params: Params },

    /// Queue an arbitrary call for the Ethereum contract to execute
    CreateContractCall {
        invalidation_scope: Binary,
        invalidation_nonce: u64,
        timeout: u64,
        tokens: Vec<Erc20Token>,
        fees: Vec<Erc20Token>,
        payload: Binary,
        address: EthAddress,
    },

    /// Staking hook: a validator began unbonding in this block
    AfterValidatorBeginUnbonding { operator: Addr },
}

// ============================================================================
// Genesis
// ============================================================================

#[cw_serde]
pub struct ValidatorEventNonce {
    pub validator: Addr,
    pub event_nonce: u64,
}

#[cw_serde]
pub struct TokenBatchNonce {
    pub token_contract: EthAddress,
    pub nonce: u64,
}

#[cw_serde]
pub struct Erc20ToDenom {
    pub token_contract: EthAddress,
    pub denom: String,
}

#[cw_serde]
#[derive(Default)]
pub struct GenesisState {
    pub params: Params,
    pub last_observed_event_nonce: u64,
    pub last_observed_ethereum_height: Option<LatestEthereumHeight>,
    pub last_observed_signer_set: Option<SignerSet>,
    pub event_vote_records: Vec<EventVoteRecord>,
    pub validator_event_nonces: Vec<ValidatorEventNonce>,
    pub next_transfer_id: u64,
    pub pending_transfers: Vec<PendingTransfer>,
    pub last_batch_nonces: Vec<TokenBatchNonce>,
    pub batches: Vec<Batch>,
    pub contract_calls: Vec<ContractCall>,
    pub signer_sets: Vec<SignerSet>,
    pub latest_signer_set_nonce: Option<u64>,
    pub confirmations: Vec<Confirmation>,
    pub delegate_keys: Vec<DelegateKeys>,
    pub erc20_to_denoms: Vec<Erc20ToDenom>,
    pub last_slashed_signer_set_nonce: u64,
    pub last_slashed_batch_height: u64,
    pub last_unbonding_height: u64,
}

// ============================================================================
// Query Messages
// ============================================================================

#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    #[returns(Params)]
    Params {},

    /// Last event nonce that reached consensus and the Ethereum height it carried
    #[returns(LastObservedResponse)]
    LastObserved {},

    /// All vote records at an event nonce
    #[returns(EventVoteRecordsResponse)]
    EventVoteRecords { event_nonce: u64 },

    /// Last event nonce a validator claimed
    #[returns(EventNonceResponse)]
    LastEventNonceByValidator { validator: String },

    /// Pending transfers of a token in batch selection order
    #[returns(PendingTransfersResponse)]
    PendingTransfers {
        token_contract: EthAddress,
        limit: Option<u32>,
    },

    #[returns(Option<Batch>)]
    Batch {
        token_contract: EthAddress,
        nonce: u64,
    },

    /// Open batches ordered by token contract then nonce
    #[returns(BatchesResponse)]
    Batches {
        start_after: Option<(EthAddress, u64)>,
        limit: Option<u32>,
    },

    #[returns(Option<SignerSet>)]
    SignerSet { nonce: u64 },

    #[returns(Option<SignerSet>)]
    LatestSignerSet {},

    /// Last signer set reported as executed on Ethereum
    #[returns(Option<SignerSet>)]
    LastObservedSignerSet {},

    #[returns(ConfirmationsResponse)]
    Confirmations { artifact: OutgoingArtifact },

    /// The digest validators sign for an artifact
    #[returns(CheckpointResponse)]
    Checkpoint { artifact: OutgoingArtifact },

    #[returns(ContractCallsResponse)]
    ContractCalls {
        start_after: Option<(Binary, u64)>,
        limit: Option<u32>,
    },

    #[returns(DenomResponse)]
    Erc20ToDenom { token_contract: EthAddress },

    #[returns(Erc20Response)]
    DenomToErc20 { denom: String },

    #[returns(Option<DelegateKeys>)]
    DelegateKeysByValidator { validator: String },

    #[returns(Option<DelegateKeys>)]
    DelegateKeysByOrchestrator { orchestrator: String },

    #[returns(Option<DelegateKeys>)]
    DelegateKeysByEthereumAddress { ethereum_address: EthAddress },
}

// ============================================================================
// Query Responses
// ============================================================================

#[cw_serde]
pub struct LastObservedResponse {
    pub event_nonce: u64,
    pub ethereum_height: Option<LatestEthereumHeight>,
}

#[cw_serde]
pub struct EventVoteRecordEntry {
    /// Hex encoded event hash
    pub hash: String,
    pub record: EventVoteRecord,
}

#[cw_serde]
pub struct EventVoteRecordsResponse {
    pub records: Vec<EventVoteRecordEntry>,
}

#[cw_serde]
pub struct EventNonceResponse {
    pub event_nonce: u64,
}

#[cw_serde]
pub struct PendingTransfersResponse {
    pub transfers: Vec<PendingTransfer>,
}

#[cw_serde]
pub struct BatchesResponse {
    pub batches: Vec<Batch>,
}

#[cw_serde]
pub struct ConfirmationsResponse {
    pub confirmations: Vec<Confirmation>,
}

#[cw_serde]
pub struct CheckpointResponse {
    /// Hex encoded checkpoint
    pub checkpoint: String,
}

#[cw_serde]
pub struct ContractCallsResponse {
    pub calls: Vec<ContractCall>,
}

#[cw_serde]
pub struct DenomResponse {
    pub denom: String,
    /// True when the token originates on the chain
    pub native: bool,
}

#[cw_serde]
pub struct Erc20Response {
    pub token_contract: EthAddress,
    pub native: bool,
}
