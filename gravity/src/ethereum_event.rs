//! Ethereum events reported by orchestrators
//!
//! Every variant carries the event nonce assigned by the Ethereum contract and
//! the Ethereum height it was emitted at. The hash identifies the event content
//! only, so identical reports from different validators land on the same vote
//! record.

use common::EthAddress;
use cosmwasm_schema::cw_serde;
use cosmwasm_std::{to_json_vec, Binary, StdResult, Uint128};

use crate::error::GravityError;
use crate::hash::keccak256;
use crate::state::EthereumSigner;

#[cw_serde]
pub enum EthereumEvent {
    /// Tokens locked on Ethereum for a chain account
    SendToCosmos {
        event_nonce: u64,
        ethereum_height: u64,
        token_contract: EthAddress,
        amount: Uint128,
        ethereum_sender: EthAddress,
        cosmos_receiver: String,
    },
    /// An outgoing batch was executed by the Ethereum contract
    BatchExecuted {
        event_nonce: u64,
        ethereum_height: u64,
        token_contract: EthAddress,
        batch_nonce: u64,
    },
    /// An outgoing contract call was executed by the Ethereum contract
    ContractCallExecuted {
        event_nonce: u64,
        ethereum_height: u64,
        invalidation_scope: Binary,
        invalidation_nonce: u64,
    },
    /// An ERC20 representing a native denom was deployed
    Erc20Deployed {
        event_nonce: u64,
        ethereum_height: u64,
        cosmos_denom: String,
        token_contract: EthAddress,
        erc20_name: String,
        erc20_symbol: String,
        erc20_decimals: u32,
    },
    /// The Ethereum multisig rotated to a new signer set
    SignerSetTxExecuted {
        event_nonce: u64,
        ethereum_height: u64,
        signer_set_nonce: u64,
        members: Vec<EthereumSigner>,
    },
}

impl EthereumEvent {
    pub fn event_nonce(&self) -> u64 {
        match self {
            EthereumEvent::SendToCosmos { event_nonce, .. }
            | EthereumEvent::BatchExecuted { event_nonce, .. }
            | EthereumEvent::ContractCallExecuted { event_nonce, .. }
            | EthereumEvent::Erc20Deployed { event_nonce, .. }
            | EthereumEvent::SignerSetTxExecuted { event_nonce, .. } => *event_nonce,
        }
    }

    pub fn ethereum_height(&self) -> u64 {
        match self {
            EthereumEvent::SendToCosmos { ethereum_height, .. }
            | EthereumEvent::BatchExecuted { ethereum_height, .. }
            | EthereumEvent::ContractCallExecuted { ethereum_height, .. }
            | EthereumEvent::Erc20Deployed { ethereum_height, .. }
            | EthereumEvent::SignerSetTxExecuted { ethereum_height, .. } => *ethereum_height,
        }
    }

    /// Short name used in logs and event attributes
    pub fn kind(&self) -> &'static str {
        match self {
            EthereumEvent::SendToCosmos { .. } => "send_to_cosmos",
            EthereumEvent::BatchExecuted { .. } => "batch_executed",
            EthereumEvent::ContractCallExecuted { .. } => "contract_call_executed",
            EthereumEvent::Erc20Deployed { .. } => "erc20_deployed",
            EthereumEvent::SignerSetTxExecuted { .. } => "signer_set_tx_executed",
        }
    }

    /// keccak256 of the canonical JSON encoding of the event.
    ///
    /// The encoding is tagged by variant, so two events of different kinds
    /// never share a hash even when their fields coincide.
    pub fn hash(&self) -> StdResult<[u8; 32]> {
        Ok(keccak256(&to_json_vec(self)?))
    }

    /// Stateless checks performed before a claim is recorded
    pub fn validate_basic(&self) -> Result<(), GravityError> {
        if self.event_nonce() == 0 {
            return Err(GravityError::NonContiguousNonce {
                expected: 1,
                got: 0,
            });
        }
        match self {
            EthereumEvent::SendToCosmos {
                token_contract,
                amount,
                ..
            } => {
                if token_contract.is_zero() {
                    return Err(GravityError::InvalidAmount {
                        reason: "token contract must not be the zero address".to_string(),
                    });
                }
                if amount.is_zero() {
                    return Err(GravityError::InvalidAmount {
                        reason: "amount must be non-zero".to_string(),
                    });
                }
            }
            EthereumEvent::ContractCallExecuted {
                invalidation_scope, ..
            } => {
                if invalidation_scope.is_empty() || invalidation_scope.len() > 32 {
                    return Err(GravityError::InvalidAmount {
                        reason: format!(
                            "invalidation scope must be 1-32 bytes, got {}",
                            invalidation_scope.len()
                        ),
                    });
                }
            }
            EthereumEvent::Erc20Deployed { cosmos_denom, .. } => {
                if cosmos_denom.is_empty() {
                    return Err(GravityError::InvalidAmount {
                        reason: "cosmos denom must not be empty".to_string(),
                    });
                }
            }
            EthereumEvent::BatchExecuted { .. } | EthereumEvent::SignerSetTxExecuted { .. } => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deposit(nonce: u64, amount: u128) -> EthereumEvent {
        EthereumEvent::SendToCosmos {
            event_nonce: nonce,
            ethereum_height: 100,
            token_contract: EthAddress::new([0x11; 20]),
            amount: Uint128::new(amount),
            ethereum_sender: EthAddress::new([0x22; 20]),
            cosmos_receiver: crate::testing::receiver().to_string(),
        }
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(deposit(1, 10).hash().unwrap(), deposit(1, 10).hash().unwrap());
    }

    #[test]
    fn test_hash_depends_on_content() {
        assert_ne!(deposit(1, 10).hash().unwrap(), deposit(1, 11).hash().unwrap());
        assert_ne!(deposit(1, 10).hash().unwrap(), deposit(2, 10).hash().unwrap());
    }

    #[test]
    fn test_hash_separates_variants() {
        let executed = EthereumEvent::BatchExecuted {
            event_nonce: 1,
            ethereum_height: 100,
            token_contract: EthAddress::new([0x11; 20]),
            batch_nonce: 1,
        };
        assert_ne!(executed.hash().unwrap(), deposit(1, 10).hash().unwrap());
        assert_eq!(executed.kind(), "batch_executed");
        assert_eq!(executed.event_nonce(), 1);
        assert_eq!(executed.ethereum_height(), 100);
    }

    #[test]
    fn test_validate_basic() {
        assert!(deposit(1, 10).validate_basic().is_ok());
        assert!(deposit(0, 10).validate_basic().is_err());
        assert!(deposit(1, 0).validate_basic().is_err());

        let call = EthereumEvent::ContractCallExecuted {
            event_nonce: 1,
            ethereum_height: 1,
            invalidation_scope: Binary::from(vec![0u8; 33]),
            invalidation_nonce: 1,
        };
        assert!(call.validate_basic().is_err());
    }
}
