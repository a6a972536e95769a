//! Checkpoint Codec
//!
//! Produces the exact digests the Ethereum contract recomputes before it
//! accepts a signer-set update, a batch or a contract call. Each checkpoint is
//! keccak256 over the Solidity `abi.encode` of the artifact's arguments,
//! salted with the bridge id and a method name. The 4-byte function selector
//! is not part of the preimage.
//!
//! ## Encoding
//!
//! A tuple is encoded as a sequence of 32-byte heads followed by the tails of
//! its dynamic members. Static members (`uint256`, `address`, `bytes32`) are
//! encoded in place. Dynamic members (`bytes`, `T[]`) put the byte offset of
//! their tail, measured from the start of the tuple, in the head.

use cosmwasm_std::Uint128;

use common::EthAddress;

use crate::hash::{fixed_bytes32, keccak256};
use crate::state::{Batch, ContractCall, SignerSet};

/// Method name salted into signer-set checkpoints
pub const SIGNER_SET_METHOD: &str = "checkpoint";

/// Method name salted into batch checkpoints
pub const BATCH_METHOD: &str = "transactionBatch";

/// Method name salted into contract call checkpoints
pub const CONTRACT_CALL_METHOD: &str = "logicCall";

/// A value in a Solidity ABI tuple
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AbiToken {
    Uint(u128),
    Address(EthAddress),
    FixedBytes([u8; 32]),
    Bytes(Vec<u8>),
    Array(Vec<AbiToken>),
}

impl AbiToken {
    fn is_dynamic(&self) -> bool {
        matches!(self, AbiToken::Bytes(_) | AbiToken::Array(_))
    }

    fn encode_static(&self, out: &mut Vec<u8>) {
        match self {
            AbiToken::Uint(value) => out.extend_from_slice(&uint_word(*value)),
            AbiToken::Address(address) => out.extend_from_slice(&address.to_bytes32()),
            AbiToken::FixedBytes(word) => out.extend_from_slice(word),
            AbiToken::Bytes(_) | AbiToken::Array(_) => {}
        }
    }

    fn encode_tail(&self) -> Vec<u8> {
        match self {
            AbiToken::Bytes(data) => {
                let mut out = uint_word(data.len() as u128).to_vec();
                out.extend_from_slice(data);
                let padding = (32 - data.len() % 32) % 32;
                out.resize(out.len() + padding, 0);
                out
            }
            AbiToken::Array(items) => {
                let mut out = uint_word(items.len() as u128).to_vec();
                out.extend(abi_encode(items));
                out
            }
            _ => Vec::new(),
        }
    }
}

fn uint_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Solidity `abi.encode(tokens...)`
pub fn abi_encode(tokens: &[AbiToken]) -> Vec<u8> {
    let head_len = tokens.len() * 32;
    let tails: Vec<Vec<u8>> = tokens
        .iter()
        .map(|token| {
            if token.is_dynamic() {
                token.encode_tail()
            } else {
                Vec::new()
            }
        })
        .collect();

    let mut out = Vec::with_capacity(head_len + tails.iter().map(Vec::len).sum::<usize>());
    let mut offset = head_len;
    for (token, tail) in tokens.iter().zip(&tails) {
        if token.is_dynamic() {
            out.extend_from_slice(&uint_word(offset as u128));
            offset += tail.len();
        } else {
            token.encode_static(&mut out);
        }
    }
    for tail in tails {
        out.extend(tail);
    }
    out
}

fn uints(values: impl IntoIterator<Item = Uint128>) -> AbiToken {
    AbiToken::Array(values.into_iter().map(|v| AbiToken::Uint(v.u128())).collect())
}

fn addresses(values: impl IntoIterator<Item = EthAddress>) -> AbiToken {
    AbiToken::Array(values.into_iter().map(AbiToken::Address).collect())
}

/// Right-pad an invalidation scope into a `bytes32`. Scopes longer than 32
/// bytes are rejected when the call is created.
fn scope_word(scope: &[u8]) -> [u8; 32] {
    let mut word = [0u8; 32];
    let len = scope.len().min(32);
    word[..len].copy_from_slice(&scope[..len]);
    word
}

// ============================================================================
// Checkpoints
// ============================================================================

pub fn signer_set_checkpoint(bridge_id: &str, signer_set: &SignerSet) -> [u8; 32] {
    let encoded = abi_encode(&[
        AbiToken::FixedBytes(fixed_bytes32(bridge_id)),
        AbiToken::FixedBytes(fixed_bytes32(SIGNER_SET_METHOD)),
        AbiToken::Uint(signer_set.nonce.into()),
        addresses(signer_set.signers.iter().map(|s| s.ethereum_address)),
        uints(signer_set.signers.iter().map(|s| Uint128::from(s.power))),
    ]);
    keccak256(&encoded)
}

pub fn batch_checkpoint(bridge_id: &str, batch: &Batch) -> [u8; 32] {
    let encoded = abi_encode(&[
        AbiToken::FixedBytes(fixed_bytes32(bridge_id)),
        AbiToken::FixedBytes(fixed_bytes32(BATCH_METHOD)),
        uints(batch.transactions.iter().map(|tx| tx.token.amount)),
        addresses(batch.transactions.iter().map(|tx| tx.ethereum_recipient)),
        uints(batch.transactions.iter().map(|tx| tx.fee.amount)),
        AbiToken::Uint(batch.nonce.into()),
        AbiToken::Address(batch.token_contract),
        AbiToken::Uint(batch.timeout.into()),
    ]);
    keccak256(&encoded)
}

pub fn contract_call_checkpoint(bridge_id: &str, call: &ContractCall) -> [u8; 32] {
    keccak256(&contract_call_preimage(bridge_id, call))
}

fn contract_call_preimage(bridge_id: &str, call: &ContractCall) -> Vec<u8> {
    abi_encode(&[
        AbiToken::FixedBytes(fixed_bytes32(bridge_id)),
        AbiToken::FixedBytes(fixed_bytes32(CONTRACT_CALL_METHOD)),
        uints(call.tokens.iter().map(|t| t.amount)),
        addresses(call.tokens.iter().map(|t| t.contract)),
        uints(call.fees.iter().map(|t| t.amount)),
        addresses(call.fees.iter().map(|t| t.contract)),
        AbiToken::Address(call.address),
        AbiToken::Bytes(call.payload.to_vec()),
        AbiToken::Uint(call.timeout.into()),
        AbiToken::FixedBytes(scope_word(call.invalidation_scope.as_slice())),
        AbiToken::Uint(call.invalidation_nonce.into()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::bytes32_to_hex;
    use crate::state::{EthereumSigner, PendingTransfer};
    use common::Erc20Token;
    use cosmwasm_std::{Addr, Binary};

    fn addr(s: &str) -> EthAddress {
        EthAddress::parse(s).unwrap()
    }

    #[test]
    fn test_abi_encode_static_words() {
        let encoded = abi_encode(&[
            AbiToken::Uint(1),
            AbiToken::Address(EthAddress::new([0xff; 20])),
        ]);
        assert_eq!(encoded.len(), 64);
        assert_eq!(encoded[31], 1);
        assert_eq!(&encoded[32..44], &[0u8; 12]);
        assert_eq!(&encoded[44..64], &[0xff; 20]);
    }

    #[test]
    fn test_abi_encode_dynamic_offsets() {
        // (uint256[] [7], bytes "ab")
        let encoded = abi_encode(&[
            AbiToken::Array(vec![AbiToken::Uint(7)]),
            AbiToken::Bytes(b"ab".to_vec()),
        ]);
        // heads: 2 words; tail 1: len + 1 item; tail 2: len + 1 padded word
        assert_eq!(encoded.len(), 32 * 6);
        assert_eq!(encoded[31], 0x40);
        assert_eq!(encoded[63], 0x80);
        assert_eq!(encoded[95], 1);
        assert_eq!(encoded[127], 7);
        assert_eq!(encoded[159], 2);
        assert_eq!(&encoded[160..162], b"ab");
        assert_eq!(&encoded[162..192], &[0u8; 30]);
    }

    #[test]
    fn test_signer_set_checkpoint_golden() {
        let signer_set = SignerSet {
            nonce: 0,
            height: 0,
            signers: vec![EthereumSigner {
                ethereum_address: addr("0xc783df8a850f42e7F7e57013759C285caa701eB6"),
                power: 6667,
            }],
        };
        assert_eq!(
            bytes32_to_hex(&signer_set_checkpoint("foo", &signer_set)),
            "0x4372d0bb452702c9a374a61287cde9bf5923f127efc9e5989fe4b2d2e9433849"
        );
    }

    #[test]
    fn test_batch_checkpoint_golden() {
        let token_contract = addr("0x835973768750b3ED2D5c3EF5AdcD5eDb44d12aD4");
        let batch = Batch {
            nonce: 1,
            timeout: 2111,
            token_contract,
            transactions: vec![PendingTransfer {
                id: 1,
                sender: Addr::unchecked("cosmos1sender"),
                ethereum_recipient: addr("0x9FC9C2DfBA3b6cF204C37a5F690619772b926e39"),
                token: Erc20Token::new(token_contract, 1u128),
                fee: Erc20Token::new(token_contract, 1u128),
            }],
            height: 0,
        };
        assert_eq!(
            bytes32_to_hex(&batch_checkpoint("foo", &batch)),
            "0xa3a7ee0a363b8ad2514e7ee8f110d7449c0d88f3b0913c28c1751e6e0079a9b2"
        );
    }

    fn golden_call() -> ContractCall {
        let token = addr("0xC26eFfa98B8A2632141562Ae7E34953Cfe5B4888");
        ContractCall {
            invalidation_scope: Binary::from(b"invalidationId".to_vec()),
            invalidation_nonce: 1,
            timeout: 4_766_922_941_000,
            tokens: vec![Erc20Token::new(token, 1u128)],
            fees: vec![Erc20Token::new(token, 1u128)],
            payload: Binary::from(b"testing".to_vec()),
            address: addr("0x17c1736CcF692F653c433d7aa2aB45148C016F68"),
            height: 0,
        }
    }

    #[test]
    fn test_contract_call_checkpoint_golden() {
        let call = golden_call();
        assert_eq!(contract_call_preimage("foo", &call).len(), 672);
        assert_eq!(
            bytes32_to_hex(&contract_call_checkpoint("foo", &call)),
            "0x96a9a4a2ac23edeef404f0b44e75ce2f8fca8d739d1236aeb43f75ed0dec7122"
        );
    }

    #[test]
    fn test_checkpoint_is_salted_by_bridge_id() {
        let call = golden_call();
        assert_ne!(
            contract_call_checkpoint("foo", &call),
            contract_call_checkpoint("bar", &call)
        );
    }

    #[test]
    fn test_checkpoint_ignores_chain_side_metadata() {
        let mut call = golden_call();
        let before = contract_call_checkpoint("foo", &call);
        call.height = 99;
        assert_eq!(contract_call_checkpoint("foo", &call), before);
    }
}
