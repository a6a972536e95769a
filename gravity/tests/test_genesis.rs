//! Genesis Import/Export Tests

use common::{Erc20Token, EthAddress};
use cosmwasm_std::testing::MockStorage;
use cosmwasm_std::{coin, Binary};

use gravity::contract::{export_genesis, init_genesis};
use gravity::msg::{ExecuteMsg, GenesisState, PendingTransfersResponse, QueryMsg, SudoMsg};
use gravity::params::Params;
use gravity::state::{OutgoingArtifact, PendingTransfer};
use gravity::testing::{
    account, deposit_event, receiver, test_voucher, MockBank, MockStaking, TestApp, TEST_TOKEN,
};
use gravity::{Ctx, GravityError};

/// An app with something in every table
fn populated_app() -> TestApp {
    let mut app = TestApp::new();
    let alice = app.add_validator("alice", 50);
    let bob = app.add_validator("bob", 30);
    let carol = app.add_validator("carol", 20);
    app.end_block().unwrap();
    app.confirm(&alice, OutgoingArtifact::SignerSet { nonce: 1 })
        .unwrap();

    app.claim(&alice, deposit_event(1, 10_000)).unwrap();
    app.claim(&bob, deposit_event(1, 10_000)).unwrap();
    app.claim(&carol, deposit_event(1, 10_000)).unwrap();
    app.claim(&alice, deposit_event(2, 5)).unwrap();
    app.end_block().unwrap();

    let user = receiver();
    for fee in [1, 2, 3] {
        app.execute(
            &user,
            ExecuteMsg::SendToEthereum {
                ethereum_recipient: EthAddress::new([0x33; 20]),
                amount: coin(100, test_voucher()),
                bridge_fee: coin(fee, test_voucher()),
            },
        )
        .unwrap();
    }
    app.sudo(SudoMsg::UpdateParams {
        params: Params {
            batch_max_size: 1,
            ..Params::default()
        },
    })
    .unwrap();
    app.execute(
        &user,
        ExecuteMsg::RequestBatch {
            token_contract: TEST_TOKEN,
        },
    )
    .unwrap();
    app.confirm(
        &bob,
        OutgoingArtifact::Batch {
            token_contract: TEST_TOKEN,
            nonce: 1,
        },
    )
    .unwrap();

    app.sudo(SudoMsg::CreateContractCall {
        invalidation_scope: Binary::from(b"scope".to_vec()),
        invalidation_nonce: 4,
        timeout: 10_000,
        tokens: vec![Erc20Token::new(TEST_TOKEN, 1u128)],
        fees: vec![],
        payload: Binary::from(vec![1, 2, 3]),
        address: EthAddress::new([0x44; 20]),
    })
    .unwrap();
    app
}

#[test]
fn test_export_import_roundtrip() {
    let app = populated_app();
    let exported = export_genesis(&app.storage).unwrap();
    assert_eq!(exported.last_observed_event_nonce, 1);
    assert_eq!(exported.event_vote_records.len(), 2);
    assert_eq!(exported.pending_transfers.len(), 2);
    assert_eq!(exported.batches.len(), 1);
    assert_eq!(exported.confirmations.len(), 2);
    assert_eq!(exported.delegate_keys.len(), 3);
    assert_eq!(exported.next_transfer_id, 4);

    let imported = TestApp::with_genesis(exported.clone());
    assert_eq!(export_genesis(&imported.storage).unwrap(), exported);

    // The fee index is rebuilt on import
    let res: PendingTransfersResponse = imported
        .query(QueryMsg::PendingTransfers {
            token_contract: TEST_TOKEN,
            limit: None,
        })
        .unwrap();
    let ids: Vec<u64> = res.transfers.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![2, 1]);
}

#[test]
fn test_default_genesis_exports_cleanly() {
    let app = TestApp::new();
    let exported = export_genesis(&app.storage).unwrap();
    assert_eq!(exported.params, Params::default());
    assert_eq!(exported.next_transfer_id, 1);
    assert!(exported.signer_sets.is_empty());
}

#[test]
fn test_invalid_genesis_writes_nothing() {
    let mut storage = MockStorage::new();
    let genesis = GenesisState {
        next_transfer_id: 1,
        pending_transfers: vec![PendingTransfer {
            id: 5,
            sender: account("sender"),
            ethereum_recipient: EthAddress::new([0x33; 20]),
            token: Erc20Token::new(TEST_TOKEN, 10u128),
            fee: Erc20Token::new(TEST_TOKEN, 1u128),
        }],
        ..GenesisState::default()
    };

    let err = init_genesis(&mut Ctx::new(&mut storage, &MockStaking, &MockBank), genesis)
        .unwrap_err();
    assert!(matches!(err, GravityError::InvalidGenesis { .. }));
    assert!(export_genesis(&storage).is_err());

    let bad_params = GenesisState {
        params: Params {
            bridge_id: String::new(),
            ..Params::default()
        },
        ..GenesisState::default()
    };
    let err = init_genesis(&mut Ctx::new(&mut storage, &MockStaking, &MockBank), bad_params)
        .unwrap_err();
    assert!(matches!(err, GravityError::InvalidParams { .. }));
}
