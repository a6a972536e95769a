//! Delegate Key Tests

use cosmwasm_std::Addr;

use gravity::execute::delegate_key_digest;
use gravity::msg::{ExecuteMsg, QueryMsg};
use gravity::params::DEFAULT_BRIDGE_ID;
use gravity::state::DelegateKeys;
use gravity::testing::{account, EthereumKey, TestApp};
use gravity::GravityError;

fn set_keys(
    app: &mut TestApp,
    operator: &Addr,
    orchestrator: &str,
    key: &EthereumKey,
) -> Result<(), GravityError> {
    let digest = delegate_key_digest(DEFAULT_BRIDGE_ID, operator);
    app.execute(
        operator,
        ExecuteMsg::SetDelegateKeys {
            orchestrator: orchestrator.to_string(),
            ethereum_address: key.address(),
            ethereum_signature: key.sign(&digest).into(),
        },
    )?;
    Ok(())
}

#[test]
fn test_register_and_lookup() {
    let mut app = TestApp::new();
    let alice = app.add_validator("alice", 10);

    let expected = DelegateKeys {
        validator: alice.operator.clone(),
        orchestrator: alice.orchestrator.clone(),
        ethereum_address: alice.key.address(),
    };
    let by_validator: Option<DelegateKeys> = app
        .query(QueryMsg::DelegateKeysByValidator {
            validator: alice.operator.to_string(),
        })
        .unwrap();
    let by_orchestrator: Option<DelegateKeys> = app
        .query(QueryMsg::DelegateKeysByOrchestrator {
            orchestrator: alice.orchestrator.to_string(),
        })
        .unwrap();
    let by_address: Option<DelegateKeys> = app
        .query(QueryMsg::DelegateKeysByEthereumAddress {
            ethereum_address: alice.key.address(),
        })
        .unwrap();
    assert_eq!(by_validator, Some(expected.clone()));
    assert_eq!(by_orchestrator, Some(expected.clone()));
    assert_eq!(by_address, Some(expected));
}

#[test]
fn test_only_validators_register() {
    let mut app = TestApp::new();
    let stranger = Addr::unchecked("cosmosvaloper1stranger");
    let err = set_keys(
        &mut app,
        &stranger,
        account("orchstranger").as_str(),
        &EthereumKey::from_seed(7),
    )
    .unwrap_err();
    assert!(matches!(err, GravityError::ValidatorNotFound { .. }));
}

#[test]
fn test_orchestrator_must_be_bech32() {
    let mut app = TestApp::new();
    let operator = app.bond_validator("alice", 10);
    let key = EthereumKey::from_seed(1);

    for orchestrator in ["cosmos1orchalice", "", "0x9fc9c2dfba3b6cf204c37a5f690619772b926e39"] {
        let err = set_keys(&mut app, &operator, orchestrator, &key).unwrap_err();
        assert!(matches!(err, GravityError::Std(_)), "{orchestrator}");
    }
    let keys: Option<DelegateKeys> = app
        .query(QueryMsg::DelegateKeysByValidator {
            validator: operator.to_string(),
        })
        .unwrap();
    assert!(keys.is_none());
}

#[test]
fn test_signature_must_come_from_registered_key() {
    let mut app = TestApp::new();
    let operator = app.bond_validator("alice", 10);
    let key = EthereumKey::from_seed(1);
    let other = EthereumKey::from_seed(2);
    let digest = delegate_key_digest(DEFAULT_BRIDGE_ID, &operator);

    let err = app
        .execute(
            &operator,
            ExecuteMsg::SetDelegateKeys {
                orchestrator: account("orchalice").to_string(),
                ethereum_address: key.address(),
                ethereum_signature: other.sign(&digest).into(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, GravityError::SignerMismatch { .. }));

    // A signature for another validator does not transfer
    let bob = app.bond_validator("bob", 10);
    let bob_digest = delegate_key_digest(DEFAULT_BRIDGE_ID, &bob);
    let err = app
        .execute(
            &operator,
            ExecuteMsg::SetDelegateKeys {
                orchestrator: account("orchalice").to_string(),
                ethereum_address: key.address(),
                ethereum_signature: key.sign(&bob_digest).into(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, GravityError::SignerMismatch { .. }));
}

#[test]
fn test_keys_are_unique_across_validators() {
    let mut app = TestApp::new();
    let alice = app.add_validator("alice", 10);
    let bob = app.bond_validator("bob", 10);

    let err = set_keys(
        &mut app,
        &bob,
        alice.orchestrator.as_str(),
        &EthereumKey::from_seed(9),
    )
    .unwrap_err();
    assert!(matches!(err, GravityError::DelegateKeyInUse { .. }));

    let err = set_keys(&mut app, &bob, account("orchbob").as_str(), &alice.key).unwrap_err();
    assert!(matches!(err, GravityError::DelegateKeyInUse { .. }));
}

#[test]
fn test_rotation_releases_previous_keys() {
    let mut app = TestApp::new();
    let alice = app.add_validator("alice", 10);
    let new_key = EthereumKey::from_seed(3);
    set_keys(&mut app, &alice.operator, account("orchnew").as_str(), &new_key).unwrap();

    let old: Option<DelegateKeys> = app
        .query(QueryMsg::DelegateKeysByOrchestrator {
            orchestrator: alice.orchestrator.to_string(),
        })
        .unwrap();
    assert!(old.is_none());
    let old: Option<DelegateKeys> = app
        .query(QueryMsg::DelegateKeysByEthereumAddress {
            ethereum_address: alice.key.address(),
        })
        .unwrap();
    assert!(old.is_none());

    // The released keys are free for another validator
    let bob = app.bond_validator("bob", 10);
    set_keys(&mut app, &bob, alice.orchestrator.as_str(), &alice.key).unwrap();

    // The old orchestrator now acts for bob
    let keys: Option<DelegateKeys> = app
        .query(QueryMsg::DelegateKeysByOrchestrator {
            orchestrator: alice.orchestrator.to_string(),
        })
        .unwrap();
    assert_eq!(keys.unwrap().validator, bob);
}
