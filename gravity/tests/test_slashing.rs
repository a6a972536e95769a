//! Slashing Tests
//!
//! Validators that leave a signer set or batch unconfirmed past its signing
//! window are slashed once and jailed.

use common::EthAddress;
use cosmwasm_std::{coin, Decimal};

use gravity::msg::{ExecuteMsg, SudoMsg};
use gravity::params::Params;
use gravity::state::OutgoingArtifact;
use gravity::testing::{
    deposit_event, receiver, test_voucher, MockStaking, SlashRecord, TestApp, TestValidator, TEST_TOKEN,
};

const WINDOW: u64 = 10;

// ============================================================================
// Test Setup
// ============================================================================

struct TestEnv {
    app: TestApp,
    alice: TestValidator,
    bob: TestValidator,
    carol: TestValidator,
    /// Height of signer set 1
    set_height: u64,
}

/// Three validators at 50/30/20 bonded one block before signer set 1, so all
/// of them are accountable for it
fn setup() -> TestEnv {
    let mut app = TestApp::with_params(Params {
        signed_signer_set_window: WINDOW,
        signed_batch_window: WINDOW,
        unbond_slashing_window: WINDOW,
        ..Params::default()
    });
    let alice = app.add_validator("alice", 50);
    let bob = app.add_validator("bob", 30);
    let carol = app.add_validator("carol", 20);
    app.next_block();
    let set_height = app.env.block.height;
    app.end_block().unwrap();
    TestEnv {
        app,
        alice,
        bob,
        carol,
        set_height,
    }
}

fn slashes(app: &TestApp) -> Vec<SlashRecord> {
    MockStaking::slashes(&app.storage).unwrap()
}

/// Run end blockers up to and including the first block past
/// `height + WINDOW`
fn run_past_window(app: &mut TestApp, height: u64) {
    while app.env.block.height <= height + WINDOW + 1 {
        app.end_block().unwrap();
    }
}

fn signer_set(nonce: u64) -> OutgoingArtifact {
    OutgoingArtifact::SignerSet { nonce }
}

// ============================================================================
// Signer Set Slashing Tests
// ============================================================================

#[test]
fn test_missing_signer_set_confirmation_is_slashed_and_jailed() {
    let mut env = setup();
    env.app.confirm(&env.alice, signer_set(1)).unwrap();
    env.app.confirm(&env.bob, signer_set(1)).unwrap();

    run_past_window(&mut env.app, env.set_height - 1);
    assert!(slashes(&env.app).is_empty());
    env.app.end_block().unwrap();

    let slashes = slashes(&env.app);
    assert_eq!(
        slashes,
        vec![SlashRecord {
            operator: env.carol.operator.clone(),
            infraction_height: env.set_height,
            power: 20,
            fraction: Params::default().slash_fraction_signer_set,
        }]
    );
    assert!(env.app.validator(&env.carol.operator).jailed);
    assert!(!env.app.validator(&env.alice.operator).jailed);
}

#[test]
fn test_signer_set_is_evaluated_once() {
    let mut env = setup();
    env.app.confirm(&env.alice, signer_set(1)).unwrap();
    env.app.confirm(&env.bob, signer_set(1)).unwrap();
    run_past_window(&mut env.app, env.set_height);
    assert_eq!(slashes(&env.app).len(), 1);

    // Carol's jailing creates signer set 2; confirm it so later sweeps have
    // nothing to punish
    env.app.confirm(&env.alice, signer_set(2)).unwrap();
    env.app.confirm(&env.bob, signer_set(2)).unwrap();
    for _ in 0..2 * WINDOW {
        env.app.end_block().unwrap();
    }
    assert_eq!(slashes(&env.app).len(), 1);
}

#[test]
fn test_validator_bonded_after_signer_set_is_exempt() {
    let mut env = setup();
    // Dave's liveness tracking starts no earlier than signer set 1
    let dave = env.app.add_validator("dave", 1);
    MockStaking::set_signing_start_height(&mut env.app.storage, &dave.operator, env.set_height)
        .unwrap();
    for v in [&env.alice, &env.bob, &env.carol] {
        env.app.confirm(v, signer_set(1)).unwrap();
    }

    run_past_window(&mut env.app, env.set_height);
    assert!(slashes(&env.app).is_empty());
    assert!(!env.app.validator(&dave.operator).jailed);
}

#[test]
fn test_recently_unbonding_validator_is_still_slashed() {
    let mut env = setup();
    env.app.confirm(&env.alice, signer_set(1)).unwrap();
    env.app.confirm(&env.bob, signer_set(1)).unwrap();

    let height = env.app.env.block.height;
    MockStaking::begin_unbonding(&mut env.app.storage, &env.carol.operator, height).unwrap();
    env.app
        .sudo(SudoMsg::AfterValidatorBeginUnbonding {
            operator: env.carol.operator.clone(),
        })
        .unwrap();

    run_past_window(&mut env.app, env.set_height);
    let slashes = slashes(&env.app);
    assert_eq!(slashes.len(), 1);
    assert_eq!(slashes[0].operator, env.carol.operator);
}

#[test]
fn test_long_unbonded_validator_is_not_slashed() {
    let mut env = setup();
    env.app.confirm(&env.alice, signer_set(1)).unwrap();
    env.app.confirm(&env.bob, signer_set(1)).unwrap();

    // Unbonding began so long before the set that the window has closed
    MockStaking::begin_unbonding(
        &mut env.app.storage,
        &env.carol.operator,
        env.set_height - WINDOW,
    )
    .unwrap();

    run_past_window(&mut env.app, env.set_height);
    assert!(slashes(&env.app).is_empty());
}

// ============================================================================
// Batch Slashing Tests
// ============================================================================

#[test]
fn test_missing_batch_confirmation_is_slashed() {
    let mut env = setup();
    for v in [&env.alice, &env.bob, &env.carol] {
        env.app.confirm(v, signer_set(1)).unwrap();
    }
    env.app.claim(&env.alice, deposit_event(1, 1_000)).unwrap();
    env.app.claim(&env.bob, deposit_event(1, 1_000)).unwrap();
    env.app.end_block().unwrap();

    let user = receiver();
    env.app
        .execute(
            &user,
            ExecuteMsg::SendToEthereum {
                ethereum_recipient: EthAddress::new([0x33; 20]),
                amount: coin(100, test_voucher()),
                bridge_fee: coin(5, test_voucher()),
            },
        )
        .unwrap();
    env.app
        .execute(
            &user,
            ExecuteMsg::RequestBatch {
                token_contract: TEST_TOKEN,
            },
        )
        .unwrap();
    let batch_height = env.app.env.block.height;
    let artifact = OutgoingArtifact::Batch {
        token_contract: TEST_TOKEN,
        nonce: 1,
    };
    env.app.confirm(&env.alice, artifact.clone()).unwrap();
    env.app.confirm(&env.carol, artifact).unwrap();

    run_past_window(&mut env.app, batch_height);

    let slashes = slashes(&env.app);
    assert_eq!(slashes.len(), 1);
    assert_eq!(slashes[0].operator, env.bob.operator);
    assert_eq!(slashes[0].infraction_height, batch_height);
    assert_eq!(slashes[0].fraction, Decimal::permille(1));
    assert!(env.app.validator(&env.bob.operator).jailed);
}
