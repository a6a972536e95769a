//! Test collaborators and an in-process harness.
//!
//! `MockStaking` and `MockBank` keep their state in the same store as the
//! bridge, under their own namespaces, so overlays roll their writes back
//! together with the bridge's. `TestApp` wires them to the entry points and
//! drives blocks.

use bech32::{ToBase32, Variant};
use common::{voucher_denom, EthAddress};
use cosmwasm_schema::cw_serde;
use cosmwasm_std::testing::{mock_env, MockStorage};
use cosmwasm_std::{
    from_json, Addr, Coin, Decimal, Env, MessageInfo, Order, Response, StdError, StdResult, Storage,
    Uint128,
};
use cw_storage_plus::{Item, Map};
use k256::ecdsa::SigningKey;
use serde::de::DeserializeOwned;

use crate::contract::{end_blocker, execute, init_genesis, query, sudo};
use crate::error::GravityError;
use crate::ethereum_event::EthereumEvent;
use crate::execute::delegate_key_digest;
use crate::hash::{hex_to_bytes32, keccak256};
use crate::keepers::{BankKeeper, BondStatus, Ctx, DenomMetadata, StakingKeeper, Validator};
use crate::msg::{CheckpointResponse, ExecuteMsg, GenesisState, QueryMsg, SudoMsg};
use crate::params::Params;
use crate::signature::{ethereum_address, ethereum_signed_message_hash};
use crate::state::OutgoingArtifact;

/// Account holding escrowed and minted coins
pub const MODULE_ACCOUNT: &str = "gravity_module";

/// Token contract used by the fixtures
pub const TEST_TOKEN: EthAddress = EthAddress::new([0xaa; 20]);

// ============================================================================
// Ethereum Keys
// ============================================================================

/// A secp256k1 key that signs like an Ethereum wallet
#[derive(Clone)]
pub struct EthereumKey(SigningKey);

impl EthereumKey {
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&(seed + 1).to_be_bytes());
        Self(SigningKey::from_slice(&bytes).expect("non-zero scalar below the curve order"))
    }

    pub fn from_name(name: &str) -> Self {
        let digest = keccak256(name.as_bytes());
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&digest[..8]);
        Self::from_seed(u64::from_be_bytes(seed) >> 1)
    }

    pub fn address(&self) -> EthAddress {
        ethereum_address(self.0.verifying_key())
    }

    /// `eth_sign` over a 32-byte hash: 65 bytes, `v` in {27, 28}
    pub fn sign(&self, hash: &[u8; 32]) -> Vec<u8> {
        let digest = ethereum_signed_message_hash(hash);
        let (signature, recovery_id) = self
            .0
            .sign_prehash_recoverable(&digest)
            .expect("signing a 32-byte prehash");
        let mut out = signature.to_bytes().to_vec();
        out.push(recovery_id.to_byte() + 27);
        out
    }
}

// ============================================================================
// Mock Staking
// ============================================================================

#[cw_serde]
pub struct SlashRecord {
    pub operator: Addr,
    pub infraction_height: u64,
    pub power: u64,
    pub fraction: Decimal,
}

const VALIDATORS: Map<&Addr, Validator> = Map::new("mock_staking_validators");
const SIGNING_START: Map<&Addr, u64> = Map::new("mock_staking_signing_start");
const SLASHES: Item<Vec<SlashRecord>> = Item::new("mock_staking_slashes");

pub struct MockStaking;

impl MockStaking {
    pub fn set_validator(storage: &mut dyn Storage, validator: &Validator) -> StdResult<()> {
        VALIDATORS.save(storage, &validator.operator, validator)
    }

    pub fn set_signing_start_height(
        storage: &mut dyn Storage,
        operator: &Addr,
        height: u64,
    ) -> StdResult<()> {
        SIGNING_START.save(storage, operator, &height)
    }

    pub fn begin_unbonding(storage: &mut dyn Storage, operator: &Addr, height: u64) -> StdResult<()> {
        VALIDATORS.update(storage, operator, |validator| -> StdResult<Validator> {
            let mut validator =
                validator.ok_or_else(|| StdError::not_found(format!("validator {operator}")))?;
            validator.status = BondStatus::Unbonding;
            validator.unbonding_height = height;
            Ok(validator)
        })?;
        Ok(())
    }

    pub fn slashes(storage: &dyn Storage) -> StdResult<Vec<SlashRecord>> {
        Ok(SLASHES.may_load(storage)?.unwrap_or_default())
    }

    fn all(storage: &dyn Storage) -> StdResult<Vec<Validator>> {
        VALIDATORS
            .range(storage, None, None, Order::Ascending)
            .map(|item| item.map(|(_, v)| v))
            .collect()
    }
}

fn is_bonded(validator: &Validator) -> bool {
    validator.status == BondStatus::Bonded && !validator.jailed
}

impl StakingKeeper for MockStaking {
    fn bonded_validators_by_power(&self, storage: &dyn Storage) -> StdResult<Vec<Validator>> {
        let mut bonded: Vec<Validator> = Self::all(storage)?.into_iter().filter(is_bonded).collect();
        bonded.sort_by(|a, b| b.power.cmp(&a.power).then_with(|| a.operator.cmp(&b.operator)));
        Ok(bonded)
    }

    fn validator(&self, storage: &dyn Storage, operator: &Addr) -> StdResult<Option<Validator>> {
        VALIDATORS.may_load(storage, operator)
    }

    fn last_validator_power(&self, storage: &dyn Storage, operator: &Addr) -> StdResult<u64> {
        Ok(VALIDATORS
            .may_load(storage, operator)?
            .filter(is_bonded)
            .map_or(0, |v| v.power))
    }

    fn total_bonded_power(&self, storage: &dyn Storage) -> StdResult<u64> {
        Ok(Self::all(storage)?
            .iter()
            .filter(|v| is_bonded(v))
            .map(|v| v.power)
            .sum())
    }

    fn unbonding_validators(&self, storage: &dyn Storage) -> StdResult<Vec<Validator>> {
        Ok(Self::all(storage)?
            .into_iter()
            .filter(|v| v.status == BondStatus::Unbonding)
            .collect())
    }

    fn signing_start_height(&self, storage: &dyn Storage, operator: &Addr) -> StdResult<Option<u64>> {
        SIGNING_START.may_load(storage, operator)
    }

    fn slash(
        &self,
        storage: &mut dyn Storage,
        operator: &Addr,
        infraction_height: u64,
        power: u64,
        fraction: Decimal,
    ) -> StdResult<()> {
        let mut slashes = Self::slashes(storage)?;
        slashes.push(SlashRecord {
            operator: operator.clone(),
            infraction_height,
            power,
            fraction,
        });
        SLASHES.save(storage, &slashes)?;

        if let Some(mut validator) = VALIDATORS.may_load(storage, operator)? {
            let burned = (Uint128::from(validator.power) * fraction).u128() as u64;
            validator.power -= burned;
            VALIDATORS.save(storage, operator, &validator)?;
        }
        Ok(())
    }

    fn jail(&self, storage: &mut dyn Storage, operator: &Addr) -> StdResult<()> {
        if let Some(mut validator) = VALIDATORS.may_load(storage, operator)? {
            validator.jailed = true;
            VALIDATORS.save(storage, operator, &validator)?;
        }
        Ok(())
    }
}

// ============================================================================
// Mock Bank
// ============================================================================

const BALANCES: Map<(&Addr, &str), Uint128> = Map::new("mock_bank_balances");
const METADATA: Map<&str, DenomMetadata> = Map::new("mock_bank_metadata");

pub struct MockBank;

impl MockBank {
    pub fn set_metadata(storage: &mut dyn Storage, metadata: &DenomMetadata) -> StdResult<()> {
        METADATA.save(storage, &metadata.base, metadata)
    }

    pub fn add(storage: &mut dyn Storage, address: &Addr, coin: &Coin) -> StdResult<()> {
        BALANCES.update(storage, (address, &coin.denom), |balance| -> StdResult<Uint128> {
            Ok(balance.unwrap_or_default().checked_add(coin.amount)?)
        })?;
        Ok(())
    }

    fn sub(storage: &mut dyn Storage, address: &Addr, coin: &Coin) -> Result<(), GravityError> {
        let available = BALANCES
            .may_load(storage, (address, &coin.denom))?
            .unwrap_or_default();
        if available < coin.amount {
            return Err(GravityError::InsufficientFunds {
                denom: coin.denom.clone(),
                available,
                required: coin.amount,
            });
        }
        BALANCES.save(storage, (address, &coin.denom), &(available - coin.amount))?;
        Ok(())
    }
}

impl BankKeeper for MockBank {
    fn balance(&self, storage: &dyn Storage, address: &Addr, denom: &str) -> StdResult<Uint128> {
        Ok(BALANCES.may_load(storage, (address, denom))?.unwrap_or_default())
    }

    fn send_to_module(
        &self,
        storage: &mut dyn Storage,
        sender: &Addr,
        coins: &[Coin],
    ) -> Result<(), GravityError> {
        let module = Addr::unchecked(MODULE_ACCOUNT);
        for coin in coins {
            Self::sub(storage, sender, coin)?;
            Self::add(storage, &module, coin)?;
        }
        Ok(())
    }

    fn send_from_module(
        &self,
        storage: &mut dyn Storage,
        recipient: &Addr,
        coins: &[Coin],
    ) -> Result<(), GravityError> {
        let module = Addr::unchecked(MODULE_ACCOUNT);
        for coin in coins {
            Self::sub(storage, &module, coin)?;
            Self::add(storage, recipient, coin)?;
        }
        Ok(())
    }

    fn mint(&self, storage: &mut dyn Storage, coins: &[Coin]) -> Result<(), GravityError> {
        let module = Addr::unchecked(MODULE_ACCOUNT);
        for coin in coins {
            Self::add(storage, &module, coin)?;
        }
        Ok(())
    }

    fn burn(&self, storage: &mut dyn Storage, coins: &[Coin]) -> Result<(), GravityError> {
        let module = Addr::unchecked(MODULE_ACCOUNT);
        for coin in coins {
            Self::sub(storage, &module, coin)?;
        }
        Ok(())
    }

    fn denom_metadata(&self, storage: &dyn Storage, denom: &str) -> StdResult<Option<DenomMetadata>> {
        METADATA.may_load(storage, denom)
    }
}

// ============================================================================
// Harness
// ============================================================================

/// A validator with registered delegate keys
#[derive(Clone)]
pub struct TestValidator {
    pub operator: Addr,
    pub orchestrator: Addr,
    pub key: EthereumKey,
}

pub struct TestApp {
    pub storage: MockStorage,
    pub staking: MockStaking,
    pub bank: MockBank,
    pub env: Env,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_params(Params::default())
    }

    pub fn with_params(params: Params) -> Self {
        Self::with_genesis(GenesisState {
            params,
            ..GenesisState::default()
        })
    }

    pub fn with_genesis(genesis: GenesisState) -> Self {
        let mut app = Self {
            storage: MockStorage::new(),
            staking: MockStaking,
            bank: MockBank,
            env: mock_env(),
        };
        init_genesis(&mut app.ctx(), genesis).expect("valid genesis");
        app
    }

    pub fn ctx(&mut self) -> Ctx<'_> {
        Ctx::new(&mut self.storage, &self.staking, &self.bank)
    }

    pub fn execute(&mut self, sender: &Addr, msg: ExecuteMsg) -> Result<Response, GravityError> {
        let env = self.env.clone();
        let info = MessageInfo {
            sender: sender.clone(),
            funds: vec![],
        };
        execute(&mut self.ctx(), env, info, msg)
    }

    pub fn sudo(&mut self, msg: SudoMsg) -> Result<Response, GravityError> {
        let env = self.env.clone();
        sudo(&mut self.ctx(), env, msg)
    }

    /// Run the end blocker for the current block, then move to the next one
    pub fn end_block(&mut self) -> Result<Response, GravityError> {
        let env = self.env.clone();
        let response = end_blocker(&mut self.ctx(), env);
        self.next_block();
        response
    }

    pub fn next_block(&mut self) {
        self.env.block.height += 1;
        self.env.block.time = self.env.block.time.plus_seconds(5);
    }

    pub fn query<T: DeserializeOwned>(&self, msg: QueryMsg) -> StdResult<T> {
        from_json(query(&self.storage, self.env.clone(), msg)?)
    }

    pub fn fund(&mut self, address: &Addr, coin: Coin) {
        MockBank::add(&mut self.storage, address, &coin).expect("fund account");
    }

    pub fn balance(&self, address: &Addr, denom: &str) -> Uint128 {
        self.bank
            .balance(&self.storage, address, denom)
            .expect("read balance")
    }

    /// Bond a validator at the current height without delegate keys
    pub fn bond_validator(&mut self, name: &str, power: u64) -> Addr {
        let operator = Addr::unchecked(format!("cosmosvaloper1{name}"));
        let height = self.env.block.height;
        MockStaking::set_validator(
            &mut self.storage,
            &Validator {
                operator: operator.clone(),
                power,
                jailed: false,
                status: BondStatus::Bonded,
                unbonding_height: 0,
            },
        )
        .expect("store validator");
        MockStaking::set_signing_start_height(&mut self.storage, &operator, height)
            .expect("store signing info");
        operator
    }

    /// Bond a validator and register its orchestrator and Ethereum key.
    /// `name` must be lowercase letters only.
    pub fn add_validator(&mut self, name: &str, power: u64) -> TestValidator {
        let operator = self.bond_validator(name, power);
        let validator = TestValidator {
            orchestrator: account(&format!("orch{name}")),
            key: EthereumKey::from_name(name),
            operator,
        };
        let params: Params = self.query(QueryMsg::Params {}).expect("params");
        let digest = delegate_key_digest(&params.bridge_id, &validator.operator);
        self.execute(
            &validator.operator,
            ExecuteMsg::SetDelegateKeys {
                orchestrator: validator.orchestrator.to_string(),
                ethereum_address: validator.key.address(),
                ethereum_signature: validator.key.sign(&digest).into(),
            },
        )
        .expect("register delegate keys");
        validator
    }

    pub fn set_power(&mut self, operator: &Addr, power: u64) {
        let mut validator = VALIDATORS
            .load(&self.storage, operator)
            .expect("known validator");
        validator.power = power;
        MockStaking::set_validator(&mut self.storage, &validator).expect("store validator");
    }

    pub fn validator(&self, operator: &Addr) -> Validator {
        VALIDATORS.load(&self.storage, operator).expect("known validator")
    }

    /// Submit an event claim through the validator's orchestrator
    pub fn claim(
        &mut self,
        validator: &TestValidator,
        event: EthereumEvent,
    ) -> Result<Response, GravityError> {
        self.execute(
            &validator.orchestrator,
            ExecuteMsg::SubmitEthereumEvent { event },
        )
    }

    /// Sign an artifact's checkpoint with the validator's Ethereum key and
    /// submit it
    pub fn confirm(
        &mut self,
        validator: &TestValidator,
        artifact: OutgoingArtifact,
    ) -> Result<Response, GravityError> {
        let checkpoint: CheckpointResponse = self.query(QueryMsg::Checkpoint {
            artifact: artifact.clone(),
        })?;
        let checkpoint = hex_to_bytes32(&checkpoint.checkpoint)
            .map_err(StdError::generic_err)?;
        self.execute(
            &validator.orchestrator,
            ExecuteMsg::SubmitConfirmation {
                artifact,
                signature: validator.key.sign(&checkpoint).into(),
            },
        )
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// A bech32 `cosmos` account derived from `name`
pub fn account(name: &str) -> Addr {
    let digest = keccak256(name.as_bytes());
    let address = bech32::encode("cosmos", (&digest[..20]).to_base32(), Variant::Bech32)
        .expect("valid human readable part");
    Addr::unchecked(address)
}

/// Receiver of [`deposit_event`]
pub fn receiver() -> Addr {
    account("receiver")
}

/// A deposit of `amount` of [`TEST_TOKEN`] to [`receiver`]
pub fn deposit_event(nonce: u64, amount: u128) -> EthereumEvent {
    EthereumEvent::SendToCosmos {
        event_nonce: nonce,
        ethereum_height: 100 + nonce,
        token_contract: TEST_TOKEN,
        amount: Uint128::new(amount),
        ethereum_sender: EthAddress::new([0x22; 20]),
        cosmos_receiver: receiver().to_string(),
    }
}

/// Voucher denom of [`TEST_TOKEN`]
pub fn test_voucher() -> String {
    voucher_denom(&TEST_TOKEN)
}
