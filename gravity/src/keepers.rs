//! Collaborators owned by the host chain
//!
//! The bridge core never holds staking or bank state of its own. It reads and
//! mutates them through these traits, passing the store it is currently
//! working against so that collaborator writes share the bridge's overlays and
//! roll back with them.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Coin, Decimal, StdResult, Storage, Uint128};

use crate::cache::{commit, CacheStorage};
use crate::error::GravityError;

#[cw_serde]
pub enum BondStatus {
    Bonded,
    Unbonding,
    Unbonded,
}

#[cw_serde]
pub struct Validator {
    pub operator: Addr,
    /// Consensus power at the end of the last block
    pub power: u64,
    pub jailed: bool,
    pub status: BondStatus,
    /// Height at which unbonding began, 0 when never unbonded
    pub unbonding_height: u64,
}

/// Bank metadata for a native denom
#[cw_serde]
pub struct DenomMetadata {
    pub base: String,
    pub display: String,
    pub name: String,
    pub symbol: String,
    /// Exponent of the display unit
    pub decimals: u32,
}

pub trait StakingKeeper {
    /// Bonded validators ordered by power, highest first
    fn bonded_validators_by_power(&self, storage: &dyn Storage) -> StdResult<Vec<Validator>>;

    fn validator(&self, storage: &dyn Storage, operator: &Addr) -> StdResult<Option<Validator>>;

    /// Power the validator had at the end of the last block, 0 if unbonded
    fn last_validator_power(&self, storage: &dyn Storage, operator: &Addr) -> StdResult<u64>;

    fn total_bonded_power(&self, storage: &dyn Storage) -> StdResult<u64>;

    /// Validators currently in the unbonding state
    fn unbonding_validators(&self, storage: &dyn Storage) -> StdResult<Vec<Validator>>;

    /// Height from which the validator has been tracked for liveness
    fn signing_start_height(&self, storage: &dyn Storage, operator: &Addr) -> StdResult<Option<u64>>;

    fn slash(
        &self,
        storage: &mut dyn Storage,
        operator: &Addr,
        infraction_height: u64,
        power: u64,
        fraction: Decimal,
    ) -> StdResult<()>;

    fn jail(&self, storage: &mut dyn Storage, operator: &Addr) -> StdResult<()>;
}

pub trait BankKeeper {
    fn balance(&self, storage: &dyn Storage, address: &Addr, denom: &str) -> StdResult<Uint128>;

    /// Move coins from an account into the bridge module account
    fn send_to_module(
        &self,
        storage: &mut dyn Storage,
        sender: &Addr,
        coins: &[Coin],
    ) -> Result<(), GravityError>;

    /// Move coins from the bridge module account to an account
    fn send_from_module(
        &self,
        storage: &mut dyn Storage,
        recipient: &Addr,
        coins: &[Coin],
    ) -> Result<(), GravityError>;

    /// Mint into the bridge module account
    fn mint(&self, storage: &mut dyn Storage, coins: &[Coin]) -> Result<(), GravityError>;

    /// Burn from the bridge module account
    fn burn(&self, storage: &mut dyn Storage, coins: &[Coin]) -> Result<(), GravityError>;

    fn denom_metadata(&self, storage: &dyn Storage, denom: &str) -> StdResult<Option<DenomMetadata>>;
}

/// Everything a bridge operation touches
pub struct Ctx<'a> {
    pub storage: &'a mut dyn Storage,
    pub staking: &'a dyn StakingKeeper,
    pub bank: &'a dyn BankKeeper,
}

impl<'a> Ctx<'a> {
    pub fn new(
        storage: &'a mut dyn Storage,
        staking: &'a dyn StakingKeeper,
        bank: &'a dyn BankKeeper,
    ) -> Self {
        Self {
            storage,
            staking,
            bank,
        }
    }

    /// Run `f` against a copy-on-write overlay of the current store.
    ///
    /// The overlay's writes reach the store only when `f` returns `Ok`.
    pub fn branch<T, E>(&mut self, f: impl FnOnce(&mut Ctx<'_>) -> Result<T, E>) -> Result<T, E> {
        let (result, changes) = {
            let mut cache = CacheStorage::new(&*self.storage);
            let result = {
                let mut inner = Ctx {
                    storage: &mut cache,
                    staking: self.staking,
                    bank: self.bank,
                };
                f(&mut inner)
            };
            (result, cache.into_changes())
        };
        if result.is_ok() {
            commit(self.storage, changes);
        }
        result
    }
}
