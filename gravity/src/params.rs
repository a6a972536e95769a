//! Bridge Parameters
//!
//! Tunables for the tally, the batch builder, the signer-set trigger and the
//! slashing engine. Parameters are stored as a single item and replaced as a
//! whole; every write goes through [`Params::validate`].
//!
//! ## Windows
//!
//! | Parameter                  | Unit   | Default |
//! |----------------------------|--------|---------|
//! | `signed_signer_set_window` | blocks | 10,000  |
//! | `signed_batch_window`      | blocks | 10,000  |
//! | `unbond_slashing_window`   | blocks | 10,000  |
//! | `event_vote_window`        | blocks | 10,000  |

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Decimal, StdResult, Storage};
use cw_storage_plus::Item;

use crate::error::GravityError;

// ============================================================================
// Constants
// ============================================================================

/// Default bridge identifier, salted into every checkpoint
pub const DEFAULT_BRIDGE_ID: &str = "gravity";

/// Default vote threshold (66% of bonded power)
pub const DEFAULT_VOTE_THRESHOLD_PERCENT: u64 = 66;

/// Default signer-set power drift that triggers a new snapshot (5%)
pub const DEFAULT_SIGNER_SET_DRIFT_PERCENT: u64 = 5;

/// Default batch timeout target (12 hours, in milliseconds)
pub const DEFAULT_TARGET_BATCH_TIMEOUT_MS: u64 = 43_200_000;

/// Default average Ethereum block time (milliseconds)
pub const DEFAULT_AVERAGE_ETHEREUM_BLOCK_TIME_MS: u64 = 15_000;

/// Default number of transfers per batch
pub const DEFAULT_BATCH_MAX_SIZE: u32 = 100;

/// Default window for all block-denominated windows
pub const DEFAULT_WINDOW_BLOCKS: u64 = 10_000;

/// Default slash fraction for missed confirmations (0.1%)
pub const DEFAULT_SLASH_FRACTION_PERMILLE: u64 = 1;

// ============================================================================
// Data Structures
// ============================================================================

#[cw_serde]
pub struct Params {
    /// Salt distinguishing this bridge's checkpoints from any other deployment
    pub bridge_id: String,
    /// Fraction of bonded power an event vote record must reach
    pub vote_threshold: Decimal,
    /// Power drift from the latest signer set that triggers a new one
    pub signer_set_power_drift: Decimal,
    /// How far into the future (in Ethereum time) a batch stays valid
    pub target_batch_timeout_ms: u64,
    /// Expected Ethereum block time, used for height projection
    pub average_ethereum_block_time_ms: u64,
    /// Upper bound on transfers per batch
    pub batch_max_size: u32,
    /// Blocks validators have to confirm a signer set before being slashable
    pub signed_signer_set_window: u64,
    /// Blocks validators have to confirm a batch before being slashable
    pub signed_batch_window: u64,
    /// Blocks after unbonding starts during which a validator stays accountable
    pub unbond_slashing_window: u64,
    /// Blocks a resolved event vote record is retained
    pub event_vote_window: u64,
    pub slash_fraction_signer_set: Decimal,
    pub slash_fraction_batch: Decimal,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            bridge_id: DEFAULT_BRIDGE_ID.to_string(),
            vote_threshold: Decimal::percent(DEFAULT_VOTE_THRESHOLD_PERCENT),
            signer_set_power_drift: Decimal::percent(DEFAULT_SIGNER_SET_DRIFT_PERCENT),
            target_batch_timeout_ms: DEFAULT_TARGET_BATCH_TIMEOUT_MS,
            average_ethereum_block_time_ms: DEFAULT_AVERAGE_ETHEREUM_BLOCK_TIME_MS,
            batch_max_size: DEFAULT_BATCH_MAX_SIZE,
            signed_signer_set_window: DEFAULT_WINDOW_BLOCKS,
            signed_batch_window: DEFAULT_WINDOW_BLOCKS,
            unbond_slashing_window: DEFAULT_WINDOW_BLOCKS,
            event_vote_window: DEFAULT_WINDOW_BLOCKS,
            slash_fraction_signer_set: Decimal::permille(DEFAULT_SLASH_FRACTION_PERMILLE),
            slash_fraction_batch: Decimal::permille(DEFAULT_SLASH_FRACTION_PERMILLE),
        }
    }
}

impl Params {
    /// Validate the parameter set
    pub fn validate(&self) -> Result<(), GravityError> {
        if self.bridge_id.is_empty() || self.bridge_id.len() > 32 {
            return Err(invalid(format!(
                "bridge_id must be 1-32 bytes, got {}",
                self.bridge_id.len()
            )));
        }
        if self.vote_threshold.is_zero() || self.vote_threshold > Decimal::one() {
            return Err(invalid(format!(
                "vote_threshold {} must be in (0, 1]",
                self.vote_threshold
            )));
        }
        if self.signer_set_power_drift > Decimal::one() {
            return Err(invalid(format!(
                "signer_set_power_drift {} exceeds 1",
                self.signer_set_power_drift
            )));
        }
        if self.slash_fraction_signer_set > Decimal::one()
            || self.slash_fraction_batch > Decimal::one()
        {
            return Err(invalid("slash fractions must not exceed 1".to_string()));
        }
        if self.average_ethereum_block_time_ms == 0 {
            return Err(invalid(
                "average_ethereum_block_time_ms must be non-zero".to_string(),
            ));
        }
        if self.target_batch_timeout_ms == 0 {
            return Err(invalid("target_batch_timeout_ms must be non-zero".to_string()));
        }
        if self.batch_max_size == 0 {
            return Err(invalid("batch_max_size must be non-zero".to_string()));
        }
        if self.signed_signer_set_window == 0
            || self.signed_batch_window == 0
            || self.event_vote_window == 0
        {
            return Err(invalid("slashing and vote windows must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Batch timeout target expressed in Ethereum blocks
    pub fn target_batch_timeout_blocks(&self) -> u64 {
        self.target_batch_timeout_ms / self.average_ethereum_block_time_ms
    }
}

fn invalid(reason: String) -> GravityError {
    GravityError::InvalidParams { reason }
}

// ============================================================================
// Storage
// ============================================================================

pub const PARAMS: Item<Params> = Item::new("params");

pub fn load_params(storage: &dyn Storage) -> StdResult<Params> {
    PARAMS.load(storage)
}

/// Validate and store a new parameter set
pub fn set_params(storage: &mut dyn Storage, params: &Params) -> Result<(), GravityError> {
    params.validate()?;
    PARAMS.save(storage, params)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmwasm_std::testing::MockStorage;

    #[test]
    fn test_default_params() {
        let params = Params::default();
        assert_eq!(params.bridge_id, "gravity");
        assert_eq!(params.vote_threshold, Decimal::percent(66));
        assert_eq!(params.signer_set_power_drift, Decimal::percent(5));
        assert_eq!(params.target_batch_timeout_blocks(), 2880);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate_params() {
        let params = Params {
            bridge_id: "x".repeat(33),
            ..Params::default()
        };
        assert!(params.validate().is_err());

        let params = Params {
            vote_threshold: Decimal::zero(),
            ..Params::default()
        };
        assert!(params.validate().is_err());

        let params = Params {
            vote_threshold: Decimal::percent(101),
            ..Params::default()
        };
        assert!(params.validate().is_err());

        let params = Params {
            average_ethereum_block_time_ms: 0,
            ..Params::default()
        };
        assert!(params.validate().is_err());

        let params = Params {
            slash_fraction_batch: Decimal::percent(150),
            ..Params::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_set_params_rejects_invalid() {
        let mut storage = MockStorage::new();
        set_params(&mut storage, &Params::default()).unwrap();

        let bad = Params {
            batch_max_size: 0,
            ..Params::default()
        };
        assert!(set_params(&mut storage, &bad).is_err());
        assert_eq!(load_params(&storage).unwrap(), Params::default());
    }
}
