//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ParticipantId, Result, RfqError, constants};

/// Configuration for one engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Asset bonds are posted in and taker fees are paid in.
    pub collateral_asset: String,
    /// Account credited with slashed bonds and the protocol share of fees.
    pub treasury: ParticipantId,
    /// Facilitator share of the taker fee, in basis points.
    pub facilitator_fee_bps: u16,
    /// Ed25519 public key of the liquidity guard. When set, every
    /// commitment must carry the guard's signature over its hash.
    pub liquidity_guard_key: Option<[u8; 32]>,
    /// Maximum commitments accepted per RFQ.
    pub max_commits_per_rfq: usize,
    /// Shortest accepted phase TTL.
    pub min_phase_ttl: Duration,
    /// Longest accepted phase TTL.
    pub max_phase_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            collateral_asset: constants::DEFAULT_COLLATERAL_ASSET.to_string(),
            treasury: ParticipantId::treasury(),
            facilitator_fee_bps: constants::DEFAULT_FACILITATOR_FEE_BPS,
            liquidity_guard_key: None,
            max_commits_per_rfq: constants::DEFAULT_MAX_COMMITS_PER_RFQ,
            min_phase_ttl: Duration::from_secs(constants::DEFAULT_MIN_PHASE_TTL_SECS),
            max_phase_ttl: Duration::from_secs(constants::DEFAULT_MAX_PHASE_TTL_SECS),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject inconsistent settings.
    pub fn validate(&self) -> Result<()> {
        if self.collateral_asset.trim().is_empty() {
            return Err(RfqError::Configuration(
                "collateral_asset must not be empty".into(),
            ));
        }
        if u64::from(self.facilitator_fee_bps) > constants::BPS_DENOMINATOR {
            return Err(RfqError::Configuration(format!(
                "facilitator_fee_bps {} exceeds {}",
                self.facilitator_fee_bps,
                constants::BPS_DENOMINATOR
            )));
        }
        if self.max_commits_per_rfq == 0 {
            return Err(RfqError::Configuration(
                "max_commits_per_rfq must be > 0".into(),
            ));
        }
        if self.min_phase_ttl.is_zero() || self.min_phase_ttl > self.max_phase_ttl {
            return Err(RfqError::Configuration(format!(
                "phase TTL bounds invalid: min {:?}, max {:?}",
                self.min_phase_ttl, self.max_phase_ttl
            )));
        }
        Ok(())
    }

    /// Facilitator share of `fee`, rounded down.
    pub fn facilitator_share(&self, fee: u64) -> Result<u64> {
        let share = u128::from(fee) * u128::from(self.facilitator_fee_bps)
            / u128::from(constants::BPS_DENOMINATOR);
        u64::try_from(share).map_err(|_| RfqError::ArithmeticOverflow)
    }
}
