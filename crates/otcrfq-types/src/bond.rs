//! # Bond: collateral held against one (RFQ, participant) pair
//!
//! ```text
//!   ┌────────┐  performed    ┌──────────┐
//!   │ LOCKED ├──────────────▶│ RELEASED │
//!   └───┬────┘               └──────────┘
//!       │ failed to perform
//!       ▼
//!   ┌─────────┐
//!   │ SLASHED │
//!   └─────────┘
//! ```
//!
//! A bond changes status at most once. Re-locking after release is not
//! possible: the (RFQ, participant) slot stays occupied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ParticipantId, Result, RfqError, RfqId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BondStatus {
    Locked,
    Released,
    Slashed,
}

impl BondStatus {
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!((self, target), (Self::Locked, Self::Released | Self::Slashed))
    }
}

impl std::fmt::Display for BondStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Locked => write!(f, "LOCKED"),
            Self::Released => write!(f, "RELEASED"),
            Self::Slashed => write!(f, "SLASHED"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bond {
    pub rfq_id: RfqId,
    pub owner: ParticipantId,
    pub asset: String,
    pub amount: u64,
    pub status: BondStatus,
    pub locked_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Bond {
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.status == BondStatus::Locked
    }

    /// # Errors
    /// Returns `NotLocked` if the bond was already resolved.
    pub fn mark_released(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.resolve(BondStatus::Released, at)
    }

    /// # Errors
    /// Returns `NotLocked` if the bond was already resolved.
    pub fn mark_slashed(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.resolve(BondStatus::Slashed, at)
    }

    fn resolve(&mut self, to: BondStatus, at: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(RfqError::NotLocked {
                participant: self.owner,
            });
        }
        self.status = to;
        self.resolved_at = Some(at);
        Ok(())
    }
}

/// Per-RFQ bond sums, used to check conservation at terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BondTotals {
    pub locked: u128,
    pub released: u128,
    pub slashed: u128,
}

impl BondTotals {
    /// Collateral still held.
    #[must_use]
    pub fn outstanding(&self) -> u128 {
        self.locked
            .saturating_sub(self.released)
            .saturating_sub(self.slashed)
    }

    /// released + slashed == locked.
    #[must_use]
    pub fn is_conserved(&self) -> bool {
        self.released + self.slashed == self.locked
    }
}
