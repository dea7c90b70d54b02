//! Balance tracking types for custody.
//!
//! Every participant has an `available` balance (withdrawable, usable for
//! new bonds and funding) and a `frozen` balance (locked bonds, funded
//! settlement legs, unclaimed rewards).

use serde::{Deserialize, Serialize};

/// A single balance entry for a (participant, asset) pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BalanceEntry {
    /// Free to withdraw, bond or fund with.
    pub available: u64,
    /// Held by custody on behalf of a live RFQ or an unclaimed reward.
    pub frozen: u64,
}

impl BalanceEntry {
    /// Total balance (available + frozen), widened so it never overflows.
    #[must_use]
    pub fn total(&self) -> u128 {
        u128::from(self.available) + u128::from(self.frozen)
    }

    /// Whether this entry has no balance at all.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.available == 0 && self.frozen == 0
    }
}

/// Type alias for asset identifiers (e.g., "wSOL", "USDC").
pub type Asset = String;
