//! Supply conservation invariant checker.
//!
//! Mathematical invariant enforced after every balance-moving operation:
//! ```text
//! ∀ asset: Σ(available + frozen) == Σ(deposits) - Σ(withdrawals)
//! ```
//!
//! The sum includes the treasury and every facilitator. Bonds, swaps,
//! fees and slashes only move value between accounts; only deposits and
//! withdrawals change supply.

use std::collections::{BTreeSet, HashMap};

use otcrfq_escrow::BalanceManager;
use otcrfq_types::{Asset, Result, RfqError};

/// Tracks per-asset external flows and validates conservation.
pub struct SupplyConservation {
    /// Total deposits per asset since genesis.
    deposits: HashMap<Asset, u128>,
    /// Total withdrawals per asset since genesis.
    withdrawals: HashMap<Asset, u128>,
}

impl SupplyConservation {
    /// Create a new supply conservation tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            deposits: HashMap::new(),
            withdrawals: HashMap::new(),
        }
    }

    /// Record a deposit.
    pub fn record_deposit(&mut self, asset: &str, amount: u64) {
        *self.deposits.entry(asset.to_string()).or_insert(0) += u128::from(amount);
    }

    /// Record a withdrawal.
    pub fn record_withdrawal(&mut self, asset: &str, amount: u64) {
        *self.withdrawals.entry(asset.to_string()).or_insert(0) += u128::from(amount);
    }

    /// Total deposits for an asset.
    #[must_use]
    pub fn total_deposits(&self, asset: &str) -> u128 {
        self.deposits.get(asset).copied().unwrap_or(0)
    }

    /// Total withdrawals for an asset.
    #[must_use]
    pub fn total_withdrawals(&self, asset: &str) -> u128 {
        self.withdrawals.get(asset).copied().unwrap_or(0)
    }

    /// Expected total supply for an asset: deposits - withdrawals.
    ///
    /// Withdrawals are bounded by balances, so this never goes negative
    /// unless the invariant is already broken; it saturates at zero then.
    #[must_use]
    pub fn expected_supply(&self, asset: &str) -> u128 {
        self.total_deposits(asset)
            .saturating_sub(self.total_withdrawals(asset))
    }

    /// Verify that the actual supply matches the expected supply for `asset`.
    ///
    /// # Errors
    /// Returns [`RfqError::SupplyInvariantViolation`] if actual ≠ expected.
    pub fn verify(&self, asset: &str, actual_supply: u128) -> Result<()> {
        let expected = self.expected_supply(asset);
        if actual_supply != expected {
            tracing::error!(
                asset,
                actual = %actual_supply,
                expected = %expected,
                "supply conservation violated"
            );
            return Err(RfqError::SupplyInvariantViolation {
                reason: format!(
                    "Asset {asset}: actual supply {actual_supply} != expected {expected} \
                     (deposits={}, withdrawals={})",
                    self.total_deposits(asset),
                    self.total_withdrawals(asset),
                ),
            });
        }
        Ok(())
    }

    /// Verify every asset known to either side.
    ///
    /// # Errors
    /// Returns the first [`RfqError::SupplyInvariantViolation`] found.
    pub fn verify_balances(&self, balances: &BalanceManager) -> Result<()> {
        for asset in self.tracked_assets_with(balances) {
            self.verify(&asset, balances.total_supply(&asset))?;
        }
        Ok(())
    }

    /// All assets with recorded flows, sorted.
    #[must_use]
    pub fn tracked_assets(&self) -> Vec<Asset> {
        self.deposits
            .keys()
            .chain(self.withdrawals.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn tracked_assets_with(&self, balances: &BalanceManager) -> BTreeSet<Asset> {
        let mut assets: BTreeSet<Asset> = self.tracked_assets().into_iter().collect();
        assets.extend(balances.assets());
        assets
    }
}

impl Default for SupplyConservation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use otcrfq_types::ParticipantId;

    use super::*;

    #[test]
    fn empty_supply_is_zero() {
        let sc = SupplyConservation::new();
        assert_eq!(sc.expected_supply("wSOL"), 0);
        assert!(sc.verify("wSOL", 0).is_ok());
    }

    #[test]
    fn deposits_and_withdrawals_move_expected() {
        let mut sc = SupplyConservation::new();
        sc.record_deposit("USDC", 1_000);
        sc.record_deposit("USDC", 500);
        sc.record_withdrawal("USDC", 300);
        assert_eq!(sc.expected_supply("USDC"), 1_200);
        assert_eq!(sc.total_deposits("USDC"), 1_500);
        assert_eq!(sc.total_withdrawals("USDC"), 300);
    }

    #[test]
    fn verify_fails_when_imbalanced() {
        let mut sc = SupplyConservation::new();
        sc.record_deposit("wSOL", 10);
        let err = sc.verify("wSOL", 11).unwrap_err();
        assert!(matches!(err, RfqError::SupplyInvariantViolation { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn transfers_between_accounts_keep_supply() {
        let mut sc = SupplyConservation::new();
        let mut bm = BalanceManager::new();
        let a = ParticipantId::new();
        let b = ParticipantId::new();
        bm.deposit(a, "USDC", 1_000).unwrap();
        sc.record_deposit("USDC", 1_000);

        bm.freeze(a, "USDC", 400).unwrap();
        bm.transfer_frozen(a, b, "USDC", 400).unwrap();
        sc.verify_balances(&bm).unwrap();
    }

    #[test]
    fn untracked_balance_is_detected() {
        let sc = SupplyConservation::new();
        let mut bm = BalanceManager::new();
        // Balance created without a recorded deposit.
        bm.credit(ParticipantId::new(), "wSOL", 5).unwrap();
        assert!(sc.verify_balances(&bm).is_err());
    }

    #[test]
    fn tracked_assets_sorted() {
        let mut sc = SupplyConservation::new();
        sc.record_deposit("wSOL", 1);
        sc.record_withdrawal("USDC", 0);
        sc.record_deposit("USDC", 1);
        assert_eq!(sc.tracked_assets(), vec!["USDC".to_string(), "wSOL".to_string()]);
    }
}
