//! Balance management for custody.
//!
//! Tracks per-(participant, asset) balances with available/frozen
//! accounting. All mutations are atomic: either the full operation succeeds
//! or the balance is unchanged.

use std::collections::{BTreeSet, HashMap};

use otcrfq_types::{Asset, BalanceEntry, ParticipantId, Result, RfqError};

/// Manages participant balances with available/frozen accounting.
///
/// The BalanceManager is the source of truth for all balance state.
/// The BondLedger and the settlement coordinator call into it to freeze,
/// unfreeze and move funds.
pub struct BalanceManager {
    /// Per-(participant, asset) balances.
    balances: HashMap<(ParticipantId, Asset), BalanceEntry>,
}

impl BalanceManager {
    /// Create a new empty balance manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            balances: HashMap::new(),
        }
    }

    /// Deposit funds (increases available balance).
    ///
    /// # Errors
    /// Returns `ArithmeticOverflow` if the balance would exceed `u64::MAX`.
    pub fn deposit(&mut self, who: ParticipantId, asset: &str, amount: u64) -> Result<()> {
        self.credit(who, asset, amount)
    }

    /// Withdraw funds (decreases available balance).
    ///
    /// # Errors
    /// Returns `InsufficientFunds` if available < amount.
    pub fn withdraw(&mut self, who: ParticipantId, asset: &str, amount: u64) -> Result<()> {
        let available = self.balance(who, asset).available;
        if available < amount {
            return Err(RfqError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        if let Some(entry) = self.balances.get_mut(&(who, asset.to_string())) {
            entry.available -= amount;
        }
        Ok(())
    }

    /// Freeze funds (available → frozen). Used when locking a bond or
    /// funding a settlement leg.
    ///
    /// # Errors
    /// Returns `InsufficientFunds` if available < amount.
    pub fn freeze(&mut self, who: ParticipantId, asset: &str, amount: u64) -> Result<()> {
        let entry = self.balances.get_mut(&(who, asset.to_string())).ok_or(
            RfqError::InsufficientFunds {
                needed: amount,
                available: 0,
            },
        )?;

        if entry.available < amount {
            return Err(RfqError::InsufficientFunds {
                needed: amount,
                available: entry.available,
            });
        }
        let frozen = entry
            .frozen
            .checked_add(amount)
            .ok_or(RfqError::ArithmeticOverflow)?;

        entry.available -= amount;
        entry.frozen = frozen;
        Ok(())
    }

    /// Unfreeze funds (frozen → available). Used when releasing a bond or
    /// returning a deposit.
    ///
    /// # Errors
    /// Returns `InsufficientFrozen` if frozen < amount.
    pub fn unfreeze(&mut self, who: ParticipantId, asset: &str, amount: u64) -> Result<()> {
        let entry = self
            .balances
            .get_mut(&(who, asset.to_string()))
            .ok_or(RfqError::InsufficientFrozen)?;

        if entry.frozen < amount {
            return Err(RfqError::InsufficientFrozen);
        }
        let available = entry
            .available
            .checked_add(amount)
            .ok_or(RfqError::ArithmeticOverflow)?;

        entry.frozen -= amount;
        entry.available = available;
        Ok(())
    }

    /// Consume frozen funds. Frozen balance decreases, nothing is added
    /// back to available. Always paired with a credit elsewhere.
    ///
    /// # Errors
    /// Returns `InsufficientFrozen` if frozen < amount.
    pub fn consume_frozen(&mut self, who: ParticipantId, asset: &str, amount: u64) -> Result<()> {
        let entry = self
            .balances
            .get_mut(&(who, asset.to_string()))
            .ok_or(RfqError::InsufficientFrozen)?;

        if entry.frozen < amount {
            return Err(RfqError::InsufficientFrozen);
        }

        entry.frozen -= amount;
        Ok(())
    }

    /// Credit available balance (receiving side of a transfer).
    ///
    /// # Errors
    /// Returns `ArithmeticOverflow` if the balance would exceed `u64::MAX`.
    pub fn credit(&mut self, who: ParticipantId, asset: &str, amount: u64) -> Result<()> {
        let entry = self.balances.entry((who, asset.to_string())).or_default();
        entry.available = entry
            .available
            .checked_add(amount)
            .ok_or(RfqError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Credit frozen balance directly (unclaimed rewards).
    ///
    /// # Errors
    /// Returns `ArithmeticOverflow` if the balance would exceed `u64::MAX`.
    pub fn credit_frozen(&mut self, who: ParticipantId, asset: &str, amount: u64) -> Result<()> {
        let entry = self.balances.entry((who, asset.to_string())).or_default();
        entry.frozen = entry
            .frozen
            .checked_add(amount)
            .ok_or(RfqError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Move `amount` from `from`'s frozen balance to `to`'s available
    /// balance. Both sides are checked before either is touched.
    ///
    /// # Errors
    /// - `InsufficientFrozen` if `from` has frozen < amount
    /// - `ArithmeticOverflow` if `to` cannot absorb the credit
    pub fn transfer_frozen(
        &mut self,
        from: ParticipantId,
        to: ParticipantId,
        asset: &str,
        amount: u64,
    ) -> Result<()> {
        if self.balance(from, asset).frozen < amount {
            return Err(RfqError::InsufficientFrozen);
        }
        if from != to && self.balance(to, asset).available.checked_add(amount).is_none() {
            return Err(RfqError::ArithmeticOverflow);
        }
        self.consume_frozen(from, asset, amount)?;
        self.credit(to, asset, amount)
    }

    /// Get the balance for a (participant, asset) pair.
    #[must_use]
    pub fn balance(&self, who: ParticipantId, asset: &str) -> BalanceEntry {
        self.balances
            .get(&(who, asset.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// Total supply of an asset (sum of all participants' available + frozen).
    #[must_use]
    pub fn total_supply(&self, asset: &str) -> u128 {
        self.balances
            .iter()
            .filter(|((_, a), _)| a == asset)
            .map(|(_, entry)| entry.total())
            .sum()
    }

    /// Every asset that has ever had a balance entry, sorted.
    #[must_use]
    pub fn assets(&self) -> Vec<Asset> {
        self.balances
            .keys()
            .map(|(_, asset)| asset.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl Default for BalanceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_increases_available() {
        let mut bm = BalanceManager::new();
        let who = ParticipantId::new();
        bm.deposit(who, "USDC", 1_000).unwrap();
        let bal = bm.balance(who, "USDC");
        assert_eq!(bal.available, 1_000);
        assert_eq!(bal.frozen, 0);
    }

    #[test]
    fn deposit_overflow_rejected() {
        let mut bm = BalanceManager::new();
        let who = ParticipantId::new();
        bm.deposit(who, "USDC", u64::MAX).unwrap();
        let err = bm.deposit(who, "USDC", 1).unwrap_err();
        assert!(matches!(err, RfqError::ArithmeticOverflow));
        assert_eq!(bm.balance(who, "USDC").available, u64::MAX);
    }

    #[test]
    fn withdraw_reduces_available() {
        let mut bm = BalanceManager::new();
        let who = ParticipantId::new();
        bm.deposit(who, "USDC", 1_000).unwrap();
        bm.withdraw(who, "USDC", 400).unwrap();
        assert_eq!(bm.balance(who, "USDC").available, 600);

        let err = bm.withdraw(who, "USDC", 601).unwrap_err();
        assert!(matches!(
            err,
            RfqError::InsufficientFunds {
                needed: 601,
                available: 600
            }
        ));
    }

    #[test]
    fn withdraw_ignores_frozen() {
        let mut bm = BalanceManager::new();
        let who = ParticipantId::new();
        bm.deposit(who, "USDC", 1_000).unwrap();
        bm.freeze(who, "USDC", 800).unwrap();
        assert!(bm.withdraw(who, "USDC", 500).is_err());
    }

    #[test]
    fn freeze_moves_to_frozen() {
        let mut bm = BalanceManager::new();
        let who = ParticipantId::new();
        bm.deposit(who, "USDC", 1_000).unwrap();
        bm.freeze(who, "USDC", 400).unwrap();
        let bal = bm.balance(who, "USDC");
        assert_eq!(bal.available, 600);
        assert_eq!(bal.frozen, 400);
    }

    #[test]
    fn freeze_insufficient_fails() {
        let mut bm = BalanceManager::new();
        let who = ParticipantId::new();
        bm.deposit(who, "USDC", 100).unwrap();
        let err = bm.freeze(who, "USDC", 200).unwrap_err();
        assert!(matches!(err, RfqError::InsufficientFunds { .. }));
        // Balance unchanged
        assert_eq!(bm.balance(who, "USDC").available, 100);
    }

    #[test]
    fn freeze_unknown_participant_fails() {
        let mut bm = BalanceManager::new();
        let err = bm.freeze(ParticipantId::new(), "USDC", 1).unwrap_err();
        assert!(matches!(
            err,
            RfqError::InsufficientFunds {
                needed: 1,
                available: 0
            }
        ));
    }

    #[test]
    fn unfreeze_restores_available() {
        let mut bm = BalanceManager::new();
        let who = ParticipantId::new();
        bm.deposit(who, "USDC", 1_000).unwrap();
        bm.freeze(who, "USDC", 400).unwrap();
        bm.unfreeze(who, "USDC", 400).unwrap();
        let bal = bm.balance(who, "USDC");
        assert_eq!(bal.available, 1_000);
        assert_eq!(bal.frozen, 0);
        assert!(matches!(
            bm.unfreeze(who, "USDC", 1),
            Err(RfqError::InsufficientFrozen)
        ));
    }

    #[test]
    fn consume_frozen_reduces_frozen() {
        let mut bm = BalanceManager::new();
        let who = ParticipantId::new();
        bm.deposit(who, "USDC", 1_000).unwrap();
        bm.freeze(who, "USDC", 500).unwrap();
        bm.consume_frozen(who, "USDC", 500).unwrap();
        let bal = bm.balance(who, "USDC");
        assert_eq!(bal.available, 500);
        assert_eq!(bal.frozen, 0);
    }

    #[test]
    fn transfer_frozen_moves_between_participants() {
        let mut bm = BalanceManager::new();
        let from = ParticipantId::new();
        let to = ParticipantId::new();
        bm.deposit(from, "wSOL", 1_000).unwrap();
        bm.freeze(from, "wSOL", 1_000).unwrap();
        bm.transfer_frozen(from, to, "wSOL", 1_000).unwrap();
        assert!(bm.balance(from, "wSOL").is_zero());
        assert_eq!(bm.balance(to, "wSOL").available, 1_000);
        assert_eq!(bm.total_supply("wSOL"), 1_000);
    }

    #[test]
    fn transfer_frozen_checks_before_mutating() {
        let mut bm = BalanceManager::new();
        let from = ParticipantId::new();
        let to = ParticipantId::new();
        bm.deposit(from, "USDC", 10).unwrap();
        bm.freeze(from, "USDC", 10).unwrap();
        bm.deposit(to, "USDC", u64::MAX).unwrap();

        let err = bm.transfer_frozen(from, to, "USDC", 10).unwrap_err();
        assert!(matches!(err, RfqError::ArithmeticOverflow));
        assert_eq!(bm.balance(from, "USDC").frozen, 10);
    }

    #[test]
    fn credit_frozen_lands_in_frozen() {
        let mut bm = BalanceManager::new();
        let who = ParticipantId::new();
        bm.credit_frozen(who, "USDC", 20).unwrap();
        let bal = bm.balance(who, "USDC");
        assert_eq!(bal.available, 0);
        assert_eq!(bal.frozen, 20);
    }

    #[test]
    fn total_supply_sums_all_participants() {
        let mut bm = BalanceManager::new();
        let p1 = ParticipantId::new();
        let p2 = ParticipantId::new();
        bm.deposit(p1, "USDC", 1_000).unwrap();
        bm.deposit(p2, "USDC", 500).unwrap();
        bm.freeze(p1, "USDC", 300).unwrap();
        assert_eq!(bm.total_supply("USDC"), 1_500);
        assert_eq!(bm.total_supply("wSOL"), 0);
    }

    #[test]
    fn assets_are_sorted_and_unique() {
        let mut bm = BalanceManager::new();
        bm.deposit(ParticipantId::new(), "wSOL", 1).unwrap();
        bm.deposit(ParticipantId::new(), "USDC", 1).unwrap();
        bm.deposit(ParticipantId::new(), "USDC", 1).unwrap();
        assert_eq!(bm.assets(), vec!["USDC".to_string(), "wSOL".to_string()]);
    }

    #[test]
    fn nonexistent_balance_is_zero() {
        let bm = BalanceManager::new();
        assert!(bm.balance(ParticipantId::new(), "wSOL").is_zero());
    }
}
