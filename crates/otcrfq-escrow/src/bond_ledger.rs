//! Bond ledger: locks, releases and slashes RFQ bonds.
//!
//! Locking atomically freezes collateral and records a LOCKED [`Bond`].
//! Every bond then resolves exactly once: released back to its owner's
//! available balance, or slashed into the treasury.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use otcrfq_types::{Bond, BondStatus, BondTotals, ParticipantId, Result, RfqError, RfqId};

use crate::balance_manager::BalanceManager;

/// Bond records keyed by (RFQ, owner).
pub struct BondLedger {
    bonds: HashMap<(RfqId, ParticipantId), Bond>,
    /// Receives slashed collateral.
    treasury: ParticipantId,
}

impl BondLedger {
    #[must_use]
    pub fn new(treasury: ParticipantId) -> Self {
        Self {
            bonds: HashMap::new(),
            treasury,
        }
    }

    /// Freeze `amount` of `asset` from `owner` and record the bond.
    ///
    /// If the freeze fails, no bond is recorded.
    ///
    /// # Errors
    /// - `AlreadyLocked` if a bond exists for (rfq, owner), whatever its status
    /// - `InsufficientFunds` if the owner cannot cover `amount`
    pub fn lock(
        &mut self,
        balances: &mut BalanceManager,
        rfq_id: RfqId,
        owner: ParticipantId,
        asset: &str,
        amount: u64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if self.bonds.contains_key(&(rfq_id, owner)) {
            return Err(RfqError::AlreadyLocked { participant: owner });
        }

        balances.freeze(owner, asset, amount)?;

        self.bonds.insert(
            (rfq_id, owner),
            Bond {
                rfq_id,
                owner,
                asset: asset.to_string(),
                amount,
                status: BondStatus::Locked,
                locked_at: at,
                resolved_at: None,
            },
        );
        tracing::debug!(rfq = %rfq_id, owner = %owner, amount, "bond locked");
        Ok(())
    }

    /// Return a locked bond to its owner. Returns the amount released.
    ///
    /// # Errors
    /// Returns `NotLocked` if there is no LOCKED bond for (rfq, owner).
    pub fn release(
        &mut self,
        balances: &mut BalanceManager,
        rfq_id: RfqId,
        owner: ParticipantId,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        let bond = self.locked_mut(rfq_id, owner, "release")?;
        balances.unfreeze(owner, &bond.asset, bond.amount)?;
        bond.mark_released(at)?;
        tracing::debug!(rfq = %rfq_id, owner = %owner, amount = bond.amount, "bond released");
        Ok(bond.amount)
    }

    /// Forfeit a locked bond to the treasury. Returns the amount slashed.
    ///
    /// # Errors
    /// Returns `NotLocked` if there is no LOCKED bond for (rfq, owner).
    pub fn slash(
        &mut self,
        balances: &mut BalanceManager,
        rfq_id: RfqId,
        owner: ParticipantId,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        let treasury = self.treasury;
        let bond = self.locked_mut(rfq_id, owner, "slash")?;
        balances.transfer_frozen(owner, treasury, &bond.asset, bond.amount)?;
        bond.mark_slashed(at)?;
        tracing::debug!(rfq = %rfq_id, owner = %owner, amount = bond.amount, "bond slashed");
        Ok(bond.amount)
    }

    fn locked_mut(
        &mut self,
        rfq_id: RfqId,
        owner: ParticipantId,
        action: &'static str,
    ) -> Result<&mut Bond> {
        match self.bonds.get_mut(&(rfq_id, owner)) {
            Some(bond) if bond.is_locked() => Ok(bond),
            Some(bond) => {
                tracing::error!(
                    rfq = %rfq_id,
                    owner = %owner,
                    status = %bond.status,
                    action,
                    "bond already resolved"
                );
                Err(RfqError::NotLocked { participant: owner })
            }
            None => {
                tracing::error!(rfq = %rfq_id, owner = %owner, action, "no bond to resolve");
                Err(RfqError::NotLocked { participant: owner })
            }
        }
    }

    /// Look up the bond for (rfq, owner).
    #[must_use]
    pub fn get(&self, rfq_id: RfqId, owner: ParticipantId) -> Option<&Bond> {
        self.bonds.get(&(rfq_id, owner))
    }

    #[must_use]
    pub fn is_locked(&self, rfq_id: RfqId, owner: ParticipantId) -> bool {
        self.get(rfq_id, owner).is_some_and(Bond::is_locked)
    }

    /// All bonds of one RFQ, oldest lock first.
    #[must_use]
    pub fn bonds_for(&self, rfq_id: RfqId) -> Vec<&Bond> {
        let mut bonds: Vec<&Bond> = self.bonds.values().filter(|b| b.rfq_id == rfq_id).collect();
        bonds.sort_by_key(|b| (b.locked_at, b.owner));
        bonds
    }

    /// Locked / released / slashed sums for one RFQ.
    #[must_use]
    pub fn totals(&self, rfq_id: RfqId) -> BondTotals {
        self.bonds
            .values()
            .filter(|b| b.rfq_id == rfq_id)
            .fold(BondTotals::default(), |mut acc, b| {
                let amount = u128::from(b.amount);
                acc.locked += amount;
                match b.status {
                    BondStatus::Locked => {}
                    BondStatus::Released => acc.released += amount,
                    BondStatus::Slashed => acc.slashed += amount,
                }
                acc
            })
    }

    /// Check released + slashed == locked for an RFQ that reached a
    /// terminal state.
    ///
    /// # Errors
    /// Returns `BondConservationViolation` if any bond is still outstanding.
    pub fn verify_conserved(&self, rfq_id: RfqId) -> Result<BondTotals> {
        let totals = self.totals(rfq_id);
        if !totals.is_conserved() {
            tracing::error!(
                rfq = %rfq_id,
                locked = %totals.locked,
                released = %totals.released,
                slashed = %totals.slashed,
                "bond conservation violated"
            );
            return Err(RfqError::BondConservationViolation {
                rfq: rfq_id,
                reason: format!(
                    "locked {} != released {} + slashed {}",
                    totals.locked, totals.released, totals.slashed
                ),
            });
        }
        Ok(totals)
    }

    /// Number of bonds currently LOCKED across all RFQs.
    #[must_use]
    pub fn locked_count(&self) -> usize {
        self.bonds.values().filter(|b| b.is_locked()).count()
    }

    #[must_use]
    pub fn treasury(&self) -> ParticipantId {
        self.treasury
    }
}
