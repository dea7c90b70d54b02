//! Custody: balances and bonds behind one owner.
//!
//! The engine keeps a single `Custody` behind one mutex; it is the only
//! path through which balances change.

use chrono::{DateTime, Utc};
use otcrfq_types::{Asset, BalanceEntry, EngineConfig, ParticipantId, Result, RfqId};

use crate::{balance_manager::BalanceManager, bond_ledger::BondLedger};

pub struct Custody {
    pub balances: BalanceManager,
    pub bonds: BondLedger,
    collateral_asset: Asset,
}

impl Custody {
    #[must_use]
    pub fn new(collateral_asset: impl Into<Asset>, treasury: ParticipantId) -> Self {
        Self {
            balances: BalanceManager::new(),
            bonds: BondLedger::new(treasury),
            collateral_asset: collateral_asset.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.collateral_asset.clone(), config.treasury)
    }

    /// Asset bonds and fees are denominated in.
    #[must_use]
    pub fn collateral_asset(&self) -> &str {
        &self.collateral_asset
    }

    #[must_use]
    pub fn treasury(&self) -> ParticipantId {
        self.bonds.treasury()
    }

    /// Lock an RFQ bond in the collateral asset.
    pub fn lock_bond(
        &mut self,
        rfq_id: RfqId,
        owner: ParticipantId,
        amount: u64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.bonds.lock(
            &mut self.balances,
            rfq_id,
            owner,
            &self.collateral_asset,
            amount,
            at,
        )
    }

    pub fn release_bond(
        &mut self,
        rfq_id: RfqId,
        owner: ParticipantId,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        self.bonds.release(&mut self.balances, rfq_id, owner, at)
    }

    pub fn slash_bond(
        &mut self,
        rfq_id: RfqId,
        owner: ParticipantId,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        self.bonds.slash(&mut self.balances, rfq_id, owner, at)
    }

    #[must_use]
    pub fn balance(&self, who: ParticipantId, asset: &str) -> BalanceEntry {
        self.balances.balance(who, asset)
    }
}

#[cfg(test)]
mod tests {
    use otcrfq_types::BondStatus;

    use super::*;

    #[test]
    fn bonds_use_collateral_asset() {
        let cfg = EngineConfig {
            collateral_asset: "USDT".into(),
            ..EngineConfig::default()
        };
        let mut custody = Custody::from_config(&cfg);
        let maker = ParticipantId::new();
        let rfq = RfqId::new();
        custody.balances.deposit(maker, "USDT", 5_000).unwrap();

        custody.lock_bond(rfq, maker, 5_000, Utc::now()).unwrap();
        assert_eq!(custody.balance(maker, "USDT").frozen, 5_000);
        assert_eq!(custody.bonds.get(rfq, maker).unwrap().asset, "USDT");

        custody.slash_bond(rfq, maker, Utc::now()).unwrap();
        assert_eq!(custody.balance(custody.treasury(), "USDT").available, 5_000);
        assert_eq!(
            custody.bonds.get(rfq, maker).unwrap().status,
            BondStatus::Slashed
        );
    }

    #[test]
    fn release_round_trip_leaves_balance_intact() {
        let mut custody = Custody::new("USDC", ParticipantId::treasury());
        let taker = ParticipantId::new();
        let rfq = RfqId::new();
        custody.balances.deposit(taker, "USDC", 7_000).unwrap();
        custody.lock_bond(rfq, taker, 5_000, Utc::now()).unwrap();
        custody.release_bond(rfq, taker, Utc::now()).unwrap();
        let bal = custody.balance(taker, "USDC");
        assert_eq!(bal.available, 7_000);
        assert_eq!(bal.frozen, 0);
    }
}
