//! End-to-end tests across custody and settlement.
//!
//! These tests exercise the settlement half of an RFQ:
//! bonds locked in custody -> settlement opened -> funding -> finalize or
//! timeout -> reward claim, checking supply conservation after each step.

use chrono::{DateTime, TimeDelta, Utc};
use otcrfq_escrow::Custody;
use otcrfq_settlement::{RewardBook, SettlementCoordinator, SupplyConservation};
use otcrfq_types::*;

/// Helper: custody plus the settlement plane, with supply tracking.
struct Desk {
    custody: Custody,
    coordinator: SettlementCoordinator,
    rewards: RewardBook,
    supply: SupplyConservation,
    now: DateTime<Utc>,
}

impl Desk {
    fn new(config: EngineConfig) -> Self {
        Self {
            custody: Custody::from_config(&config),
            coordinator: SettlementCoordinator::new(config),
            rewards: RewardBook::new(),
            supply: SupplyConservation::new(),
            now: Utc::now(),
        }
    }

    fn deposit(&mut self, who: ParticipantId, asset: &str, amount: u64) {
        self.custody.balances.deposit(who, asset, amount).unwrap();
        self.supply.record_deposit(asset, amount);
    }

    fn assert_conserved(&self) {
        self.supply
            .verify_balances(&self.custody.balances)
            .expect("supply must be conserved");
    }

    /// Lock both bonds and open a settlement at `quote_amount`.
    fn select(&mut self, rfq: &Rfq, taker: ParticipantId, quote_amount: u64) -> Settlement {
        let bond = rfq.terms.bond_amount;
        self.custody.lock_bond(rfq.id, rfq.maker, bond, self.now).unwrap();
        self.custody.lock_bond(rfq.id, taker, bond, self.now).unwrap();
        let mut quote = Quote::committed(
            rfq.id,
            taker,
            CommitHash([3; 32]),
            LiquidityProof::default(),
            self.now,
            0,
        );
        quote.quote_amount = Some(quote_amount);
        self.coordinator.open(rfq, &quote, self.now).unwrap()
    }
}

#[test]
fn e2e_settlement_with_facilitator_reward() {
    let mut desk = Desk::new(EngineConfig::default());
    let maker = ParticipantId::new();
    let taker = ParticipantId::new();
    let facilitator = ParticipantId::new();

    desk.deposit(maker, "wSOL", 1_000);
    desk.deposit(maker, "USDC", 5_000);
    desk.deposit(taker, "USDC", 10_000);

    let mut terms = RfqTerms::dummy();
    terms.facilitator = Some(facilitator);
    let rfq = Rfq::draft(maker, terms, desk.now);
    let mut settlement = desk.select(&rfq, taker, 1_050);
    desk.assert_conserved();

    desk.coordinator
        .fund_maker(&mut desk.custody, &mut settlement, maker, 1_000, desk.now)
        .unwrap();
    desk.coordinator
        .fund_taker(&mut desk.custody, &mut settlement, taker, 1_050, 100, desk.now)
        .unwrap();
    desk.assert_conserved();

    let receipt = desk
        .coordinator
        .finalize(&mut desk.custody, &mut desk.rewards, &mut settlement, desk.now)
        .unwrap();
    desk.assert_conserved();

    assert_eq!(settlement.outcome, Some(SettlementOutcome::Completed));
    assert_eq!(desk.custody.balance(taker, "wSOL").available, 1_000);
    assert_eq!(desk.custody.balance(maker, "USDC").available, 5_000 + 1_050);
    assert_eq!(
        desk.custody.balance(taker, "USDC").available,
        10_000 - 1_050 - 100
    );
    assert_eq!(
        desk.custody.balance(ParticipantId::treasury(), "USDC").available,
        80
    );

    let totals = desk.custody.bonds.verify_conserved(rfq.id).unwrap();
    assert_eq!(totals.released, 10_000);
    assert_eq!(totals.slashed, 0);

    let reward_id = receipt.reward.expect("facilitator reward credited");
    let reward = desk
        .rewards
        .claim(&mut desk.custody.balances, reward_id, facilitator, desk.now)
        .unwrap();
    assert_eq!(reward.amount, 20);
    assert_eq!(desk.custody.balance(facilitator, "USDC").available, 20);
    desk.assert_conserved();

    // Facilitator withdraws the reward; supply follows.
    desk.custody
        .balances
        .withdraw(facilitator, "USDC", 20)
        .unwrap();
    desk.supply.record_withdrawal("USDC", 20);
    desk.assert_conserved();
}

#[test]
fn e2e_timeout_with_only_maker_funded() {
    let mut desk = Desk::new(EngineConfig::default());
    let maker = ParticipantId::new();
    let taker = ParticipantId::new();
    desk.deposit(maker, "wSOL", 1_000);
    desk.deposit(maker, "USDC", 5_000);
    desk.deposit(taker, "USDC", 5_000);

    let rfq = Rfq::draft(maker, RfqTerms::dummy(), desk.now);
    let mut settlement = desk.select(&rfq, taker, 1_050);
    desk.coordinator
        .fund_maker(&mut desk.custody, &mut settlement, maker, 1_000, desk.now)
        .unwrap();

    let late = settlement.funding_deadline + TimeDelta::seconds(1);
    let report = desk
        .coordinator
        .timeout(&mut desk.custody, &mut settlement, late)
        .unwrap();
    assert_eq!(report.slashed, vec![FundingSide::Taker]);
    assert_eq!(report.refunded, vec![FundingSide::Maker]);
    desk.assert_conserved();

    // Maker whole again, taker lost the bond.
    assert_eq!(desk.custody.balance(maker, "wSOL").available, 1_000);
    assert_eq!(desk.custody.balance(maker, "USDC").available, 5_000);
    assert!(desk.custody.balance(taker, "USDC").is_zero());
    assert_eq!(
        desk.custody.balance(ParticipantId::treasury(), "USDC").available,
        5_000
    );
    desk.custody.bonds.verify_conserved(rfq.id).unwrap();

    // A timed-out settlement cannot be revived.
    let err = desk
        .coordinator
        .fund_taker(&mut desk.custody, &mut settlement, taker, 1_050, 100, late)
        .unwrap_err();
    assert!(matches!(err, RfqError::SettlementClosed(_)));
}

#[test]
fn e2e_zero_fee_settlement() {
    let mut desk = Desk::new(EngineConfig::default());
    let maker = ParticipantId::new();
    let taker = ParticipantId::new();
    desk.deposit(maker, "wSOL", 1_000);
    desk.deposit(maker, "USDC", 5_000);
    desk.deposit(taker, "USDC", 6_200);

    let mut terms = RfqTerms::dummy();
    terms.fee_amount = 0;
    terms.facilitator = Some(ParticipantId::new());
    let rfq = Rfq::draft(maker, terms, desk.now);
    let mut settlement = desk.select(&rfq, taker, 1_200);

    desk.coordinator
        .fund_maker(&mut desk.custody, &mut settlement, maker, 1_000, desk.now)
        .unwrap();
    desk.coordinator
        .fund_taker(&mut desk.custody, &mut settlement, taker, 1_200, 0, desk.now)
        .unwrap();
    let receipt = desk
        .coordinator
        .finalize(&mut desk.custody, &mut desk.rewards, &mut settlement, desk.now)
        .unwrap();

    assert_eq!(receipt.treasury_fee, 0);
    assert_eq!(receipt.facilitator_fee, 0);
    assert!(receipt.reward.is_none());
    assert!(desk.rewards.is_empty());
    desk.assert_conserved();
}
