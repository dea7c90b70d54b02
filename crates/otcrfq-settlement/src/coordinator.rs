//! Settlement coordinator.
//!
//! Once the maker selects a quote:
//! 1. A [`Settlement`] is opened with a funding deadline of selection + fund TTL
//! 2. The maker funds the base amount (frozen in custody)
//! 3. The taker funds the quote amount plus the fee (frozen in custody)
//! 4. `finalize` swaps base ↔ quote, splits the fee between the treasury and
//!    the facilitator, and releases both bonds
//!
//! If the deadline passes with a side missing, `timeout` slashes every
//! non-funding side and returns the funding side's deposit and bond.

use chrono::{DateTime, Utc};
use otcrfq_escrow::Custody;
use otcrfq_types::{
    EngineConfig, FundingSide, ParticipantId, Quote, Result, RewardId, Rfq, RfqError,
    Settlement, SettlementId, SettlementOutcome, clock::add_ttl,
};

use crate::rewards::RewardBook;

/// Value movements of a completed settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReceipt {
    pub settlement_id: SettlementId,
    pub base_delivered: u64,
    pub quote_delivered: u64,
    pub treasury_fee: u64,
    pub facilitator_fee: u64,
    pub reward: Option<RewardId>,
}

/// Which sides were slashed and which refunded on timeout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeoutReport {
    pub slashed: Vec<FundingSide>,
    pub refunded: Vec<FundingSide>,
}

/// Executes settlements against custody.
pub struct SettlementCoordinator {
    config: EngineConfig,
}

impl SettlementCoordinator {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Open the settlement for `quote`, selected at `now`.
    ///
    /// # Errors
    /// - `QuoteNotRevealed` if the quote has no amount
    /// - `ArithmeticOverflow` if the funding deadline is unrepresentable
    pub fn open(&self, rfq: &Rfq, quote: &Quote, now: DateTime<Utc>) -> Result<Settlement> {
        let quote_amount = quote
            .quote_amount
            .ok_or(RfqError::QuoteNotRevealed(quote.id))?;
        Ok(Settlement {
            id: SettlementId::new(),
            rfq_id: rfq.id,
            quote_id: quote.id,
            maker: rfq.maker,
            taker: quote.taker,
            facilitator: rfq.terms.facilitator,
            pair: rfq.terms.pair.clone(),
            base_amount: rfq.terms.base_amount,
            quote_amount,
            bond_amount: rfq.terms.bond_amount,
            fee_amount: rfq.terms.fee_amount,
            created_at: now,
            funding_deadline: add_ttl(now, rfq.terms.ttls.fund)?,
            maker_funded_at: None,
            taker_funded_at: None,
            completed_at: None,
            outcome: None,
        })
    }

    /// Maker deposits the base amount.
    ///
    /// # Errors
    /// `SettlementClosed`, `Unauthorized`, `FundWindowClosed`, `AlreadyFunded`,
    /// `AmountMismatch`, `InsufficientFunds`.
    pub fn fund_maker(
        &self,
        custody: &mut Custody,
        settlement: &mut Settlement,
        caller: ParticipantId,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        check_fundable(settlement, FundingSide::Maker, caller, now)?;
        check_amount(settlement.base_amount, amount)?;

        custody
            .balances
            .freeze(caller, &settlement.pair.base, amount)?;
        settlement.maker_funded_at = Some(now);
        tracing::info!(
            settlement = %settlement.id,
            rfq = %settlement.rfq_id,
            amount,
            asset = %settlement.pair.base,
            "maker side funded"
        );
        Ok(())
    }

    /// Taker deposits the quote amount and the fee.
    ///
    /// # Errors
    /// `SettlementClosed`, `Unauthorized`, `FundWindowClosed`, `AlreadyFunded`,
    /// `AmountMismatch`, `InsufficientFunds`.
    pub fn fund_taker(
        &self,
        custody: &mut Custody,
        settlement: &mut Settlement,
        caller: ParticipantId,
        amount: u64,
        fee: u64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        check_fundable(settlement, FundingSide::Taker, caller, now)?;
        check_amount(settlement.quote_amount, amount)?;
        check_amount(settlement.fee_amount, fee)?;

        let fee_asset = custody.collateral_asset().to_string();
        freeze_taker_legs(custody, caller, &settlement.pair.quote, amount, &fee_asset, fee)?;
        settlement.taker_funded_at = Some(now);
        tracing::info!(
            settlement = %settlement.id,
            rfq = %settlement.rfq_id,
            amount,
            fee,
            asset = %settlement.pair.quote,
            "taker side funded"
        );
        Ok(())
    }

    /// Execute the swap.
    ///
    /// # Errors
    /// - `SettlementClosed` if an outcome was already recorded
    /// - `NotFullyFunded` unless both sides funded
    pub fn finalize(
        &self,
        custody: &mut Custody,
        rewards: &mut RewardBook,
        settlement: &mut Settlement,
        now: DateTime<Utc>,
    ) -> Result<SettlementReceipt> {
        if !settlement.is_open() {
            return Err(RfqError::SettlementClosed(settlement.id));
        }
        if !settlement.is_fully_funded() {
            return Err(RfqError::NotFullyFunded);
        }

        let collateral = custody.collateral_asset().to_string();
        let treasury = custody.treasury();
        let facilitator_fee = match settlement.facilitator {
            Some(_) => self.config.facilitator_share(settlement.fee_amount)?,
            None => 0,
        };
        let treasury_fee = settlement
            .fee_amount
            .checked_sub(facilitator_fee)
            .ok_or(RfqError::ArithmeticOverflow)?;

        // Every leg below was frozen at funding time.
        let s = &*settlement;
        custody
            .balances
            .transfer_frozen(s.maker, s.taker, &s.pair.base, s.base_amount)?;
        custody
            .balances
            .transfer_frozen(s.taker, s.maker, &s.pair.quote, s.quote_amount)?;
        if treasury_fee > 0 {
            custody
                .balances
                .transfer_frozen(s.taker, treasury, &collateral, treasury_fee)?;
        }
        let reward = match s.facilitator {
            Some(facilitator) if facilitator_fee > 0 => {
                custody
                    .balances
                    .consume_frozen(s.taker, &collateral, facilitator_fee)?;
                Some(rewards.credit(
                    &mut custody.balances,
                    s.rfq_id,
                    facilitator,
                    &collateral,
                    facilitator_fee,
                    now,
                )?)
            }
            _ => None,
        };
        custody.release_bond(s.rfq_id, s.maker, now)?;
        custody.release_bond(s.rfq_id, s.taker, now)?;

        settlement.completed_at = Some(now);
        settlement.outcome = Some(SettlementOutcome::Completed);
        tracing::info!(
            settlement = %settlement.id,
            rfq = %settlement.rfq_id,
            base = settlement.base_amount,
            quote = settlement.quote_amount,
            treasury_fee,
            facilitator_fee,
            "settlement completed"
        );

        Ok(SettlementReceipt {
            settlement_id: settlement.id,
            base_delivered: settlement.base_amount,
            quote_delivered: settlement.quote_amount,
            treasury_fee,
            facilitator_fee,
            reward,
        })
    }

    /// Close a settlement whose funding deadline passed with a side missing.
    ///
    /// Non-funding sides lose their bond. A funding side gets its deposit
    /// and its bond back.
    ///
    /// # Errors
    /// - `SettlementClosed` if an outcome was already recorded
    /// - `Internal` if the deadline has not passed or both sides funded
    pub fn timeout(
        &self,
        custody: &mut Custody,
        settlement: &mut Settlement,
        now: DateTime<Utc>,
    ) -> Result<TimeoutReport> {
        if !settlement.is_open() {
            return Err(RfqError::SettlementClosed(settlement.id));
        }
        if !settlement.is_past_deadline(now) {
            return Err(RfqError::Internal(format!(
                "settlement {} still inside its funding window",
                settlement.id
            )));
        }
        if settlement.is_fully_funded() {
            return Err(RfqError::Internal(format!(
                "settlement {} is fully funded and must be finalized",
                settlement.id
            )));
        }

        let collateral = custody.collateral_asset().to_string();
        let mut report = TimeoutReport::default();
        for side in [FundingSide::Maker, FundingSide::Taker] {
            let party = settlement.party(side);
            if settlement.is_funded(side) {
                match side {
                    FundingSide::Maker => custody.balances.unfreeze(
                        party,
                        &settlement.pair.base,
                        settlement.base_amount,
                    )?,
                    FundingSide::Taker => {
                        custody.balances.unfreeze(
                            party,
                            &settlement.pair.quote,
                            settlement.quote_amount,
                        )?;
                        custody
                            .balances
                            .unfreeze(party, &collateral, settlement.fee_amount)?;
                    }
                }
                custody.release_bond(settlement.rfq_id, party, now)?;
                report.refunded.push(side);
            } else {
                custody.slash_bond(settlement.rfq_id, party, now)?;
                report.slashed.push(side);
            }
        }

        settlement.outcome = Some(SettlementOutcome::TimedOut);
        tracing::info!(
            settlement = %settlement.id,
            rfq = %settlement.rfq_id,
            slashed = ?report.slashed,
            refunded = ?report.refunded,
            "settlement timed out"
        );
        Ok(report)
    }
}

fn check_fundable(
    settlement: &Settlement,
    side: FundingSide,
    caller: ParticipantId,
    now: DateTime<Utc>,
) -> Result<()> {
    if !settlement.is_open() {
        return Err(RfqError::SettlementClosed(settlement.id));
    }
    if caller != settlement.party(side) {
        return Err(RfqError::Unauthorized {
            participant: caller,
            action: match side {
                FundingSide::Maker => "fund the maker side",
                FundingSide::Taker => "fund the taker side",
            },
        });
    }
    if settlement.is_past_deadline(now) {
        return Err(RfqError::FundWindowClosed);
    }
    if settlement.is_funded(side) {
        return Err(RfqError::AlreadyFunded { side });
    }
    Ok(())
}

fn check_amount(expected: u64, actual: u64) -> Result<()> {
    if expected != actual {
        return Err(RfqError::AmountMismatch { expected, actual });
    }
    Ok(())
}

/// Freeze quote amount and fee, or neither.
fn freeze_taker_legs(
    custody: &mut Custody,
    taker: ParticipantId,
    quote_asset: &str,
    amount: u64,
    fee_asset: &str,
    fee: u64,
) -> Result<()> {
    if fee == 0 {
        return custody.balances.freeze(taker, quote_asset, amount);
    }
    if quote_asset == fee_asset {
        let total = amount.checked_add(fee).ok_or(RfqError::ArithmeticOverflow)?;
        return custody.balances.freeze(taker, quote_asset, total);
    }
    custody.balances.freeze(taker, quote_asset, amount)?;
    if let Err(err) = custody.balances.freeze(taker, fee_asset, fee) {
        custody.balances.unfreeze(taker, quote_asset, amount)?;
        return Err(err);
    }
    Ok(())
}
