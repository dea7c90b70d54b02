//! Settlement: the two-sided funding record of a selected quote.
//!
//! The maker deposits the base amount, the taker deposits the quote amount
//! plus the fee. `completed_at` is only ever set once both funding
//! timestamps are set; a settlement whose funding deadline passes with a
//! side missing ends `TimedOut` instead of staying open.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AssetPair, ParticipantId, QuoteId, RfqId, SettlementId};

/// Which party a funding leg belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FundingSide {
    Maker,
    Taker,
}

impl std::fmt::Display for FundingSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Maker => write!(f, "MAKER"),
            Self::Taker => write!(f, "TAKER"),
        }
    }
}

/// How a settlement ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementOutcome {
    /// Swap executed.
    Completed,
    /// Funding deadline passed with at least one side missing.
    TimedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub id: SettlementId,
    pub rfq_id: RfqId,
    pub quote_id: QuoteId,
    pub maker: ParticipantId,
    pub taker: ParticipantId,
    pub facilitator: Option<ParticipantId>,
    pub pair: AssetPair,
    pub base_amount: u64,
    pub quote_amount: u64,
    pub bond_amount: u64,
    pub fee_amount: u64,
    pub created_at: DateTime<Utc>,
    pub funding_deadline: DateTime<Utc>,
    pub maker_funded_at: Option<DateTime<Utc>>,
    pub taker_funded_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub outcome: Option<SettlementOutcome>,
}

impl Settlement {
    #[must_use]
    pub fn maker_funded(&self) -> bool {
        self.maker_funded_at.is_some()
    }

    #[must_use]
    pub fn taker_funded(&self) -> bool {
        self.taker_funded_at.is_some()
    }

    #[must_use]
    pub fn is_fully_funded(&self) -> bool {
        self.maker_funded() && self.taker_funded()
    }

    /// No outcome yet.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.outcome.is_none()
    }

    #[must_use]
    pub fn is_funded(&self, side: FundingSide) -> bool {
        match side {
            FundingSide::Maker => self.maker_funded(),
            FundingSide::Taker => self.taker_funded(),
        }
    }

    #[must_use]
    pub fn party(&self, side: FundingSide) -> ParticipantId {
        match side {
            FundingSide::Maker => self.maker,
            FundingSide::Taker => self.taker,
        }
    }

    /// Whether the funding deadline has elapsed at `now`.
    #[must_use]
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now > self.funding_deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settlement() -> Settlement {
        let now = Utc::now();
        Settlement {
            id: SettlementId::new(),
            rfq_id: RfqId::new(),
            quote_id: QuoteId::new(),
            maker: ParticipantId::new(),
            taker: ParticipantId::new(),
            facilitator: None,
            pair: AssetPair::new("wSOL", "USDC"),
            base_amount: 1_000,
            quote_amount: 1_050,
            bond_amount: 5_000,
            fee_amount: 100,
            created_at: now,
            funding_deadline: now + chrono::TimeDelta::seconds(60),
            maker_funded_at: None,
            taker_funded_at: None,
            completed_at: None,
            outcome: None,
        }
    }

    #[test]
    fn funding_flags() {
        let mut s = settlement();
        assert!(!s.is_fully_funded());
        s.maker_funded_at = Some(Utc::now());
        assert!(s.is_funded(FundingSide::Maker));
        assert!(!s.is_funded(FundingSide::Taker));
        s.taker_funded_at = Some(Utc::now());
        assert!(s.is_fully_funded());
        assert!(s.is_open());
    }

    #[test]
    fn deadline_is_exclusive() {
        let s = settlement();
        assert!(!s.is_past_deadline(s.funding_deadline));
        assert!(s.is_past_deadline(s.funding_deadline + chrono::TimeDelta::seconds(1)));
    }

    #[test]
    fn party_lookup() {
        let s = settlement();
        assert_eq!(s.party(FundingSide::Maker), s.maker);
        assert_eq!(s.party(FundingSide::Taker), s.taker);
        assert_eq!(FundingSide::Taker.to_string(), "TAKER");
    }
}
