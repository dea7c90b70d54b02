//! # RFQ: one maker's request for quote
//!
//! ## State Machine
//!
//! ```text
//!            cancel
//!   DRAFT ───────────▶ IGNORED
//!     │ open
//!     ▼        commit TTL, no commits
//!   OPEN ────────────────────────────▶ EXPIRED
//!     │ first commit
//!     ▼        reveal TTL, no reveals
//!   COMMITTED ───────────────────────▶ INCOMPLETE
//!     │ first reveal
//!     ▼        selection TTL, no choice
//!   REVEALED ────────────────────────▶ EXPIRED
//!     │ maker selects
//!     ▼        fund TTL, one side missing
//!   SELECTED ────────────────────────▶ INCOMPLETE
//!     │ both sides funded
//!     ▼
//!   SETTLED
//! ```
//!
//! [`RfqState::can_transition_to`] is the single transition table. The
//! `state` field is private: the only way to move an RFQ is
//! [`Rfq::transition_to`], which refuses edges outside the table.

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AssetPair, EngineConfig, ParticipantId, QuoteId, Result, RfqError, RfqId, SettlementId,
    clock::add_ttl, constants,
};

/// Lifecycle state of an RFQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RfqState {
    /// Created by the maker, not visible to takers, no bonds locked.
    Draft,
    /// Accepting commitments; maker bond locked.
    Open,
    /// At least one commitment received.
    Committed,
    /// At least one commitment revealed.
    Revealed,
    /// Maker chose a quote; settlement funding in progress.
    Selected,
    /// Swap executed. Terminal.
    Settled,
    /// Draft cancelled by the maker. Terminal.
    Ignored,
    /// A phase elapsed with nobody acting. Terminal.
    Expired,
    /// A participant failed to follow through. Terminal.
    Incomplete,
}

impl RfqState {
    pub const ALL: [Self; 9] = [
        Self::Draft,
        Self::Open,
        Self::Committed,
        Self::Revealed,
        Self::Selected,
        Self::Settled,
        Self::Ignored,
        Self::Expired,
        Self::Incomplete,
    ];

    /// Can an RFQ in this state move to `target`?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Draft, Self::Open | Self::Ignored)
                | (Self::Open, Self::Committed | Self::Expired)
                | (Self::Committed, Self::Revealed | Self::Incomplete)
                | (Self::Revealed, Self::Selected | Self::Expired)
                | (Self::Selected, Self::Settled | Self::Incomplete)
        )
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Settled | Self::Ignored | Self::Expired | Self::Incomplete
        )
    }

    /// Opened and not yet terminal: the states the sweep has to watch.
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            Self::Open | Self::Committed | Self::Revealed | Self::Selected
        )
    }
}

impl fmt::Display for RfqState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "DRAFT"),
            Self::Open => write!(f, "OPEN"),
            Self::Committed => write!(f, "COMMITTED"),
            Self::Revealed => write!(f, "REVEALED"),
            Self::Selected => write!(f, "SELECTED"),
            Self::Settled => write!(f, "SETTLED"),
            Self::Ignored => write!(f, "IGNORED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Incomplete => write!(f, "INCOMPLETE"),
        }
    }
}

// ---------------------------------------------------------------------------
// Terms
// ---------------------------------------------------------------------------

/// Durations of the four timed phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTtls {
    pub commit: Duration,
    pub reveal: Duration,
    pub selection: Duration,
    pub fund: Duration,
}

impl Default for PhaseTtls {
    fn default() -> Self {
        Self {
            commit: Duration::from_secs(constants::DEFAULT_COMMIT_TTL_SECS),
            reveal: Duration::from_secs(constants::DEFAULT_REVEAL_TTL_SECS),
            selection: Duration::from_secs(constants::DEFAULT_SELECTION_TTL_SECS),
            fund: Duration::from_secs(constants::DEFAULT_FUND_TTL_SECS),
        }
    }
}

/// What the maker offers and under which economics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfqTerms {
    pub pair: AssetPair,
    /// Fixed amount of the base asset the maker delivers.
    pub base_amount: u64,
    /// Floor for revealed quotes, in quote-asset units.
    pub min_quote_amount: u64,
    /// Bond posted by the maker and by every taker, in collateral units.
    pub bond_amount: u64,
    /// Fee paid by the winning taker, in collateral units.
    pub fee_amount: u64,
    pub ttls: PhaseTtls,
    /// Optional fee-share recipient.
    pub facilitator: Option<ParticipantId>,
}

impl RfqTerms {
    /// Validate terms against the engine's limits.
    pub fn validate(&self, config: &EngineConfig) -> Result<()> {
        let invalid = |reason: &str| {
            Err(RfqError::InvalidTerms {
                reason: reason.to_string(),
            })
        };

        if self.pair.base.trim().is_empty() || self.pair.quote.trim().is_empty() {
            return invalid("base and quote assets are required");
        }
        if self.pair.base == self.pair.quote {
            return invalid("base and quote assets must differ");
        }
        if self.base_amount == 0 {
            return invalid("base amount must be greater than zero");
        }
        if self.min_quote_amount == 0 {
            return invalid("minimum quote amount must be greater than zero");
        }
        if self.bond_amount == 0 {
            return invalid("bond amount must be greater than zero");
        }
        for (phase, ttl) in [
            ("commit", self.ttls.commit),
            ("reveal", self.ttls.reveal),
            ("selection", self.ttls.selection),
            ("fund", self.ttls.fund),
        ] {
            if ttl < config.min_phase_ttl || ttl > config.max_phase_ttl {
                return Err(RfqError::InvalidTerms {
                    reason: format!(
                        "{phase} TTL {ttl:?} outside [{:?}, {:?}]",
                        config.min_phase_ttl, config.max_phase_ttl
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Partial edit of a draft's terms. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfqTermsUpdate {
    pub pair: Option<AssetPair>,
    pub base_amount: Option<u64>,
    pub min_quote_amount: Option<u64>,
    pub bond_amount: Option<u64>,
    pub fee_amount: Option<u64>,
    pub ttls: Option<PhaseTtls>,
    /// `Some(None)` clears the facilitator.
    pub facilitator: Option<Option<ParticipantId>>,
}

impl RfqTermsUpdate {
    /// Apply to a copy of `terms`.
    #[must_use]
    pub fn apply(&self, terms: &RfqTerms) -> RfqTerms {
        let mut next = terms.clone();
        if let Some(pair) = &self.pair {
            next.pair = pair.clone();
        }
        if let Some(v) = self.base_amount {
            next.base_amount = v;
        }
        if let Some(v) = self.min_quote_amount {
            next.min_quote_amount = v;
        }
        if let Some(v) = self.bond_amount {
            next.bond_amount = v;
        }
        if let Some(v) = self.fee_amount {
            next.fee_amount = v;
        }
        if let Some(ttls) = self.ttls {
            next.ttls = ttls;
        }
        if let Some(facilitator) = self.facilitator {
            next.facilitator = facilitator;
        }
        next
    }
}

// ---------------------------------------------------------------------------
// Rfq
// ---------------------------------------------------------------------------

/// Phase deadlines, fixed when the RFQ opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadlines {
    pub commit: DateTime<Utc>,
    pub reveal: DateTime<Utc>,
    pub selection: DateTime<Utc>,
}

impl Deadlines {
    pub fn from_open(opened_at: DateTime<Utc>, ttls: &PhaseTtls) -> Result<Self> {
        let commit = add_ttl(opened_at, ttls.commit)?;
        let reveal = add_ttl(commit, ttls.reveal)?;
        let selection = add_ttl(reveal, ttls.selection)?;
        Ok(Self {
            commit,
            reveal,
            selection,
        })
    }
}

/// One recorded state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub rfq_id: RfqId,
    pub from: RfqState,
    pub to: RfqState,
    pub at: DateTime<Utc>,
}

/// An RFQ and its lifecycle bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rfq {
    pub id: RfqId,
    pub maker: ParticipantId,
    pub terms: RfqTerms,
    state: RfqState,
    pub created_at: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
    pub deadlines: Option<Deadlines>,
    pub selected_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub committed_count: u32,
    pub revealed_count: u32,
    pub selected_quote: Option<QuoteId>,
    pub settlement: Option<SettlementId>,
    history: Vec<Transition>,
}

impl Rfq {
    /// A new draft. Terms are expected to be validated by the caller.
    #[must_use]
    pub fn draft(maker: ParticipantId, terms: RfqTerms, now: DateTime<Utc>) -> Self {
        Self {
            id: RfqId::new(),
            maker,
            terms,
            state: RfqState::Draft,
            created_at: now,
            opened_at: None,
            deadlines: None,
            selected_at: None,
            completed_at: None,
            committed_count: 0,
            revealed_count: 0,
            selected_quote: None,
            settlement: None,
            history: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> RfqState {
        self.state
    }

    /// Every transition applied so far, oldest first.
    #[must_use]
    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    #[must_use]
    pub fn pair(&self) -> &AssetPair {
        &self.terms.pair
    }

    /// Move to `to`, recording the transition. Terminal states stamp
    /// `completed_at`.
    ///
    /// # Errors
    /// Returns `IllegalTransition` for edges outside the lifecycle graph.
    pub fn transition_to(&mut self, to: RfqState, at: DateTime<Utc>) -> Result<Transition> {
        if !self.state.can_transition_to(to) {
            return Err(RfqError::IllegalTransition {
                from: self.state,
                to,
            });
        }
        let transition = Transition {
            rfq_id: self.id,
            from: self.state,
            to,
            at,
        };
        self.state = to;
        if to.is_terminal() {
            self.completed_at = Some(at);
        }
        self.history.push(transition);
        Ok(transition)
    }

    /// Deadlines, or a state violation naming `action` if never opened.
    pub fn require_deadlines(&self, action: &'static str) -> Result<Deadlines> {
        self.deadlines.ok_or(RfqError::StateViolation {
            action,
            state: self.state,
        })
    }
}

/// Dummy terms for testing. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl RfqTerms {
    /// 1 000 wSOL for at least 1 000 USDC, bond 5 000, fee 100, default TTLs.
    #[must_use]
    pub fn dummy() -> Self {
        Self {
            pair: AssetPair::new("wSOL", "USDC"),
            base_amount: 1_000,
            min_quote_amount: 1_000,
            bond_amount: 5_000,
            fee_amount: 100,
            ttls: PhaseTtls::default(),
            facilitator: None,
        }
    }
}
