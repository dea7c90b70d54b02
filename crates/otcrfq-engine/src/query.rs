//! Read-side helpers: RFQ filters and quote ranking.

use chrono::{DateTime, Utc};
use otcrfq_types::{AssetPair, ParticipantId, Quote, QuoteId, RfqState};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::machine::RfqMachine;

/// Filter for [`crate::AuctionEngine::list_rfqs`]. Empty fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfqFilter {
    pub state: Option<RfqState>,
    pub pair: Option<AssetPair>,
    /// Maker, facilitator or any taker that committed.
    pub participant: Option<ParticipantId>,
}

impl RfqFilter {
    #[must_use]
    pub fn with_state(mut self, state: RfqState) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn with_pair(mut self, pair: AssetPair) -> Self {
        self.pair = Some(pair);
        self
    }

    #[must_use]
    pub fn with_participant(mut self, participant: ParticipantId) -> Self {
        self.participant = Some(participant);
        self
    }

    #[must_use]
    pub fn matches(&self, machine: &RfqMachine) -> bool {
        let rfq = machine.rfq();
        self.state.is_none_or(|s| rfq.state() == s)
            && self.pair.as_ref().is_none_or(|p| rfq.pair() == p)
            && self.participant.is_none_or(|who| machine.involves(who))
    }
}

/// A revealed quote with its position in the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedQuote {
    /// 1 is best.
    pub rank: usize,
    pub quote_id: QuoteId,
    pub taker: ParticipantId,
    pub quote_amount: u64,
    pub implied_price: Decimal,
    pub revealed_at: DateTime<Utc>,
    pub selected: bool,
}

/// Rank revealed quotes best first.
///
/// Higher quote amount wins; ties go to the earlier reveal, then to the
/// earlier commit. Unrevealed quotes are left out. Ranking is advisory:
/// the maker may select any revealed quote.
#[must_use]
pub fn rank_quotes(quotes: &[Quote], base_amount: u64) -> Vec<RankedQuote> {
    let mut revealed: Vec<(&Quote, u64, DateTime<Utc>)> = quotes
        .iter()
        .filter_map(|q| Some((q, q.quote_amount?, q.revealed_at?)))
        .collect();
    revealed.sort_by(|(a, amount_a, at_a), (b, amount_b, at_b)| {
        amount_b
            .cmp(amount_a)
            .then(at_a.cmp(at_b))
            .then(a.sequence.cmp(&b.sequence))
    });

    revealed
        .into_iter()
        .enumerate()
        .map(|(i, (quote, quote_amount, revealed_at))| RankedQuote {
            rank: i + 1,
            quote_id: quote.id,
            taker: quote.taker,
            quote_amount,
            implied_price: quote.implied_price(base_amount).unwrap_or_default(),
            revealed_at,
            selected: quote.selected,
        })
        .collect()
}
