//! The RFQ state machine.
//!
//! An [`RfqMachine`] owns one RFQ together with its quotes, its commitment
//! book and (after selection) its settlement. It is the only writer of the
//! RFQ's state; every state change goes through [`Rfq::transition_to`].
//!
//! The machine holds no locks and no clock. The engine serializes access
//! per RFQ and passes in `now`, custody and the other shared services.

use chrono::{DateTime, Utc};
use otcrfq_escrow::{CommitRegistry, CommitmentBook, Custody};
use otcrfq_settlement::{RewardBook, SettlementCoordinator, SettlementReceipt};
use otcrfq_types::{
    CommitHash, Deadlines, EngineConfig, FundingSide, LiquidityProof, Nonce, ParticipantId,
    Quote, QuoteId, Result, Rfq, RfqError, RfqState, RfqTermsUpdate, Settlement, Transition,
};

/// One RFQ and everything hanging off it.
pub struct RfqMachine {
    rfq: Rfq,
    /// Quotes in commit order.
    quotes: Vec<Quote>,
    book: CommitmentBook,
    settlement: Option<Settlement>,
}

impl RfqMachine {
    #[must_use]
    pub fn new(rfq: Rfq, max_commits: usize) -> Self {
        Self {
            rfq,
            quotes: Vec::new(),
            book: CommitmentBook::new(max_commits),
            settlement: None,
        }
    }

    // =================================================================
    // Read access
    // =================================================================

    #[must_use]
    pub fn rfq(&self) -> &Rfq {
        &self.rfq
    }

    #[must_use]
    pub fn quotes(&self) -> &[Quote] {
        &self.quotes
    }

    #[must_use]
    pub fn quote(&self, quote_id: QuoteId) -> Option<&Quote> {
        self.quotes.iter().find(|q| q.id == quote_id)
    }

    #[must_use]
    pub fn settlement(&self) -> Option<&Settlement> {
        self.settlement.as_ref()
    }

    #[must_use]
    pub fn commitments(&self) -> &CommitmentBook {
        &self.book
    }

    /// Whether `who` is the maker, the facilitator or one of the takers.
    #[must_use]
    pub fn involves(&self, who: ParticipantId) -> bool {
        self.rfq.maker == who
            || self.rfq.terms.facilitator == Some(who)
            || self.quotes.iter().any(|q| q.taker == who)
    }

    // =================================================================
    // Draft phase
    // =================================================================

    /// Edit the terms of a draft.
    pub fn update_draft(
        &mut self,
        caller: ParticipantId,
        update: &RfqTermsUpdate,
        config: &EngineConfig,
    ) -> Result<()> {
        self.require_maker(caller, "update the draft")?;
        let state = self.rfq.state();
        if state != RfqState::Draft {
            return Err(RfqError::NotDraft { state });
        }
        let terms = update.apply(&self.rfq.terms);
        terms.validate(config)?;
        self.rfq.terms = terms;
        tracing::debug!(rfq = %self.rfq.id, "draft terms updated");
        Ok(())
    }

    /// Draft → Ignored. No bonds are involved.
    pub fn cancel_draft(&mut self, caller: ParticipantId, now: DateTime<Utc>) -> Result<Transition> {
        self.require_maker(caller, "cancel the draft")?;
        let state = self.rfq.state();
        if state != RfqState::Draft {
            return Err(RfqError::NotDraft { state });
        }
        self.apply(RfqState::Ignored, now)
    }

    /// Draft → Open. Locks the maker bond and fixes the phase deadlines.
    ///
    /// If the bond cannot be locked the RFQ stays in Draft.
    pub fn open(
        &mut self,
        caller: ParticipantId,
        config: &EngineConfig,
        custody: &mut Custody,
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        self.require_maker(caller, "open the RFQ")?;
        match self.rfq.state() {
            RfqState::Draft => {}
            RfqState::Open => return Err(RfqError::AlreadyOpen),
            state => return Err(RfqError::NotDraft { state }),
        }
        self.rfq.terms.validate(config)?;
        let deadlines = Deadlines::from_open(now, &self.rfq.terms.ttls)?;

        custody.lock_bond(self.rfq.id, self.rfq.maker, self.rfq.terms.bond_amount, now)?;

        self.rfq.opened_at = Some(now);
        self.rfq.deadlines = Some(deadlines);
        self.apply(RfqState::Open, now)
    }

    // =================================================================
    // Commit-reveal
    // =================================================================

    /// Pre-flight for [`Self::commit`] that touches no shared state.
    ///
    /// Runs the window checks and, when a guard key is configured, the
    /// liquidity proof signature check.
    pub fn check_commit(
        &self,
        taker: ParticipantId,
        hash: &CommitHash,
        proof: &LiquidityProof,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.check_commit_window(taker, now)?;
        if let Some(guard_key) = &config.liquidity_guard_key {
            if let Err(err) = proof.verify(guard_key, hash) {
                tracing::warn!(rfq = %self.rfq.id, taker = %taker, error = %err, "liquidity proof rejected");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Accept a taker's commitment and lock the taker bond.
    ///
    /// The liquidity proof is expected to have passed [`Self::check_commit`].
    /// Checks run before anything is locked, so a rejected commitment
    /// leaves no trace.
    pub fn commit(
        &mut self,
        taker: ParticipantId,
        hash: CommitHash,
        proof: LiquidityProof,
        custody: &mut Custody,
        registry: &mut CommitRegistry,
        now: DateTime<Utc>,
    ) -> Result<Quote> {
        let state = self.check_commit_window(taker, now)?;
        self.book.check_admission(taker)?;
        registry.check(&hash)?;

        custody.lock_bond(self.rfq.id, taker, self.rfq.terms.bond_amount, now)?;
        registry.claim(hash)?;

        let quote = Quote::committed(self.rfq.id, taker, hash, proof, now, self.book.len() as u64);
        self.book.push(quote.id, taker, hash, now)?;
        self.quotes.push(quote.clone());
        self.rfq.committed_count += 1;
        tracing::debug!(
            rfq = %self.rfq.id,
            quote = %quote.id,
            taker = %taker,
            sequence = quote.sequence,
            hash = %hash,
            "quote committed"
        );

        if state == RfqState::Open {
            self.apply(RfqState::Committed, now)?;
        }
        Ok(quote)
    }

    /// Open a commitment. Succeeds only if `(amount, nonce)` hashes to the
    /// stored commitment and the reveal window is open.
    pub fn reveal(
        &mut self,
        quote_id: QuoteId,
        taker: ParticipantId,
        amount: u64,
        nonce: &Nonce,
        now: DateTime<Utc>,
    ) -> Result<Quote> {
        let committed_by = self.book.get(quote_id)?.taker;
        if committed_by != taker {
            return Err(RfqError::Unauthorized {
                participant: taker,
                action: "reveal this quote",
            });
        }
        let state = self.rfq.state();
        match state {
            RfqState::Committed | RfqState::Revealed => {}
            RfqState::Open => return Err(RfqError::RevealWindowNotOpen),
            RfqState::Draft | RfqState::Ignored => {
                return Err(RfqError::StateViolation {
                    action: "reveal",
                    state,
                });
            }
            _ => return Err(RfqError::RevealWindowClosed),
        }
        let deadlines = self.rfq.require_deadlines("reveal")?;
        if now <= deadlines.commit {
            return Err(RfqError::RevealWindowNotOpen);
        }
        if now > deadlines.reveal {
            return Err(RfqError::RevealWindowClosed);
        }

        let idx = self.position(quote_id)?;
        if self.quotes[idx].is_revealed() {
            return Err(RfqError::AlreadyRevealed(quote_id));
        }
        let candidate = CommitHash::compute(self.rfq.id, taker, &self.rfq.terms, amount, nonce);
        if let Err(err) = self.book.verify(quote_id, &candidate) {
            tracing::warn!(rfq = %self.rfq.id, quote = %quote_id, taker = %taker, "reveal does not match commitment");
            return Err(err);
        }
        let minimum = self.rfq.terms.min_quote_amount;
        if amount < minimum {
            return Err(RfqError::QuoteBelowMinimum { amount, minimum });
        }

        self.book.seal();
        let quote = &mut self.quotes[idx];
        quote.quote_amount = Some(amount);
        quote.revealed_at = Some(now);
        let revealed = quote.clone();
        self.rfq.revealed_count += 1;
        tracing::debug!(rfq = %self.rfq.id, quote = %quote_id, taker = %taker, amount, "quote revealed");

        if state == RfqState::Committed {
            self.apply(RfqState::Revealed, now)?;
        }
        Ok(revealed)
    }

    // =================================================================
    // Selection and settlement
    // =================================================================

    /// The maker picks one revealed quote.
    ///
    /// Every other taker gets the bond back, revealed or not. The maker's
    /// and the winner's bonds stay locked until settlement.
    pub fn select(
        &mut self,
        quote_id: QuoteId,
        caller: ParticipantId,
        custody: &mut Custody,
        coordinator: &SettlementCoordinator,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        self.require_maker(caller, "select a quote")?;
        if self.rfq.selected_quote.is_some() {
            return Err(RfqError::AlreadySelected);
        }
        let state = self.rfq.state();
        match state {
            RfqState::Revealed => {}
            RfqState::Selected => return Err(RfqError::AlreadySelected),
            RfqState::Open | RfqState::Committed => return Err(RfqError::SelectionWindowNotOpen),
            RfqState::Expired | RfqState::Incomplete | RfqState::Settled => {
                return Err(RfqError::SelectionWindowClosed);
            }
            RfqState::Draft | RfqState::Ignored => {
                return Err(RfqError::StateViolation {
                    action: "select",
                    state,
                });
            }
        }
        let deadlines = self.rfq.require_deadlines("select")?;
        if now <= deadlines.reveal {
            return Err(RfqError::SelectionWindowNotOpen);
        }
        if now > deadlines.selection {
            return Err(RfqError::SelectionWindowClosed);
        }

        let Some(idx) = self.quotes.iter().position(|q| q.id == quote_id) else {
            tracing::error!(rfq = %self.rfq.id, quote = %quote_id, "selection of a quote this RFQ never received");
            return Err(RfqError::QuoteNotFound(quote_id));
        };
        if !self.quotes[idx].is_revealed() {
            return Err(RfqError::QuoteNotRevealed(quote_id));
        }
        let settlement = coordinator.open(&self.rfq, &self.quotes[idx], now)?;

        for i in (0..self.quotes.len()).filter(|&i| i != idx) {
            self.release_taker(i, custody, now)?;
        }

        let winner = &mut self.quotes[idx];
        winner.selected = true;
        winner.max_funding_deadline = Some(settlement.funding_deadline);
        self.rfq.selected_quote = Some(quote_id);
        self.rfq.selected_at = Some(now);
        self.rfq.settlement = Some(settlement.id);
        self.settlement = Some(settlement.clone());
        self.apply(RfqState::Selected, now)?;
        tracing::info!(
            rfq = %self.rfq.id,
            quote = %quote_id,
            settlement = %settlement.id,
            quote_amount = settlement.quote_amount,
            funding_deadline = %settlement.funding_deadline,
            "quote selected"
        );
        Ok(settlement)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn fund(
        &mut self,
        side: FundingSide,
        caller: ParticipantId,
        amount: u64,
        fee: u64,
        custody: &mut Custody,
        coordinator: &SettlementCoordinator,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        let settlement = self.settlement_mut("fund")?;
        match side {
            FundingSide::Maker => coordinator.fund_maker(custody, settlement, caller, amount, now)?,
            FundingSide::Taker => {
                coordinator.fund_taker(custody, settlement, caller, amount, fee, now)?;
            }
        }
        Ok(settlement.clone())
    }

    /// Selected → Settled once both sides funded.
    pub fn finalize(
        &mut self,
        custody: &mut Custody,
        rewards: &mut RewardBook,
        coordinator: &SettlementCoordinator,
        now: DateTime<Utc>,
    ) -> Result<SettlementReceipt> {
        let settlement = self.settlement_mut("finalize")?;
        let receipt = coordinator.finalize(custody, rewards, settlement, now)?;
        let winner = settlement.quote_id;
        if let Some(quote) = self.quotes.iter_mut().find(|q| q.id == winner) {
            quote.bond_refunded_at = Some(now);
        }
        self.finish(RfqState::Settled, custody, now)?;
        Ok(receipt)
    }

    // =================================================================
    // Expiry
    // =================================================================

    /// Apply whatever time-driven transition is due at `now`.
    ///
    /// Returns `None` when nothing is due, including for terminal RFQs, so
    /// calling it again right away is a no-op.
    pub fn sweep(
        &mut self,
        now: DateTime<Utc>,
        custody: &mut Custody,
        rewards: &mut RewardBook,
        coordinator: &SettlementCoordinator,
    ) -> Result<Option<Transition>> {
        let state = self.rfq.state();
        if !state.is_live() {
            return Ok(None);
        }
        let deadlines = self.rfq.require_deadlines("sweep")?;
        if now > deadlines.commit {
            self.book.seal();
        }

        match state {
            RfqState::Open if now > deadlines.commit => {
                custody.release_bond(self.rfq.id, self.rfq.maker, now)?;
                self.finish(RfqState::Expired, custody, now).map(Some)
            }
            RfqState::Committed if now > deadlines.reveal => {
                // Nobody revealed: every taker defaulted.
                for i in 0..self.quotes.len() {
                    self.slash_taker(i, custody, now)?;
                }
                custody.release_bond(self.rfq.id, self.rfq.maker, now)?;
                self.finish(RfqState::Incomplete, custody, now).map(Some)
            }
            RfqState::Revealed if now > deadlines.selection => {
                // The maker never chose: nobody is penalized.
                for i in 0..self.quotes.len() {
                    self.release_taker(i, custody, now)?;
                }
                custody.release_bond(self.rfq.id, self.rfq.maker, now)?;
                self.finish(RfqState::Expired, custody, now).map(Some)
            }
            RfqState::Selected => self.sweep_settlement(now, custody, rewards, coordinator),
            _ => Ok(None),
        }
    }

    fn sweep_settlement(
        &mut self,
        now: DateTime<Utc>,
        custody: &mut Custody,
        rewards: &mut RewardBook,
        coordinator: &SettlementCoordinator,
    ) -> Result<Option<Transition>> {
        let settlement = self.settlement_mut("sweep")?;
        if settlement.is_fully_funded() {
            self.finalize(custody, rewards, coordinator, now)?;
            return Ok(self.rfq.history().last().copied());
        }
        if !settlement.is_past_deadline(now) {
            return Ok(None);
        }

        let report = coordinator.timeout(custody, settlement, now)?;
        if report.refunded.contains(&FundingSide::Taker) {
            let winner = settlement.quote_id;
            if let Some(quote) = self.quotes.iter_mut().find(|q| q.id == winner) {
                quote.bond_refunded_at = Some(now);
            }
        }
        self.finish(RfqState::Incomplete, custody, now).map(Some)
    }

    // =================================================================
    // Helpers
    // =================================================================

    fn require_maker(&self, caller: ParticipantId, action: &'static str) -> Result<()> {
        if caller != self.rfq.maker {
            return Err(RfqError::Unauthorized {
                participant: caller,
                action,
            });
        }
        Ok(())
    }

    fn check_commit_window(&self, taker: ParticipantId, now: DateTime<Utc>) -> Result<RfqState> {
        let state = self.rfq.state();
        match state {
            RfqState::Open | RfqState::Committed => {}
            RfqState::Draft | RfqState::Ignored => {
                return Err(RfqError::StateViolation {
                    action: "commit",
                    state,
                });
            }
            _ => return Err(RfqError::CommitWindowClosed),
        }
        let deadlines = self.rfq.require_deadlines("commit")?;
        if now > deadlines.commit {
            return Err(RfqError::CommitWindowClosed);
        }
        if taker == self.rfq.maker {
            return Err(RfqError::SelfQuote);
        }
        Ok(state)
    }

    fn position(&self, quote_id: QuoteId) -> Result<usize> {
        self.quotes
            .iter()
            .position(|q| q.id == quote_id)
            .ok_or(RfqError::QuoteNotFound(quote_id))
    }

    fn settlement_mut(&mut self, action: &'static str) -> Result<&mut Settlement> {
        let state = self.rfq.state();
        self.settlement
            .as_mut()
            .ok_or(RfqError::StateViolation { action, state })
    }

    fn release_taker(&mut self, idx: usize, custody: &mut Custody, now: DateTime<Utc>) -> Result<()> {
        let rfq_id = self.rfq.id;
        let quote = &mut self.quotes[idx];
        custody.release_bond(rfq_id, quote.taker, now)?;
        quote.bond_refunded_at = Some(now);
        Ok(())
    }

    fn slash_taker(&self, idx: usize, custody: &mut Custody, now: DateTime<Utc>) -> Result<()> {
        custody.slash_bond(self.rfq.id, self.quotes[idx].taker, now)?;
        Ok(())
    }

    fn apply(&mut self, to: RfqState, now: DateTime<Utc>) -> Result<Transition> {
        let transition = self.rfq.transition_to(to, now).inspect_err(|err| {
            tracing::error!(rfq = %self.rfq.id, error = %err, "illegal transition");
        })?;
        tracing::info!(rfq = %transition.rfq_id, from = %transition.from, to = %transition.to, "rfq transition");
        Ok(transition)
    }

    /// Move to a terminal state and check that every bond was resolved.
    fn finish(&mut self, to: RfqState, custody: &Custody, now: DateTime<Utc>) -> Result<Transition> {
        let transition = self.apply(to, now)?;
        let totals = custody.bonds.verify_conserved(self.rfq.id)?;
        tracing::debug!(
            rfq = %self.rfq.id,
            released = %totals.released,
            slashed = %totals.slashed,
            "bonds settled"
        );
        Ok(transition)
    }
}
