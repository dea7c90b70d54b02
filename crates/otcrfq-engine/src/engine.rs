//! The auction engine: registry of RFQs plus the shared custody.
//!
//! ## Locking
//!
//! Every RFQ sits behind its own `Mutex`, so work on different RFQs only
//! meets in the short custody section. Locks are always taken in this order:
//!
//! ```text
//! RFQ machine -> accounts (custody + supply) -> commit registry -> rewards
//! ```
//!
//! The index maps (`rfqs`, `quotes`, `settlements`, `archive`) are only held
//! long enough to clone an `Arc` or insert an entry, never while waiting for
//! an RFQ lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use otcrfq_escrow::{CommitRegistry, Custody};
use otcrfq_settlement::{RewardBook, SettlementCoordinator, SupplyConservation};
use otcrfq_types::{
    BalanceEntry, Bond, BondTotals, Clock, CommitHash, EngineConfig, FacilitatorReward, FundingSide,
    LiquidityProof, Nonce, ParticipantId, Quote, QuoteId, Result, RewardId, Rfq, RfqError, RfqId,
    RfqTerms, RfqTermsUpdate, Settlement, SettlementId, SystemClock, Transition,
};
use parking_lot::{Mutex, RwLock};

use crate::machine::RfqMachine;
use crate::query::{RankedQuote, RfqFilter, rank_quotes};

type Slot = Arc<Mutex<RfqMachine>>;

/// Balances and the external-flow tracker move together.
struct Accounts {
    custody: Custody,
    supply: SupplyConservation,
}

impl Accounts {
    fn check_supply(&self) -> Result<()> {
        self.supply.verify_balances(&self.custody.balances)
    }
}

pub struct AuctionEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    coordinator: SettlementCoordinator,
    rfqs: RwLock<HashMap<RfqId, Slot>>,
    /// Terminal RFQs moved out of the live set.
    archive: RwLock<HashMap<RfqId, Slot>>,
    quotes: RwLock<HashMap<QuoteId, RfqId>>,
    settlements: RwLock<HashMap<SettlementId, RfqId>>,
    accounts: Mutex<Accounts>,
    registry: Mutex<CommitRegistry>,
    rewards: Mutex<RewardBook>,
}

impl AuctionEngine {
    /// Build an engine. Fails if the configuration is inconsistent.
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            collateral = %config.collateral_asset,
            treasury = %config.treasury,
            facilitator_fee_bps = config.facilitator_fee_bps,
            max_commits = config.max_commits_per_rfq,
            liquidity_guard = config.liquidity_guard_key.is_some(),
            "auction engine started"
        );
        Ok(Self {
            coordinator: SettlementCoordinator::new(config.clone()),
            accounts: Mutex::new(Accounts {
                custody: Custody::from_config(&config),
                supply: SupplyConservation::new(),
            }),
            config,
            clock,
            rfqs: RwLock::new(HashMap::new()),
            archive: RwLock::new(HashMap::new()),
            quotes: RwLock::new(HashMap::new()),
            settlements: RwLock::new(HashMap::new()),
            registry: Mutex::new(CommitRegistry::new()),
            rewards: Mutex::new(RewardBook::new()),
        })
    }

    pub fn with_system_clock(config: EngineConfig) -> Result<Self> {
        Self::new(config, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // =================================================================
    // Accounts
    // =================================================================

    pub fn deposit(&self, who: ParticipantId, asset: &str, amount: u64) -> Result<BalanceEntry> {
        if amount == 0 {
            return Err(RfqError::ZeroAmount { field: "amount" });
        }
        let mut accounts = self.accounts.lock();
        accounts.custody.balances.deposit(who, asset, amount)?;
        accounts.supply.record_deposit(asset, amount);
        tracing::debug!(participant = %who, asset, amount, "deposit");
        Ok(accounts.custody.balance(who, asset))
    }

    /// Withdraw from the available balance. Frozen funds stay put.
    pub fn withdraw(&self, who: ParticipantId, asset: &str, amount: u64) -> Result<BalanceEntry> {
        if amount == 0 {
            return Err(RfqError::ZeroAmount { field: "amount" });
        }
        let mut accounts = self.accounts.lock();
        accounts.custody.balances.withdraw(who, asset, amount)?;
        accounts.supply.record_withdrawal(asset, amount);
        tracing::debug!(participant = %who, asset, amount, "withdrawal");
        Ok(accounts.custody.balance(who, asset))
    }

    #[must_use]
    pub fn balance(&self, who: ParticipantId, asset: &str) -> BalanceEntry {
        self.accounts.lock().custody.balance(who, asset)
    }

    /// Check that balances add up to deposits minus withdrawals for every asset.
    pub fn verify_supply(&self) -> Result<()> {
        self.accounts.lock().check_supply()
    }

    #[must_use]
    pub fn bond(&self, rfq_id: RfqId, owner: ParticipantId) -> Option<Bond> {
        self.accounts.lock().custody.bonds.get(rfq_id, owner).cloned()
    }

    #[must_use]
    pub fn bond_totals(&self, rfq_id: RfqId) -> BondTotals {
        self.accounts.lock().custody.bonds.totals(rfq_id)
    }

    // =================================================================
    // Draft lifecycle
    // =================================================================

    /// Create an RFQ in Draft. Nothing is locked until it opens.
    pub fn create_draft(&self, maker: ParticipantId, terms: RfqTerms) -> Result<Rfq> {
        terms.validate(&self.config)?;
        let rfq = Rfq::draft(maker, terms, self.now());
        let snapshot = rfq.clone();
        let machine = RfqMachine::new(rfq, self.config.max_commits_per_rfq);
        self.rfqs
            .write()
            .insert(snapshot.id, Arc::new(Mutex::new(machine)));
        tracing::info!(rfq = %snapshot.id, maker = %maker, pair = %snapshot.pair(), "draft created");
        Ok(snapshot)
    }

    pub fn update_draft(
        &self,
        rfq_id: RfqId,
        caller: ParticipantId,
        update: &RfqTermsUpdate,
    ) -> Result<Rfq> {
        let slot = self.live(rfq_id)?;
        let mut machine = slot.lock();
        machine.update_draft(caller, update, &self.config)?;
        Ok(machine.rfq().clone())
    }

    pub fn open_rfq(&self, rfq_id: RfqId, caller: ParticipantId) -> Result<Rfq> {
        let slot = self.live(rfq_id)?;
        let mut machine = slot.lock();
        let now = self.now();
        let mut accounts = self.accounts.lock();
        machine.open(caller, &self.config, &mut accounts.custody, now)?;
        Ok(machine.rfq().clone())
    }

    pub fn cancel_draft(&self, rfq_id: RfqId, caller: ParticipantId) -> Result<Rfq> {
        let slot = self.live(rfq_id)?;
        let mut machine = slot.lock();
        machine.cancel_draft(caller, self.now())?;
        Ok(machine.rfq().clone())
    }

    // =================================================================
    // Commit-reveal
    // =================================================================

    pub fn commit_quote(
        &self,
        rfq_id: RfqId,
        taker: ParticipantId,
        hash: CommitHash,
        proof: LiquidityProof,
    ) -> Result<Quote> {
        let slot = self.live(rfq_id)?;
        let mut machine = slot.lock();
        let now = self.now();
        machine.check_commit(taker, &hash, &proof, &self.config, now)?;
        let quote = {
            let mut accounts = self.accounts.lock();
            let mut registry = self.registry.lock();
            machine.commit(taker, hash, proof, &mut accounts.custody, &mut registry, now)?
        };
        self.quotes.write().insert(quote.id, rfq_id);
        Ok(quote)
    }

    pub fn reveal_quote(
        &self,
        rfq_id: RfqId,
        quote_id: QuoteId,
        taker: ParticipantId,
        amount: u64,
        nonce: &Nonce,
    ) -> Result<Quote> {
        let slot = self.live(rfq_id)?;
        let mut machine = slot.lock();
        machine.reveal(quote_id, taker, amount, nonce, self.now())
    }

    /// Maker picks a revealed quote; opens the settlement.
    pub fn select_quote(
        &self,
        rfq_id: RfqId,
        quote_id: QuoteId,
        caller: ParticipantId,
    ) -> Result<Settlement> {
        let slot = self.live(rfq_id)?;
        let mut machine = slot.lock();
        let now = self.now();
        let settlement = {
            let mut accounts = self.accounts.lock();
            machine.select(quote_id, caller, &mut accounts.custody, &self.coordinator, now)?
        };
        self.settlements.write().insert(settlement.id, rfq_id);
        Ok(settlement)
    }

    // =================================================================
    // Settlement
    // =================================================================

    /// Maker delivers the base amount.
    pub fn fund_maker_side(
        &self,
        settlement_id: SettlementId,
        caller: ParticipantId,
        amount: u64,
    ) -> Result<Settlement> {
        self.fund(settlement_id, FundingSide::Maker, caller, amount, 0)
    }

    /// Taker delivers the quote amount plus the fee.
    pub fn fund_taker_side(
        &self,
        settlement_id: SettlementId,
        caller: ParticipantId,
        amount: u64,
        fee: u64,
    ) -> Result<Settlement> {
        self.fund(settlement_id, FundingSide::Taker, caller, amount, fee)
    }

    fn fund(
        &self,
        settlement_id: SettlementId,
        side: FundingSide,
        caller: ParticipantId,
        amount: u64,
        fee: u64,
    ) -> Result<Settlement> {
        let slot = self.settlement_slot(settlement_id)?;
        let mut machine = slot.lock();
        let now = self.now();
        let mut accounts = self.accounts.lock();
        machine.fund(
            side,
            caller,
            amount,
            fee,
            &mut accounts.custody,
            &self.coordinator,
            now,
        )
    }

    /// Execute a fully funded settlement. Anyone may trigger it.
    pub fn finalize_settlement(&self, settlement_id: SettlementId) -> Result<Settlement> {
        let slot = self.settlement_slot(settlement_id)?;
        let mut machine = slot.lock();
        let now = self.now();
        let mut accounts = self.accounts.lock();
        let mut rewards = self.rewards.lock();
        machine.finalize(&mut accounts.custody, &mut rewards, &self.coordinator, now)?;
        accounts.check_supply()?;
        machine
            .settlement()
            .cloned()
            .ok_or(RfqError::SettlementNotFound(settlement_id))
    }

    pub fn claim_facilitator_reward(
        &self,
        reward_id: RewardId,
        caller: ParticipantId,
    ) -> Result<FacilitatorReward> {
        let now = self.now();
        let mut accounts = self.accounts.lock();
        let mut rewards = self.rewards.lock();
        rewards.claim(&mut accounts.custody.balances, reward_id, caller, now)
    }

    // =================================================================
    // Expiry
    // =================================================================

    /// Apply every time-driven transition due at `now`.
    ///
    /// Visits each live RFQ once under its own lock. An RFQ that fails is
    /// skipped so the others still progress; the first failure is returned
    /// after the pass. Running it twice at the same `now` changes nothing.
    pub fn expire_sweep(&self, now: DateTime<Utc>) -> Result<Vec<Transition>> {
        let slots: Vec<Slot> = self.rfqs.read().values().cloned().collect();
        let mut applied = Vec::new();
        let mut first_err = None;

        for slot in slots {
            let mut machine = slot.lock();
            let mut accounts = self.accounts.lock();
            let mut rewards = self.rewards.lock();
            match machine.sweep(now, &mut accounts.custody, &mut rewards, &self.coordinator) {
                Ok(Some(transition)) => applied.push(transition),
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(rfq = %machine.rfq().id, error = %err, "sweep failed");
                    first_err.get_or_insert(err);
                }
            }
        }

        applied.sort_by_key(|t| t.rfq_id);
        if !applied.is_empty() {
            if let Err(err) = self.verify_supply() {
                first_err.get_or_insert(err);
            }
        }
        tracing::info!(at = %now, transitions = applied.len(), "expiry sweep");
        match first_err {
            Some(err) => Err(err),
            None => Ok(applied),
        }
    }

    /// [`Self::expire_sweep`] at the engine clock's current time.
    pub fn sweep(&self) -> Result<Vec<Transition>> {
        self.expire_sweep(self.now())
    }

    /// Move a terminal RFQ out of the live set. It stays readable.
    pub fn archive(&self, rfq_id: RfqId) -> Result<Rfq> {
        let slot = self.live(rfq_id)?;
        let snapshot = {
            let machine = slot.lock();
            let state = machine.rfq().state();
            if !state.is_terminal() {
                return Err(RfqError::NotTerminal { state });
            }
            machine.rfq().clone()
        };
        // Insert before removing: readers look in `rfqs`, then `archive`.
        self.archive.write().insert(rfq_id, slot);
        self.rfqs.write().remove(&rfq_id);
        tracing::debug!(rfq = %rfq_id, state = %snapshot.state(), "rfq archived");
        Ok(snapshot)
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Live RFQs matching `filter`, ordered by id.
    #[must_use]
    pub fn list_rfqs(&self, filter: &RfqFilter) -> Vec<Rfq> {
        let slots: Vec<Slot> = self.rfqs.read().values().cloned().collect();
        let mut found: Vec<Rfq> = slots
            .iter()
            .filter_map(|slot| {
                let machine = slot.lock();
                filter.matches(&machine).then(|| machine.rfq().clone())
            })
            .collect();
        found.sort_by_key(|rfq| rfq.id);
        found
    }

    /// Live or archived RFQ.
    pub fn get_rfq(&self, rfq_id: RfqId) -> Result<Rfq> {
        Ok(self.any(rfq_id)?.lock().rfq().clone())
    }

    #[must_use]
    pub fn get_quote(&self, quote_id: QuoteId) -> Option<Quote> {
        let rfq_id = self.quotes.read().get(&quote_id).copied()?;
        let slot = self.any(rfq_id).ok()?;
        let machine = slot.lock();
        machine.quote(quote_id).cloned()
    }

    pub fn get_settlement(&self, settlement_id: SettlementId) -> Result<Settlement> {
        let slot = self.settlement_slot(settlement_id)?;
        let machine = slot.lock();
        machine
            .settlement()
            .cloned()
            .ok_or(RfqError::SettlementNotFound(settlement_id))
    }

    /// Quotes of one RFQ in commit order.
    pub fn quotes_for_rfq(&self, rfq_id: RfqId) -> Result<Vec<Quote>> {
        Ok(self.any(rfq_id)?.lock().quotes().to_vec())
    }

    /// Every quote a taker has committed, oldest first.
    #[must_use]
    pub fn quotes_by_taker(&self, taker: ParticipantId) -> Vec<Quote> {
        let index: Vec<(QuoteId, RfqId)> = self
            .quotes
            .read()
            .iter()
            .map(|(q, r)| (*q, *r))
            .collect();
        let mut found: Vec<Quote> = index
            .into_iter()
            .filter_map(|(quote_id, rfq_id)| {
                let slot = self.any(rfq_id).ok()?;
                let machine = slot.lock();
                machine.quote(quote_id).filter(|q| q.taker == taker).cloned()
            })
            .collect();
        found.sort_by_key(|q| (q.committed_at, q.id));
        found
    }

    pub fn ranked_quotes(&self, rfq_id: RfqId) -> Result<Vec<RankedQuote>> {
        let slot = self.any(rfq_id)?;
        let machine = slot.lock();
        Ok(rank_quotes(machine.quotes(), machine.rfq().terms.base_amount))
    }

    #[must_use]
    pub fn rewards_for(&self, facilitator: ParticipantId) -> Vec<FacilitatorReward> {
        self.rewards.lock().rewards_for(facilitator)
    }

    // =================================================================
    // Internal
    // =================================================================

    fn live(&self, rfq_id: RfqId) -> Result<Slot> {
        self.rfqs
            .read()
            .get(&rfq_id)
            .cloned()
            .ok_or(RfqError::RfqNotFound(rfq_id))
    }

    fn any(&self, rfq_id: RfqId) -> Result<Slot> {
        if let Some(slot) = self.rfqs.read().get(&rfq_id) {
            return Ok(Arc::clone(slot));
        }
        self.archive
            .read()
            .get(&rfq_id)
            .cloned()
            .ok_or(RfqError::RfqNotFound(rfq_id))
    }

    fn settlement_slot(&self, settlement_id: SettlementId) -> Result<Slot> {
        let rfq_id = self
            .settlements
            .read()
            .get(&settlement_id)
            .copied()
            .ok_or(RfqError::SettlementNotFound(settlement_id))?;
        self.any(rfq_id)
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::{Signer, SigningKey};
    use otcrfq_types::{ManualClock, RfqState};

    use super::*;

    fn engine() -> (AuctionEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let engine = AuctionEngine::new(EngineConfig::default(), clock.clone()).unwrap();
        (engine, clock)
    }

    #[test]
    fn rejects_bad_config() {
        let config = EngineConfig {
            facilitator_fee_bps: 10_001,
            ..EngineConfig::default()
        };
        assert!(AuctionEngine::with_system_clock(config).is_err());
    }

    #[test]
    fn deposit_withdraw_track_supply() {
        let (engine, _) = engine();
        let alice = ParticipantId::new();
        engine.deposit(alice, "USDC", 1_000).unwrap();
        let bal = engine.withdraw(alice, "USDC", 400).unwrap();
        assert_eq!(bal.available, 600);
        engine.verify_supply().unwrap();

        assert!(matches!(
            engine.deposit(alice, "USDC", 0),
            Err(RfqError::ZeroAmount { field: "amount" })
        ));
        assert!(matches!(
            engine.withdraw(alice, "USDC", 601),
            Err(RfqError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn draft_is_listed_and_archivable_after_cancel() {
        let (engine, _) = engine();
        let maker = ParticipantId::new();
        let rfq = engine.create_draft(maker, RfqTerms::dummy()).unwrap();
        assert_eq!(rfq.state(), RfqState::Draft);

        let err = engine.archive(rfq.id).unwrap_err();
        assert!(matches!(err, RfqError::NotTerminal { state: RfqState::Draft }));

        engine.cancel_draft(rfq.id, maker).unwrap();
        engine.archive(rfq.id).unwrap();
        assert!(engine.list_rfqs(&RfqFilter::default()).is_empty());
        assert_eq!(engine.get_rfq(rfq.id).unwrap().state(), RfqState::Ignored);
        assert!(matches!(
            engine.open_rfq(rfq.id, maker),
            Err(RfqError::RfqNotFound(_))
        ));
    }

    #[test]
    fn archiving_never_hides_the_rfq() {
        let (engine, _) = engine();
        let maker = ParticipantId::new();
        let drafts: Vec<Rfq> = (0..32)
            .map(|_| {
                let rfq = engine.create_draft(maker, RfqTerms::dummy()).unwrap();
                engine.cancel_draft(rfq.id, maker).unwrap();
                rfq
            })
            .collect();

        std::thread::scope(|s| {
            s.spawn(|| {
                for rfq in &drafts {
                    engine.archive(rfq.id).unwrap();
                }
            });
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..50 {
                        for rfq in &drafts {
                            assert_eq!(engine.get_rfq(rfq.id).unwrap().state(), RfqState::Ignored);
                        }
                    }
                });
            }
        });
        assert!(engine.list_rfqs(&RfqFilter::default()).is_empty());
    }

    #[test]
    fn rejected_proof_locks_nothing() {
        let guard = SigningKey::from_bytes(&[7; 32]);
        let config = EngineConfig {
            liquidity_guard_key: Some(guard.verifying_key().to_bytes()),
            ..EngineConfig::default()
        };
        let engine = AuctionEngine::new(config, Arc::new(ManualClock::starting_now())).unwrap();
        let maker = ParticipantId::new();
        let taker = ParticipantId::new();
        engine.deposit(maker, "USDC", 5_000).unwrap();
        engine.deposit(taker, "USDC", 5_000).unwrap();
        let rfq = engine.create_draft(maker, RfqTerms::dummy()).unwrap();
        engine.open_rfq(rfq.id, maker).unwrap();

        let hash = CommitHash::compute(rfq.id, taker, &rfq.terms, 1_050, &Nonce::random());
        let err = engine
            .commit_quote(rfq.id, taker, hash, LiquidityProof(vec![0; 64]))
            .unwrap_err();
        assert!(matches!(err, RfqError::InvalidLiquidityProof { .. }));
        assert!(engine.bond(rfq.id, taker).is_none());
        assert_eq!(engine.balance(taker, "USDC").frozen, 0);

        // The same hash is still usable with a valid proof.
        let proof = LiquidityProof(guard.sign(&hash.0).to_bytes().to_vec());
        engine.commit_quote(rfq.id, taker, hash, proof).unwrap();
        assert_eq!(engine.balance(taker, "USDC").frozen, 5_000);
    }

    #[test]
    fn unknown_ids() {
        let (engine, _) = engine();
        assert!(matches!(engine.get_rfq(RfqId::new()), Err(RfqError::RfqNotFound(_))));
        assert!(engine.get_quote(QuoteId::new()).is_none());
        assert!(matches!(
            engine.get_settlement(SettlementId::new()),
            Err(RfqError::SettlementNotFound(_))
        ));
        assert!(matches!(
            engine.finalize_settlement(SettlementId::new()),
            Err(RfqError::SettlementNotFound(_))
        ));
    }

    #[test]
    fn list_filters_by_state_and_participant() {
        let (engine, _) = engine();
        let alice = ParticipantId::new();
        let bob = ParticipantId::new();
        engine.deposit(alice, "USDC", 5_000).unwrap();
        let a = engine.create_draft(alice, RfqTerms::dummy()).unwrap();
        engine.create_draft(bob, RfqTerms::dummy()).unwrap();
        engine.open_rfq(a.id, alice).unwrap();

        let open = engine.list_rfqs(&RfqFilter::default().with_state(RfqState::Open));
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, a.id);

        let bobs = engine.list_rfqs(&RfqFilter::default().with_participant(bob));
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].maker, bob);
        assert_eq!(engine.list_rfqs(&RfqFilter::default()).len(), 2);
    }
}
