//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use otcrfq_engine::AuctionEngine;
use otcrfq_types::*;

pub const USDC: &str = "USDC";
pub const WSOL: &str = "wSOL";

/// Install a test-writer subscriber once. `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Every phase lasts `secs` seconds.
pub fn ttls(secs: u64) -> PhaseTtls {
    PhaseTtls {
        commit: Duration::from_secs(secs),
        reveal: Duration::from_secs(secs),
        selection: Duration::from_secs(secs),
        fund: Duration::from_secs(secs),
    }
}

/// 1 000 wSOL for at least 1 000 USDC, bond 5 000, fee 100, 60 s phases.
pub fn terms() -> RfqTerms {
    RfqTerms {
        ttls: ttls(60),
        ..RfqTerms::dummy()
    }
}

pub struct Harness {
    pub engine: AuctionEngine,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        let clock = Arc::new(ManualClock::starting_now());
        let engine = AuctionEngine::new(config, clock.clone()).unwrap();
        Self { engine, clock }
    }

    pub fn advance(&self, secs: u64) {
        self.clock.advance(Duration::from_secs(secs));
    }

    /// A participant holding `usdc` and `wsol`.
    pub fn participant(&self, usdc: u64, wsol: u64) -> ParticipantId {
        let who = ParticipantId::new();
        if usdc > 0 {
            self.engine.deposit(who, USDC, usdc).unwrap();
        }
        if wsol > 0 {
            self.engine.deposit(who, WSOL, wsol).unwrap();
        }
        who
    }

    /// Create and open an RFQ.
    pub fn open(&self, maker: ParticipantId, terms: RfqTerms) -> Rfq {
        let draft = self.engine.create_draft(maker, terms).unwrap();
        self.engine.open_rfq(draft.id, maker).unwrap()
    }

    /// Commit a sealed `amount`; returns the quote and the nonce to reveal with.
    pub fn commit(&self, rfq: &Rfq, taker: ParticipantId, amount: u64) -> (Quote, Nonce) {
        let nonce = Nonce::random();
        let hash = CommitHash::compute(rfq.id, taker, &rfq.terms, amount, &nonce);
        let quote = self
            .engine
            .commit_quote(rfq.id, taker, hash, LiquidityProof::default())
            .unwrap();
        (quote, nonce)
    }

    pub fn reveal(&self, rfq: &Rfq, quote: &Quote, amount: u64, nonce: &Nonce) -> Quote {
        self.engine
            .reveal_quote(rfq.id, quote.id, quote.taker, amount, nonce)
            .unwrap()
    }

    pub fn state(&self, rfq: &Rfq) -> RfqState {
        self.engine.get_rfq(rfq.id).unwrap().state()
    }

    pub fn bond(&self, rfq: &Rfq, who: ParticipantId) -> BondStatus {
        self.engine.bond(rfq.id, who).unwrap().status
    }
}
