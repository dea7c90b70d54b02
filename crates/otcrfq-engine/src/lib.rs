//! # otcrfq-engine
//!
//! **Commit-reveal RFQ auction engine.**
//!
//! A maker posts an RFQ, takers commit sealed bids behind a bond, reveal
//! them once the commit window closes, and the maker explicitly selects
//! one. The selected pair then funds both legs and settles atomically.
//!
//! - [`RfqMachine`]: one RFQ, its quotes and settlement; the only writer of
//!   RFQ state
//! - [`AuctionEngine`]: concurrent registry of RFQs over shared custody,
//!   with per-RFQ locks and an idempotent expiry sweep
//! - [`rank_quotes`]: advisory best-price ordering of revealed quotes
//!
//! Time never advances inside the engine on its own: phase deadlines are
//! enforced when an operation arrives and by [`AuctionEngine::expire_sweep`].

pub mod engine;
pub mod machine;
pub mod query;

pub use engine::AuctionEngine;
pub use machine::RfqMachine;
pub use query::{RankedQuote, RfqFilter, rank_quotes};
