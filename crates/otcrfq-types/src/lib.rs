//! # otcrfq-types
//!
//! Shared types, errors, and configuration for the **OTC RFQ** auction engine.
//!
//! This crate is the leaf dependency of the workspace: every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`RfqId`], [`QuoteId`], [`SettlementId`], [`RewardId`], [`ParticipantId`], [`AssetPair`]
//! - **RFQ model**: [`Rfq`], [`RfqState`], [`RfqTerms`], [`RfqTermsUpdate`], [`PhaseTtls`], [`Deadlines`], [`Transition`]
//! - **Commit-reveal**: [`Quote`], [`CommitHash`], [`Nonce`], [`LiquidityProof`]
//! - **Collateral**: [`Bond`], [`BondStatus`], [`BondTotals`], [`BalanceEntry`], [`Asset`]
//! - **Settlement**: [`Settlement`], [`FundingSide`], [`SettlementOutcome`], [`FacilitatorReward`]
//! - **Time**: [`Clock`], [`SystemClock`], [`ManualClock`]
//! - **Configuration**: [`EngineConfig`]
//! - **Errors**: [`RfqError`] with `OTC_ERR_` prefix codes, [`ErrorKind`]
//! - **Constants**: system-wide limits and defaults

pub mod balance;
pub mod bond;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod quote;
pub mod reward;
pub mod rfq;
pub mod settlement;

// Re-export all primary types at crate root for ergonomic imports:
//   use otcrfq_types::{Rfq, RfqState, Quote, Bond, ...};

pub use balance::*;
pub use bond::*;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::*;
pub use error::*;
pub use ids::*;
pub use quote::*;
pub use reward::*;
pub use rfq::*;
pub use settlement::*;

// Constants are accessed via `otcrfq_types::constants::FOO`
// (not re-exported to avoid name collisions).
