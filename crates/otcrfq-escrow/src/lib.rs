//! # otcrfq-escrow
//!
//! **Custody plane**: participant balances, RFQ bonds, and the
//! commit-reveal commitment store.
//!
//! ## Architecture
//!
//! 1. **BalanceManager**: tracks available/frozen balances per (participant, asset)
//! 2. **BondLedger**: freezes collateral into per-(RFQ, participant) bonds and
//!    resolves each bond exactly once (release or slash to the treasury)
//! 3. **Custody**: the two above behind a single owner
//! 4. **CommitmentBook**: one RFQ's commitments in arrival order, sealed when
//!    the commit window closes
//! 5. **CommitRegistry**: engine-wide guard against commitment-hash reuse
//!
//! ## Commit Flow
//!
//! ```text
//! commit → CommitmentBook.check_admission() → CommitRegistry.check()
//!        → Custody.lock_bond() → CommitRegistry.claim() → CommitmentBook.push()
//! ```

pub mod balance_manager;
pub mod bond_ledger;
pub mod commitment_store;
pub mod custody;

pub use balance_manager::BalanceManager;
pub use bond_ledger::BondLedger;
pub use commitment_store::{CommitRegistry, Commitment, CommitmentBook};
pub use custody::Custody;
