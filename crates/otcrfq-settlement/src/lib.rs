//! # otcrfq-settlement
//!
//! **Settlement plane**: two-sided funding of a selected quote, swap
//! execution, fee split, facilitator rewards, and supply conservation.
//!
//! ## Architecture
//!
//! The settlement plane receives a selected quote from the RFQ state
//! machine and:
//! 1. Opens a [`Settlement`](otcrfq_types::Settlement) with a funding deadline
//! 2. Freezes each side's deposit as it arrives
//! 3. Swaps base ↔ quote once both sides funded, releasing both bonds
//! 4. Splits the taker fee between the treasury and the facilitator
//! 5. Times out settlements whose deadline passed, slashing the missing side
//!
//! [`SupplyConservation`] checks that balances only ever move between
//! accounts: deposits minus withdrawals equals the sum of all balances.

pub mod coordinator;
pub mod rewards;
pub mod supply_conservation;

pub use coordinator::{SettlementCoordinator, SettlementReceipt, TimeoutReport};
pub use rewards::RewardBook;
pub use supply_conservation::SupplyConservation;
