//! Error types for the RFQ auction engine.
//!
//! All errors use the `OTC_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Validation errors (bad input, rejected before any state change)
//! - 2xx: State violations (wrong lifecycle state or closed window)
//! - 3xx: Integrity errors (commitment binding, liquidity proofs)
//! - 4xx: Resource errors (balances, bonds, funding)
//! - 5xx: Authorization errors
//! - 6xx: Lookup errors
//! - 9xx: Invariant / internal errors

use thiserror::Error;

use crate::{FundingSide, ParticipantId, QuoteId, RewardId, RfqId, RfqState, SettlementId};

/// Coarse classification of an [`RfqError`].
///
/// Callers branch on the kind to decide between "fix the input",
/// "accept the rejection" and "page someone".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    StateViolation,
    Integrity,
    Resource,
    Authorization,
    NotFound,
    Invariant,
}

/// Central error enum for all engine operations.
#[derive(Debug, Error)]
pub enum RfqError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// The RFQ terms failed validation (missing fields, bad values, etc.).
    #[error("OTC_ERR_100: Invalid RFQ terms: {reason}")]
    InvalidTerms { reason: String },

    /// A revealed quote is below the maker's floor.
    #[error("OTC_ERR_101: Quote amount {amount} is below the minimum {minimum}")]
    QuoteBelowMinimum { amount: u64, minimum: u64 },

    /// An amount argument was zero.
    #[error("OTC_ERR_102: Amount for {field} must be greater than zero")]
    ZeroAmount { field: &'static str },

    // =================================================================
    // State Violations (2xx)
    // =================================================================
    /// The operation requires a Draft RFQ.
    #[error("OTC_ERR_200: RFQ is not a draft (state {state})")]
    NotDraft { state: RfqState },

    /// `open` was called on an RFQ that is already open.
    #[error("OTC_ERR_201: RFQ is already open")]
    AlreadyOpen,

    /// The commit TTL has elapsed.
    #[error("OTC_ERR_202: Commit window closed")]
    CommitWindowClosed,

    /// Reveals are only accepted once the commit window has closed.
    #[error("OTC_ERR_203: Reveal window not open yet")]
    RevealWindowNotOpen,

    /// The reveal TTL has elapsed.
    #[error("OTC_ERR_204: Reveal window closed")]
    RevealWindowClosed,

    /// Selection is only accepted once the reveal window has closed.
    #[error("OTC_ERR_205: Selection window not open yet")]
    SelectionWindowNotOpen,

    /// The selection TTL has elapsed.
    #[error("OTC_ERR_206: Selection window closed")]
    SelectionWindowClosed,

    /// A quote has already been selected for this RFQ.
    #[error("OTC_ERR_207: A quote was already selected")]
    AlreadySelected,

    /// Only revealed quotes can be selected.
    #[error("OTC_ERR_208: Quote not revealed: {0}")]
    QuoteNotRevealed(QuoteId),

    /// The quote was already revealed; replays are rejected.
    #[error("OTC_ERR_209: Quote already revealed: {0}")]
    AlreadyRevealed(QuoteId),

    /// The taker already holds a commitment on this RFQ.
    #[error("OTC_ERR_210: Taker {taker} already committed to this RFQ")]
    DuplicateCommit { taker: ParticipantId },

    /// The RFQ reached its maximum number of commitments.
    #[error("OTC_ERR_211: Commit limit of {limit} reached")]
    CommitLimitReached { limit: usize },

    /// Generic transition attempted outside its valid source state.
    #[error("OTC_ERR_212: Cannot {action} while RFQ is {state}")]
    StateViolation { action: &'static str, state: RfqState },

    /// The fund TTL has elapsed.
    #[error("OTC_ERR_213: Funding window closed")]
    FundWindowClosed,

    /// `finalize` requires both sides to have funded.
    #[error("OTC_ERR_214: Settlement not fully funded")]
    NotFullyFunded,

    /// The settlement already reached an outcome.
    #[error("OTC_ERR_215: Settlement already closed: {0}")]
    SettlementClosed(SettlementId),

    /// Archival requires a terminal RFQ.
    #[error("OTC_ERR_216: RFQ is still live (state {state})")]
    NotTerminal { state: RfqState },

    // =================================================================
    // Integrity Errors (3xx)
    // =================================================================
    /// The revealed (amount, nonce) does not hash to the stored commitment.
    #[error("OTC_ERR_300: Reveal does not match commitment for {0}")]
    HashMismatch(QuoteId),

    /// No commitment exists for this quote on this RFQ.
    #[error("OTC_ERR_301: No such commitment: {0}")]
    NoSuchCommitment(QuoteId),

    /// The commitment hash was already used.
    #[error("OTC_ERR_302: Commitment hash already used")]
    DuplicateCommitHash,

    /// The liquidity proof did not verify against the configured guard key.
    #[error("OTC_ERR_303: Invalid liquidity proof: {reason}")]
    InvalidLiquidityProof { reason: String },

    // =================================================================
    // Resource Errors (4xx)
    // =================================================================
    /// Not enough available balance to lock or fund.
    #[error("OTC_ERR_400: Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    /// A bond is already locked for this (RFQ, participant).
    #[error("OTC_ERR_401: Bond already locked for {participant}")]
    AlreadyLocked { participant: ParticipantId },

    /// No locked bond exists for this (RFQ, participant).
    #[error("OTC_ERR_402: No locked bond for {participant}")]
    NotLocked { participant: ParticipantId },

    /// This side of the settlement already funded.
    #[error("OTC_ERR_403: {side} side already funded")]
    AlreadyFunded { side: FundingSide },

    /// A funding amount differs from the agreed amount.
    #[error("OTC_ERR_404: Amount mismatch: expected {expected}, got {actual}")]
    AmountMismatch { expected: u64, actual: u64 },

    /// The reward was already claimed.
    #[error("OTC_ERR_405: Reward already claimed: {0}")]
    RewardAlreadyClaimed(RewardId),

    /// Not enough frozen balance to unfreeze or consume.
    #[error("OTC_ERR_406: Insufficient frozen balance")]
    InsufficientFrozen,

    // =================================================================
    // Authorization Errors (5xx)
    // =================================================================
    /// The caller is not allowed to perform this action.
    #[error("OTC_ERR_500: {participant} is not authorized to {action}")]
    Unauthorized {
        participant: ParticipantId,
        action: &'static str,
    },

    /// A maker cannot quote against its own RFQ.
    #[error("OTC_ERR_501: Maker cannot quote on own RFQ")]
    SelfQuote,

    // =================================================================
    // Lookup Errors (6xx)
    // =================================================================
    #[error("OTC_ERR_600: RFQ not found: {0}")]
    RfqNotFound(RfqId),

    #[error("OTC_ERR_601: Quote not found: {0}")]
    QuoteNotFound(QuoteId),

    #[error("OTC_ERR_602: Settlement not found: {0}")]
    SettlementNotFound(SettlementId),

    #[error("OTC_ERR_603: Reward not found: {0}")]
    RewardNotFound(RewardId),

    // =================================================================
    // Invariant / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("OTC_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("OTC_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, inconsistent values, etc.).
    #[error("OTC_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// Bonds released + slashed != bonds locked at a terminal state.
    #[error("OTC_ERR_903: Bond conservation violated for {rfq}: {reason}")]
    BondConservationViolation { rfq: RfqId, reason: String },

    /// Supply conservation invariant violated: critical safety alert.
    #[error("OTC_ERR_904: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    /// Integer arithmetic overflowed.
    #[error("OTC_ERR_905: Arithmetic overflow")]
    ArithmeticOverflow,

    /// A transition outside the lifecycle graph was attempted.
    #[error("OTC_ERR_906: Illegal transition {from} -> {to}")]
    IllegalTransition { from: RfqState, to: RfqState },
}

impl RfqError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTerms { .. } | Self::QuoteBelowMinimum { .. } | Self::ZeroAmount { .. } => {
                ErrorKind::Validation
            }
            Self::NotDraft { .. }
            | Self::AlreadyOpen
            | Self::CommitWindowClosed
            | Self::RevealWindowNotOpen
            | Self::RevealWindowClosed
            | Self::SelectionWindowNotOpen
            | Self::SelectionWindowClosed
            | Self::AlreadySelected
            | Self::QuoteNotRevealed(_)
            | Self::AlreadyRevealed(_)
            | Self::DuplicateCommit { .. }
            | Self::CommitLimitReached { .. }
            | Self::StateViolation { .. }
            | Self::FundWindowClosed
            | Self::NotFullyFunded
            | Self::SettlementClosed(_)
            | Self::NotTerminal { .. } => ErrorKind::StateViolation,
            Self::HashMismatch(_)
            | Self::NoSuchCommitment(_)
            | Self::DuplicateCommitHash
            | Self::InvalidLiquidityProof { .. } => ErrorKind::Integrity,
            Self::InsufficientFunds { .. }
            | Self::AlreadyLocked { .. }
            | Self::AlreadyFunded { .. }
            | Self::AmountMismatch { .. }
            | Self::RewardAlreadyClaimed(_) => ErrorKind::Resource,
            Self::Unauthorized { .. } | Self::SelfQuote => ErrorKind::Authorization,
            Self::RfqNotFound(_) | Self::SettlementNotFound(_) | Self::RewardNotFound(_) => {
                ErrorKind::NotFound
            }
            // Selecting an unknown quote or releasing an unlocked bond means
            // an upstream invariant already broke.
            Self::QuoteNotFound(_)
            | Self::NotLocked { .. }
            | Self::InsufficientFrozen
            | Self::Internal(_)
            | Self::Serialization(_)
            | Self::Configuration(_)
            | Self::BondConservationViolation { .. }
            | Self::SupplyInvariantViolation { .. }
            | Self::ArithmeticOverflow
            | Self::IllegalTransition { .. } => ErrorKind::Invariant,
        }
    }

    /// Whether this error signals a bug rather than an expected rejection.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Invariant
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, RfqError>;

impl From<serde_json::Error> for RfqError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
