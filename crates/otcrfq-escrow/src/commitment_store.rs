//! Commitment store.
//!
//! [`CommitmentBook`] collects one RFQ's commitments in arrival order while
//! the commit window is open; once sealed, nothing more can be added.
//! [`CommitRegistry`] is engine-wide and refuses a commitment hash that
//! was ever used before, on any RFQ.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use otcrfq_types::{CommitHash, ParticipantId, QuoteId, Result, RfqError};

/// One stored commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitment {
    pub quote_id: QuoteId,
    pub taker: ParticipantId,
    pub hash: CommitHash,
    /// 0-based arrival order within the RFQ.
    pub sequence: u64,
    pub committed_at: DateTime<Utc>,
}

/// Commitments of a single RFQ.
pub struct CommitmentBook {
    /// Commitments in arrival order.
    entries: Vec<Commitment>,
    by_quote: HashMap<QuoteId, usize>,
    by_taker: HashMap<ParticipantId, QuoteId>,
    sealed: bool,
    /// Maximum number of commitments before the book is full.
    max_commits: usize,
}

impl CommitmentBook {
    #[must_use]
    pub fn new(max_commits: usize) -> Self {
        Self {
            entries: Vec::new(),
            by_quote: HashMap::new(),
            by_taker: HashMap::new(),
            sealed: false,
            max_commits,
        }
    }

    /// Check that `taker` could commit now, without recording anything.
    ///
    /// # Errors
    /// - `CommitWindowClosed` if the book has been sealed
    /// - `DuplicateCommit` if the taker already committed
    /// - `CommitLimitReached` if the book is at capacity
    pub fn check_admission(&self, taker: ParticipantId) -> Result<()> {
        if self.sealed {
            return Err(RfqError::CommitWindowClosed);
        }
        if self.by_taker.contains_key(&taker) {
            return Err(RfqError::DuplicateCommit { taker });
        }
        if self.entries.len() >= self.max_commits {
            return Err(RfqError::CommitLimitReached {
                limit: self.max_commits,
            });
        }
        Ok(())
    }

    /// Record a commitment. The sequence number is its arrival index.
    ///
    /// # Errors
    /// Same as [`check_admission`](Self::check_admission).
    pub fn push(
        &mut self,
        quote_id: QuoteId,
        taker: ParticipantId,
        hash: CommitHash,
        committed_at: DateTime<Utc>,
    ) -> Result<&Commitment> {
        self.check_admission(taker)?;
        let index = self.entries.len();
        self.entries.push(Commitment {
            quote_id,
            taker,
            hash,
            sequence: index as u64,
            committed_at,
        });
        self.by_quote.insert(quote_id, index);
        self.by_taker.insert(taker, quote_id);
        Ok(&self.entries[index])
    }

    /// Seal the book. No more commitments can be added after this.
    /// Sealing twice is a no-op.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Look up a commitment by quote.
    ///
    /// # Errors
    /// Returns `NoSuchCommitment` if the quote never committed here.
    pub fn get(&self, quote_id: QuoteId) -> Result<&Commitment> {
        self.by_quote
            .get(&quote_id)
            .map(|&i| &self.entries[i])
            .ok_or(RfqError::NoSuchCommitment(quote_id))
    }

    /// Check a recomputed hash against the stored commitment.
    ///
    /// # Errors
    /// - `NoSuchCommitment` if the quote never committed here
    /// - `HashMismatch` if `candidate` differs from the stored hash
    pub fn verify(&self, quote_id: QuoteId, candidate: &CommitHash) -> Result<&Commitment> {
        let commitment = self.get(quote_id)?;
        if commitment.hash != *candidate {
            return Err(RfqError::HashMismatch(quote_id));
        }
        Ok(commitment)
    }

    /// The taker's commitment, if any.
    #[must_use]
    pub fn quote_of(&self, taker: ParticipantId) -> Option<QuoteId> {
        self.by_taker.get(&taker).copied()
    }

    /// Commitments in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Commitment> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Engine-wide set of commitment hashes already used.
#[derive(Debug, Default)]
pub struct CommitRegistry {
    used: HashSet<CommitHash>,
}

impl CommitRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns `DuplicateCommitHash` if the hash was already claimed.
    pub fn check(&self, hash: &CommitHash) -> Result<()> {
        if self.used.contains(hash) {
            return Err(RfqError::DuplicateCommitHash);
        }
        Ok(())
    }

    /// Mark `hash` as used.
    ///
    /// # Errors
    /// Returns `DuplicateCommitHash` if the hash was already claimed.
    pub fn claim(&mut self, hash: CommitHash) -> Result<()> {
        if !self.used.insert(hash) {
            return Err(RfqError::DuplicateCommitHash);
        }
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, hash: &CommitHash) -> bool {
        self.used.contains(hash)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.used.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}
