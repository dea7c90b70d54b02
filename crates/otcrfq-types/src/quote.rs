//! Quotes and the commit-reveal primitives.
//!
//! A taker first commits `SHA-256(domain || rfq || taker || quote asset ||
//! amount || bond || fee || nonce)` and only later reveals `(amount, nonce)`.
//! The quote amount stays `None` on the [`Quote`] until the reveal has been
//! checked against the stored hash.

use std::fmt;

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{ParticipantId, QuoteId, Result, RfqError, RfqId, RfqTerms, constants};

/// Binding, hiding commitment to a quote amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitHash(pub [u8; 32]);

impl CommitHash {
    /// Compute the commitment for `quote_amount` under `nonce`.
    ///
    /// Bond and fee are part of the preimage so a commitment cannot be
    /// carried over to an RFQ with different economics.
    #[must_use]
    pub fn compute(
        rfq_id: RfqId,
        taker: ParticipantId,
        terms: &RfqTerms,
        quote_amount: u64,
        nonce: &Nonce,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(constants::COMMIT_DOMAIN);
        hasher.update(rfq_id.0.as_bytes());
        hasher.update(taker.0.as_bytes());
        hasher.update(terms.pair.quote.as_bytes());
        hasher.update(quote_amount.to_le_bytes());
        hasher.update(terms.bond_amount.to_le_bytes());
        hasher.update(terms.fee_amount.to_le_bytes());
        hasher.update(nonce.0);
        Self(hasher.finalize().into())
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// Secret salt chosen by the taker at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nonce(pub [u8; constants::NONCE_LEN]);

#[cfg(any(test, feature = "test-helpers"))]
impl Nonce {
    /// Random nonce for tests.
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random())
    }
}

/// Attestation of the taker's available liquidity.
///
/// Opaque to the engine unless a liquidity-guard key is configured, in
/// which case it must be an ed25519 signature over the commitment hash.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LiquidityProof(pub Vec<u8>);

impl LiquidityProof {
    /// Verify the guard's signature over `hash`.
    pub fn verify(&self, guard_key: &[u8; 32], hash: &CommitHash) -> Result<()> {
        let invalid = |reason: String| RfqError::InvalidLiquidityProof { reason };
        let key = VerifyingKey::from_bytes(guard_key)
            .map_err(|e| invalid(format!("bad guard key: {e}")))?;
        let signature =
            Signature::from_slice(&self.0).map_err(|e| invalid(format!("malformed: {e}")))?;
        key.verify(&hash.0, &signature)
            .map_err(|e| invalid(format!("signature rejected: {e}")))
    }
}

/// One taker's bid against an RFQ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub rfq_id: RfqId,
    pub taker: ParticipantId,
    pub commit_hash: CommitHash,
    pub liquidity_proof: LiquidityProof,
    pub committed_at: DateTime<Utc>,
    /// Arrival order at the RFQ's serialization point (0-based).
    pub sequence: u64,
    /// `None` until revealed.
    pub quote_amount: Option<u64>,
    pub revealed_at: Option<DateTime<Utc>>,
    pub selected: bool,
    /// When the taker's bond was released (refunded).
    pub bond_refunded_at: Option<DateTime<Utc>>,
    /// Set on the selected quote: funding must complete before this.
    pub max_funding_deadline: Option<DateTime<Utc>>,
}

impl Quote {
    #[must_use]
    pub fn committed(
        rfq_id: RfqId,
        taker: ParticipantId,
        commit_hash: CommitHash,
        liquidity_proof: LiquidityProof,
        committed_at: DateTime<Utc>,
        sequence: u64,
    ) -> Self {
        Self {
            id: QuoteId::new(),
            rfq_id,
            taker,
            commit_hash,
            liquidity_proof,
            committed_at,
            sequence,
            quote_amount: None,
            revealed_at: None,
            selected: false,
            bond_refunded_at: None,
            max_funding_deadline: None,
        }
    }

    #[must_use]
    pub fn is_revealed(&self) -> bool {
        self.quote_amount.is_some()
    }

    /// Quote units per base unit, once revealed.
    #[must_use]
    pub fn implied_price(&self, base_amount: u64) -> Option<Decimal> {
        let amount = self.quote_amount?;
        Decimal::from(amount).checked_div(Decimal::from(base_amount))
    }
}
