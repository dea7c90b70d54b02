//! Globally unique identifiers used throughout the RFQ engine.
//!
//! Entity IDs (RFQs, quotes, settlements, rewards) use UUIDv7 so that
//! listings sort by creation time. Participants are opaque UUIDs supplied
//! by the caller; the engine never mints them.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RfqId
// ---------------------------------------------------------------------------

/// Globally unique RFQ identifier. Uses UUIDv7 for time-ordered sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct RfqId(pub Uuid);

impl RfqId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Extract the embedded timestamp (milliseconds since UNIX epoch) from UUIDv7.
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        let bytes = self.0.as_bytes();
        u64::from_be_bytes([
            0, 0, bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5],
        ])
    }
}

impl Default for RfqId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RfqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rfq:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// QuoteId
// ---------------------------------------------------------------------------

/// Unique identifier for a committed quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct QuoteId(pub Uuid);

impl QuoteId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for QuoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "quote:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SettlementId
// ---------------------------------------------------------------------------

/// Unique identifier for the two-sided funding record of a selected quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SettlementId(pub Uuid);

impl SettlementId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SettlementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SettlementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "settlement:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RewardId
// ---------------------------------------------------------------------------

/// Unique identifier for a facilitator fee-share credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct RewardId(pub Uuid);

impl RewardId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RewardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RewardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reward:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ParticipantId
// ---------------------------------------------------------------------------

/// Identity of an acting party: maker, taker, facilitator or the treasury.
///
/// Every core operation takes the caller's `ParticipantId` explicitly and
/// authorizes against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ParticipantId(pub Uuid);

impl ParticipantId {
    /// A fresh random-ish participant (UUIDv7). Mostly useful in tests.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// The default protocol treasury account (nil UUID).
    #[must_use]
    pub const fn treasury() -> Self {
        Self(Uuid::nil())
    }

    /// First 8 hex chars, for compact log fields.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0.as_bytes()[..4])
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AssetPair
// ---------------------------------------------------------------------------

/// A base/quote pair (e.g., wSOL/USDC).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AssetPair {
    pub base: String,
    pub quote: String,
}

impl AssetPair {
    #[must_use]
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    #[must_use]
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }
}

impl fmt::Display for AssetPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfq_id_uniqueness() {
        let a = RfqId::new();
        let b = RfqId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn rfq_id_ordering() {
        let a = RfqId::new();
        let b = RfqId::new();
        assert!(a < b);
    }

    #[test]
    #[allow(clippy::cast_possible_truncation)]
    fn rfq_id_timestamp_extraction() {
        let before = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        let id = RfqId::new();
        let after = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        let ts = id.timestamp_ms();
        assert!(
            ts >= before && ts <= after,
            "ts={ts}, before={before}, after={after}"
        );
    }

    #[test]
    fn treasury_is_nil_and_stable() {
        assert_eq!(ParticipantId::treasury(), ParticipantId::treasury());
        assert!(ParticipantId::treasury().0.is_nil());
        assert_ne!(ParticipantId::new(), ParticipantId::treasury());
    }

    #[test]
    fn display_prefixes() {
        assert!(RfqId::new().to_string().starts_with("rfq:"));
        assert!(QuoteId::new().to_string().starts_with("quote:"));
        assert!(SettlementId::new().to_string().starts_with("settlement:"));
        assert!(RewardId::new().to_string().starts_with("reward:"));
    }

    #[test]
    fn participant_short_is_eight_hex_chars() {
        let p = ParticipantId::from_bytes([0xab; 16]);
        assert_eq!(p.short(), "abababab");
    }

    #[test]
    fn asset_pair_symbol() {
        let pair = AssetPair::new("wSOL", "USDC");
        assert_eq!(pair.symbol(), "wSOL/USDC");
        assert_eq!(pair.to_string(), "wSOL/USDC");
    }

    #[test]
    fn serde_roundtrips() {
        let id = RfqId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: RfqId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);

        let pair = AssetPair::new("JUP", "USDC");
        let json = serde_json::to_string(&pair).unwrap();
        let back: AssetPair = serde_json::from_str(&json).unwrap();
        assert_eq!(pair, back);
    }
}
