//! System-wide constants for the RFQ auction engine.

/// Domain separator prefixed to every commitment preimage.
pub const COMMIT_DOMAIN: &[u8] = b"otcrfq:commit:v1:";

/// Length of the reveal nonce (salt) in bytes.
pub const NONCE_LEN: usize = 32;

/// Asset used for bonds and taker fees unless configured otherwise.
pub const DEFAULT_COLLATERAL_ASSET: &str = "USDC";

/// Basis-point denominator (100% = 10 000 bps).
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Default facilitator share of the taker fee, in basis points (20%).
pub const DEFAULT_FACILITATOR_FEE_BPS: u16 = 2_000;

/// Maximum commitments accepted per RFQ (default).
pub const DEFAULT_MAX_COMMITS_PER_RFQ: usize = 64;

/// Shortest accepted phase TTL in seconds.
pub const DEFAULT_MIN_PHASE_TTL_SECS: u64 = 1;

/// Longest accepted phase TTL in seconds (7 days).
pub const DEFAULT_MAX_PHASE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Default commit phase TTL in seconds.
pub const DEFAULT_COMMIT_TTL_SECS: u64 = 3600;

/// Default reveal phase TTL in seconds.
pub const DEFAULT_REVEAL_TTL_SECS: u64 = 1800;

/// Default selection phase TTL in seconds.
pub const DEFAULT_SELECTION_TTL_SECS: u64 = 1800;

/// Default funding phase TTL in seconds.
pub const DEFAULT_FUND_TTL_SECS: u64 = 3600;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "otcrfq";
