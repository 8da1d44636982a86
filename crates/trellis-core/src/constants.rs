//! ─── Trellis Protocol Constants ─────────────────────────────────────────────
//!
//! Compiled defaults for every protocol parameter. Deployments override
//! them through a `ProtocolParameters` JSON file; the engine itself only
//! ever reads the loaded `ProtocolParameters` value.

// ── Batch limits ─────────────────────────────────────────────────────────────

/// Maximum operations a single anchor string may claim.
pub const MAX_OPERATIONS_PER_BATCH: u64 = 10_000;

/// Per-block operation budget enforced by the throughput limiter.
pub const MAX_OPERATIONS_PER_TRANSACTION_TIME: u64 = 600_000;

/// Operations a writer may anchor without posting a value time lock.
pub const MAX_NUMBER_OF_OPERATIONS_FOR_NO_VALUE_TIME_LOCK: u64 = 100;

// ── File size caps (bytes, compressed) ───────────────────────────────────────

pub const MAX_CORE_INDEX_FILE_SIZE_IN_BYTES: u64 = 1_000_000;
pub const MAX_PROVISIONAL_INDEX_FILE_SIZE_IN_BYTES: u64 = 1_000_000;
pub const MAX_PROOF_FILE_SIZE_IN_BYTES: u64 = 2_500_000;
pub const MAX_CHUNK_FILE_SIZE_IN_BYTES: u64 = 10_000_000;

/// Bound on the decompressed/compressed ratio: the decompressor refuses to
/// inflate past `file size cap × this multiplier`.
pub const ESTIMATED_DECOMPRESSION_MULTIPLIER: u64 = 3;

// ── Field caps ───────────────────────────────────────────────────────────────

/// Maximum canonical size of a single operation delta.
pub const MAX_DELTA_SIZE_IN_BYTES: usize = 1_000;

/// Maximum length of an encoded reveal value.
pub const MAX_ENCODED_REVEAL_VALUE_LENGTH: usize = 50;

/// Maximum length of a CAS URI referenced from an index file.
pub const MAX_CAS_URI_LENGTH: usize = 100;

// ── Hashing ──────────────────────────────────────────────────────────────────

/// SHA-256 in the multihash registry. The only algorithm this protocol
/// version accepts or produces.
pub const SHA256_MULTIHASH_CODE: u64 = 0x12;

// ── Fees / value time locks ──────────────────────────────────────────────────

/// Fraction of the normalized fee charged per batched operation.
pub const NORMALIZED_TO_PER_OPERATION_FEE_FACTOR: f64 = 0.001;

/// Per-operation fee used when sizing value time locks.
pub const NORMALIZED_FEE_TO_PER_OPERATION_FEE_MULTIPLIER: f64 = 0.001;

/// How many per-operation fees of stake each locked operation requires.
pub const VALUE_TIME_LOCK_AMOUNT_MULTIPLIER: f64 = 600.0;

// ── Batch writer ─────────────────────────────────────────────────────────────

/// Ledger confirmations (inclusive of the confirming block) required on the
/// last submitted anchor before the writer submits another.
pub const MIN_CONFIRMATIONS: u64 = 6;

// ── Observer ─────────────────────────────────────────────────────────────────

/// Simultaneous CAS fetches allowed by the download manager.
pub const MAX_CONCURRENT_DOWNLOADS: usize = 20;

/// Base delay for the unresolvable-transaction exponential backoff.
pub const UNRESOLVABLE_TRANSACTION_BASE_RETRY_DELAY_MS: i64 = 60_000;

/// Default page size for `due_for_retry`.
pub const DUE_FOR_RETRY_DEFAULT_LIMIT: usize = 100;
