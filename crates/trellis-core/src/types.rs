use serde::{Deserialize, Serialize};

/// Base64url-encoded multihash identifying a DID within the method.
/// Computed as `b64url(multihash(canonical(suffix_data)))` at creation.
pub type DidSuffix = String;

/// Position of a transaction in the ledger's total order.
pub type TransactionNumber = u64;

/// Ledger block height at which a transaction was anchored.
pub type TransactionTime = u64;

/// Fee denominated in the ledger's native unit.
pub type Fee = u64;

// ── LedgerTime ───────────────────────────────────────────────────────────────

/// The ledger's current tip as reported by the ledger client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTime {
    /// Block height.
    pub time: TransactionTime,
    /// Hash of the block at `time`, used to detect reorgs across polls.
    pub hash: String,
}

// ── TransactionModel ─────────────────────────────────────────────────────────

/// One anchoring transaction as read back from the ledger.
///
/// `anchor_string` is the raw ledger payload; it is not validated until the
/// transaction processor deserializes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionModel {
    pub transaction_number: TransactionNumber,
    pub transaction_time: TransactionTime,
    /// Hash of the block containing this transaction.
    pub transaction_time_hash: String,
    pub anchor_string: String,
    /// Fee the writer actually paid for this transaction.
    pub transaction_fee_paid: Fee,
    /// Normalized per-operation base fee at `transaction_time`, when the
    /// ledger client has already resolved it.
    pub normalized_transaction_fee: Option<Fee>,
    /// Opaque writer identity, compared against value-time-lock owners.
    pub writer: String,
}

// ── ValueTimeLockModel ───────────────────────────────────────────────────────

/// An on-ledger stake that raises the writer's allowed per-batch operation
/// count. Lifecycle is external; the engine consumes it read-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueTimeLockModel {
    /// Ledger-assigned lock identifier (referenced by `writer_lock_id` in
    /// core index files).
    pub identifier: String,
    /// Amount staked, in the ledger's native unit.
    pub amount_locked: u64,
    /// First block height (inclusive) at which the lock is active.
    pub lock_transaction_time: TransactionTime,
    /// Block height (exclusive) at which the lock expires.
    pub unlock_transaction_time: TransactionTime,
    /// Normalized fee at the time the lock was created.
    pub normalized_fee: Fee,
    /// Opaque identity of the staker.
    pub owner: String,
}
