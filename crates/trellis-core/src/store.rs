use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TrellisError;
use crate::operation::{AnchoredOperationModel, QueuedOperationModel};
use crate::types::{DidSuffix, TransactionModel, TransactionNumber, TransactionTime};

// ── OperationStore ───────────────────────────────────────────────────────────

/// Durable home of every anchored operation the observer has validated.
///
/// Rows are keyed by `(did_suffix, transaction_number, operation_index)`;
/// inserting an existing key replaces the row, so re-processing a
/// transaction is idempotent.
#[async_trait]
pub trait OperationStore: Send + Sync {
    async fn insert_or_replace(
        &self,
        operations: &[AnchoredOperationModel],
    ) -> Result<(), TrellisError>;

    /// All operations for a DID, ordered by
    /// `(transaction_number asc, operation_index asc)`.
    async fn get(&self, did_suffix: &DidSuffix) -> Result<Vec<AnchoredOperationModel>, TrellisError>;

    /// Remove every operation with `transaction_number` greater than the
    /// given value, or everything when `None`.
    async fn delete(
        &self,
        after_transaction_number: Option<TransactionNumber>,
    ) -> Result<(), TrellisError>;

    /// Prune update operations for `did_suffix` strictly before
    /// `(transaction_number, operation_index)`.
    async fn delete_updates_earlier_than(
        &self,
        did_suffix: &DidSuffix,
        transaction_number: TransactionNumber,
        operation_index: u32,
    ) -> Result<(), TrellisError>;

    /// Number of operations already anchored at a block height. Feeds the
    /// throughput limiter's per-block budget.
    async fn count_at_transaction_time(
        &self,
        transaction_time: TransactionTime,
    ) -> Result<u64, TrellisError>;
}

// ── ConfirmationStore ────────────────────────────────────────────────────────

/// One submitted anchor string and, once the observer has seen it on the
/// ledger, the block height that confirmed it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationModel {
    pub anchor_string: String,
    pub submitted_at: TransactionTime,
    pub confirmed_at: Option<TransactionTime>,
}

/// Tracks the writer's submitted anchors so the confirmation gate can
/// rate-limit submissions.
#[async_trait]
pub trait ConfirmationStore: Send + Sync {
    async fn submit(&self, anchor_string: &str, submitted_at: TransactionTime)
        -> Result<(), TrellisError>;

    /// Set `confirmed_at` on every row matching `anchor_string`.
    async fn confirm(
        &self,
        anchor_string: &str,
        confirmed_at: TransactionTime,
    ) -> Result<(), TrellisError>;

    /// Clear `confirmed_at` on rows confirmed after `t` (ledger reorg), or
    /// clear the entire store when `None`.
    async fn reset_after(&self, t: Option<TransactionTime>) -> Result<(), TrellisError>;

    /// The row with the greatest `submitted_at`.
    async fn last_submitted(&self) -> Result<Option<ConfirmationModel>, TrellisError>;
}

// ── UnresolvableTransactionStore ─────────────────────────────────────────────

/// A ledger transaction whose referenced files could not yet be fetched,
/// scheduled for exponential-backoff retries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvableTransactionModel {
    pub transaction: TransactionModel,
    /// Wall-clock milliseconds of the first failed fetch.
    pub first_fetch_time: i64,
    /// Retries attempted after the first sighting.
    pub retry_attempts: u32,
    /// Wall-clock milliseconds before which the transaction is not retried.
    pub next_retry_time: i64,
}

#[async_trait]
pub trait UnresolvableTransactionStore: Send + Sync {
    /// Record a failed fetch at wall-clock `now` (milliseconds). The first
    /// sighting schedules an immediate retry; each subsequent sighting
    /// doubles the delay from `first_fetch_time`.
    async fn record_fetch_attempt(
        &self,
        transaction: &TransactionModel,
        now: i64,
    ) -> Result<(), TrellisError>;

    /// Transactions whose `next_retry_time` has passed, ordered by
    /// `next_retry_time asc`, at most `limit` (default 100).
    async fn due_for_retry(
        &self,
        now: i64,
        limit: Option<usize>,
    ) -> Result<Vec<TransactionModel>, TrellisError>;

    /// Forget a transaction (it was eventually resolved or skipped).
    async fn remove(&self, transaction: &TransactionModel) -> Result<(), TrellisError>;

    /// Remove entries with `transaction_number` greater than the given value,
    /// or everything when `None` (ledger reorg support).
    async fn remove_later_than(
        &self,
        transaction_number: Option<TransactionNumber>,
    ) -> Result<(), TrellisError>;
}

// ── OperationQueue ───────────────────────────────────────────────────────────

/// Durable FIFO of operations awaiting batching, with at most one queued
/// operation per DID.
#[async_trait]
pub trait OperationQueue: Send + Sync {
    /// Append an operation. Fails with
    /// `QueueingMultipleOperationsPerDidNotAllowed` if the DID already has
    /// a queued operation.
    async fn enqueue(
        &self,
        did_suffix: &DidSuffix,
        operation_buffer: Vec<u8>,
    ) -> Result<(), TrellisError>;

    /// Up to `count` oldest operations in insertion order, without removal.
    async fn peek(&self, count: usize) -> Result<Vec<QueuedOperationModel>, TrellisError>;

    /// Atomically remove and return up to `count` oldest operations.
    async fn dequeue(&self, count: usize) -> Result<Vec<QueuedOperationModel>, TrellisError>;

    async fn contains(&self, did_suffix: &DidSuffix) -> Result<bool, TrellisError>;

    async fn size(&self) -> Result<usize, TrellisError>;
}
