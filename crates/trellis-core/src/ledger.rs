use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TrellisError;
use crate::types::{Fee, LedgerTime, TransactionModel, TransactionNumber, ValueTimeLockModel};

// ── TransactionsPage ─────────────────────────────────────────────────────────

/// One page of anchoring transactions read from the ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionsPage {
    /// True when the ledger holds further transactions beyond this page.
    pub more_available: bool,
    pub transactions: Vec<TransactionModel>,
}

// ── LedgerClient ─────────────────────────────────────────────────────────────

/// Ledger client consumed by the writer and the observer. Implementations
/// (an adapter per ledger) live outside this workspace.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// The ledger's current tip.
    async fn latest_time(&self) -> Result<LedgerTime, TrellisError>;

    /// Normalized per-operation base fee at the given block height.
    async fn fee_for(&self, transaction_time: u64) -> Result<Fee, TrellisError>;

    /// The value time lock owned by this node's writer identity, if any.
    async fn writer_value_time_lock(&self) -> Result<Option<ValueTimeLockModel>, TrellisError>;

    /// Resolve a value time lock by its ledger identifier.
    async fn value_time_lock(
        &self,
        identifier: &str,
    ) -> Result<Option<ValueTimeLockModel>, TrellisError>;

    /// Submit an anchor string paying `fee`. Failures are retried by the
    /// writer's driver on a later tick.
    async fn write(&self, anchor_string: &str, fee: Fee) -> Result<(), TrellisError>;

    /// Page through anchoring transactions after `since_transaction_number`
    /// (from the beginning when `None`). `transaction_time_hash` lets the
    /// caller detect that its cursor was invalidated by a reorg.
    async fn read(
        &self,
        since_transaction_number: Option<TransactionNumber>,
        transaction_time_hash: Option<&str>,
    ) -> Result<TransactionsPage, TrellisError>;
}
