use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{error, info};
use trellis_core::ledger::LedgerClient;
use trellis_core::store::{ConfirmationStore, UnresolvableTransactionStore};
use trellis_core::types::{TransactionModel, TransactionNumber};
use trellis_core::TrellisError;

use crate::processor::TransactionProcessor;
use crate::throughput::ThroughputLimiter;

/// Follows the ledger and feeds anchoring transactions through the
/// throughput limiter into the transaction processor.
///
/// Each tick first retries transactions parked in the unresolvable store,
/// then pages forward from the last seen transaction number. Anchor
/// strings encountered on the ledger are confirmed against the
/// confirmation store so the batch writer's gate can open.
pub struct Observer {
    ledger: Arc<dyn LedgerClient>,
    processor: Arc<TransactionProcessor>,
    limiter: ThroughputLimiter,
    unresolvable: Arc<dyn UnresolvableTransactionStore>,
    confirmations: Arc<dyn ConfirmationStore>,
    cursor: Mutex<Option<TransactionNumber>>,
}

impl Observer {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        processor: Arc<TransactionProcessor>,
        limiter: ThroughputLimiter,
        unresolvable: Arc<dyn UnresolvableTransactionStore>,
        confirmations: Arc<dyn ConfirmationStore>,
    ) -> Self {
        Self {
            ledger,
            processor,
            limiter,
            unresolvable,
            confirmations,
            cursor: Mutex::new(None),
        }
    }

    /// Run forever on `polling_interval`; callers spawn this on its own
    /// task and abort it to shut down.
    pub async fn run(&self, polling_interval: Duration) {
        loop {
            if let Err(err) = self.tick().await {
                error!(error = %err, "observer tick failed");
            }
            tokio::time::sleep(polling_interval).await;
        }
    }

    /// One observation round: retry due unresolvable transactions, then
    /// ingest everything new on the ledger.
    pub async fn tick(&self) -> Result<(), TrellisError> {
        let now = chrono::Utc::now().timestamp_millis();

        for transaction in self.unresolvable.due_for_retry(now, None).await? {
            if self.processor.process(&transaction).await {
                self.unresolvable.remove(&transaction).await?;
            } else {
                self.unresolvable
                    .record_fetch_attempt(&transaction, now)
                    .await?;
            }
        }

        loop {
            let since = *self.cursor.lock().await;
            let page = self.ledger.read(since, None).await?;
            if page.transactions.is_empty() {
                return Ok(());
            }

            for block in group_by_block(&page.transactions) {
                self.process_block(block, now).await?;
            }

            let last_seen = page
                .transactions
                .iter()
                .map(|t| t.transaction_number)
                .max();
            *self.cursor.lock().await = last_seen;

            if !page.more_available {
                return Ok(());
            }
        }
    }

    async fn process_block(
        &self,
        block: &[TransactionModel],
        now: i64,
    ) -> Result<(), TrellisError> {
        let selected = self.limiter.select(block).await?;
        if selected.len() < block.len() {
            info!(
                transaction_time = block[0].transaction_time,
                dropped = block.len() - selected.len(),
                "throughput limiter dropped transactions over the block budget"
            );
        }

        for transaction in selected {
            // Whether or not the content resolves, seeing our own anchor
            // string on the ledger confirms the submission.
            self.confirmations
                .confirm(&transaction.anchor_string, transaction.transaction_time)
                .await?;

            if !self.processor.process(&transaction).await {
                self.unresolvable
                    .record_fetch_attempt(&transaction, now)
                    .await?;
            }
        }
        Ok(())
    }
}

/// Split a ledger-ordered transaction list into runs sharing a block.
fn group_by_block(transactions: &[TransactionModel]) -> Vec<&[TransactionModel]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for i in 1..=transactions.len() {
        let block_ended = i == transactions.len()
            || transactions[i].transaction_time != transactions[start].transaction_time;
        if block_ended {
            groups.push(&transactions[start..i]);
            start = i;
        }
    }
    groups
}
