use std::sync::Arc;

use tracing::{debug, info, warn};
use trellis_core::cas::CasClient;
use trellis_core::ledger::LedgerClient;
use trellis_core::store::{ConfirmationStore, OperationQueue};
use trellis_core::{ProtocolParameters, TrellisError};
use trellis_fees::{fee, lock};
use trellis_files::{AnchoredData, ChunkFile, CoreIndexFile, CoreProofFile, ProvisionalIndexFile, ProvisionalProofFile};
use trellis_ops::create::CreateOperation;
use trellis_ops::deactivate::DeactivateOperation;
use trellis_ops::parser::{parse_operation, Operation};
use trellis_ops::recover::RecoverOperation;
use trellis_ops::update::UpdateOperation;

/// Assembles one batch per tick and anchors it.
///
/// A tick is all-or-nothing: any CAS upload or ledger submission failure
/// aborts it before the queue is drained or a confirmation row is written,
/// so the next tick retries the same queue contents. Assembly is
/// deterministic for a given queue state.
pub struct BatchWriter {
    params: Arc<ProtocolParameters>,
    ledger: Arc<dyn LedgerClient>,
    cas: Arc<dyn CasClient>,
    queue: Arc<dyn OperationQueue>,
    confirmations: Arc<dyn ConfirmationStore>,
}

impl BatchWriter {
    pub fn new(
        params: Arc<ProtocolParameters>,
        ledger: Arc<dyn LedgerClient>,
        cas: Arc<dyn CasClient>,
        queue: Arc<dyn OperationQueue>,
        confirmations: Arc<dyn ConfirmationStore>,
    ) -> Self {
        Self {
            params,
            ledger,
            cas,
            queue,
            confirmations,
        }
    }

    /// Run one batching tick. Returns the number of operations anchored
    /// (0 when the queue is empty or the confirmation gate is closed).
    pub async fn write(&self) -> Result<u64, TrellisError> {
        let ledger_time = self.ledger.latest_time().await?;
        let normalized_fee = self.ledger.fee_for(ledger_time.time).await?;
        let value_time_lock = self.ledger.writer_value_time_lock().await?;

        let allowed = self
            .params
            .max_operations_per_batch
            .min(lock::max_operations_allowed(value_time_lock.as_ref(), &self.params));

        let queued = self.queue.peek(allowed as usize).await?;
        if queued.is_empty() {
            debug!("operation queue is empty; nothing to anchor");
            return Ok(0);
        }

        if !self.confirmation_gate_open(ledger_time.time).await? {
            return Ok(0);
        }

        // Partition the batch by kind. A buffer that no longer parses is
        // dropped from the batch but still dequeued, so it cannot wedge
        // the queue.
        let mut creates: Vec<CreateOperation> = Vec::new();
        let mut recovers: Vec<RecoverOperation> = Vec::new();
        let mut deactivates: Vec<DeactivateOperation> = Vec::new();
        let mut updates: Vec<UpdateOperation> = Vec::new();
        for queued_operation in &queued {
            match parse_operation(&queued_operation.operation_buffer, &self.params) {
                Ok(Operation::Create(op)) => creates.push(op),
                Ok(Operation::Recover(op)) => recovers.push(op),
                Ok(Operation::Deactivate(op)) => deactivates.push(op),
                Ok(Operation::Update(op)) => updates.push(op),
                Err(error) => warn!(
                    did_suffix = %queued_operation.did_suffix,
                    %error,
                    "dropping queued operation that no longer parses"
                ),
            }
        }

        let operation_count =
            (creates.len() + recovers.len() + deactivates.len() + updates.len()) as u64;
        if operation_count == 0 {
            self.queue.dequeue(queued.len()).await?;
            return Ok(0);
        }

        // Dependent files first, root file last; each upload records the
        // URI the next file embeds.
        let core_proof_file_uri = if !recovers.is_empty() || !deactivates.is_empty() {
            let file = CoreProofFile::build(&recovers, &deactivates)?;
            Some(self.cas.write(&file).await?)
        } else {
            None
        };

        let provisional_proof_file_uri = if !updates.is_empty() {
            let file = ProvisionalProofFile::build(&updates)?;
            Some(self.cas.write(&file).await?)
        } else {
            None
        };

        let chunk_file_uri =
            if !creates.is_empty() || !recovers.is_empty() || !updates.is_empty() {
                let file = ChunkFile::build(&creates, &recovers, &updates)?;
                Some(self.cas.write(&file).await?)
            } else {
                None
            };

        let provisional_index_file_uri = match &chunk_file_uri {
            Some(chunk_file_uri) => {
                let file = ProvisionalIndexFile::build(
                    provisional_proof_file_uri.as_deref(),
                    &updates,
                    chunk_file_uri,
                )?;
                Some(self.cas.write(&file).await?)
            }
            None => None,
        };

        let writer_lock_id = value_time_lock.as_ref().map(|l| l.identifier.as_str());
        let core_index_file = CoreIndexFile::build(
            writer_lock_id,
            provisional_index_file_uri.as_deref(),
            core_proof_file_uri.as_deref(),
            &creates,
            &recovers,
            &deactivates,
        )?;
        let core_index_file_uri = self.cas.write(&core_index_file).await?;

        let anchor_string = AnchoredData {
            number_of_operations: operation_count,
            core_index_file_uri,
        }
        .serialize();
        let transaction_fee =
            fee::minimum_transaction_fee(normalized_fee, operation_count, &self.params)?;
        self.ledger.write(&anchor_string, transaction_fee).await?;

        self.confirmations
            .submit(&anchor_string, ledger_time.time)
            .await?;
        self.queue.dequeue(queued.len()).await?;

        info!(
            operations = operation_count,
            anchor = %anchor_string,
            fee = transaction_fee,
            "batch anchored"
        );
        Ok(operation_count)
    }

    /// The writer holds off while its previous anchor is unconfirmed or
    /// confirmed fewer than `min_confirmations` blocks ago (inclusive of
    /// the confirming block).
    async fn confirmation_gate_open(&self, current_time: u64) -> Result<bool, TrellisError> {
        let Some(last) = self.confirmations.last_submitted().await? else {
            return Ok(true);
        };
        match last.confirmed_at {
            None => {
                info!(anchor = %last.anchor_string, "previous anchor unconfirmed; holding batch");
                Ok(false)
            }
            Some(confirmed_at) => {
                let confirmations = current_time.saturating_sub(confirmed_at) + 1;
                if confirmations < self.params.min_confirmations {
                    info!(
                        anchor = %last.anchor_string,
                        confirmations,
                        required = self.params.min_confirmations,
                        "previous anchor too recent; holding batch"
                    );
                    Ok(false)
                } else {
                    Ok(true)
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
