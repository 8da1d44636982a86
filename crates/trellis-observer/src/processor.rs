use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, warn};
use trellis_core::ledger::LedgerClient;
use trellis_core::operation::{AnchoredOperationModel, OperationKind};
use trellis_core::store::OperationStore;
use trellis_core::types::TransactionModel;
use trellis_core::{ProtocolParameters, TrellisError};
use trellis_fees::{fee, lock};
use trellis_files::{
    AnchoredData, ChunkFile, CoreIndexFile, CoreProofFile, ProvisionalIndexFile,
    ProvisionalProofFile,
};
use trellis_ops::compose;
use trellis_ops::deactivate::DeactivateOperation;
use trellis_ops::delta;
use trellis_ops::recover::RecoverOperation;
use trellis_ops::update::UpdateOperation;

use crate::download::DownloadManager;

/// Validates one anchoring transaction end to end and materializes its
/// operations.
///
/// `process` returns `true` when the transaction is finished with —
/// successfully ingested or permanently skipped — and `false` only for
/// transient CAS failures, which the observer retries later through the
/// unresolvable-transaction store.
pub struct TransactionProcessor {
    params: Arc<ProtocolParameters>,
    ledger: Arc<dyn LedgerClient>,
    downloads: Arc<DownloadManager>,
    operation_store: Arc<dyn OperationStore>,
}

impl TransactionProcessor {
    pub fn new(
        params: Arc<ProtocolParameters>,
        ledger: Arc<dyn LedgerClient>,
        downloads: Arc<DownloadManager>,
        operation_store: Arc<dyn OperationStore>,
    ) -> Self {
        Self {
            params,
            ledger,
            downloads,
            operation_store,
        }
    }

    pub async fn process(&self, transaction: &TransactionModel) -> bool {
        match self.process_inner(transaction).await {
            Ok(anchored) => {
                info!(
                    transaction_number = transaction.transaction_number,
                    operations = anchored,
                    "transaction processed"
                );
                true
            }
            Err(error) if error.is_transient() => {
                info!(
                    transaction_number = transaction.transaction_number,
                    %error,
                    "transaction content not yet resolvable; will retry"
                );
                false
            }
            Err(error) => {
                warn!(
                    transaction_number = transaction.transaction_number,
                    %error,
                    "invalid transaction permanently skipped"
                );
                true
            }
        }
    }

    async fn process_inner(&self, transaction: &TransactionModel) -> Result<usize, TrellisError> {
        let anchored_data = AnchoredData::deserialize(&transaction.anchor_string, &self.params)?;
        let paid_count = anchored_data.number_of_operations;

        let normalized_fee = match transaction.normalized_transaction_fee {
            Some(fee) => fee,
            None => self.ledger.fee_for(transaction.transaction_time).await?,
        };
        fee::verify_transaction_fee(
            transaction.transaction_fee_paid,
            paid_count,
            normalized_fee,
            &self.params,
        )?;

        // ── Core index file ───────────────────────────────────────────────────
        let core_index_bytes = self
            .downloads
            .download(
                &anchored_data.core_index_file_uri,
                self.params.max_core_index_file_size_in_bytes,
            )
            .await
            .into_content(&anchored_data.core_index_file_uri)?;
        let core_index = CoreIndexFile::parse(&core_index_bytes, &self.params)?;

        let core_count = core_index.operation_count();
        if core_count > paid_count {
            return Err(TrellisError::CoreIndexFileOperationCountExceedsClaimed {
                got: core_count,
                claimed: paid_count,
            });
        }

        let value_time_lock = match &core_index.writer_lock_id {
            Some(lock_id) => self.ledger.value_time_lock(lock_id).await?,
            None => None,
        };
        lock::verify_lock(
            value_time_lock.as_ref(),
            paid_count,
            transaction.transaction_time,
            &transaction.writer,
            &self.params,
        )?;

        // ── Core proof file ───────────────────────────────────────────────────
        let core_proof = match &core_index.core_proof_file_uri {
            Some(uri) => {
                let bytes = self
                    .downloads
                    .download(uri, self.params.max_proof_file_size_in_bytes)
                    .await
                    .into_content(uri)?;
                let file = CoreProofFile::parse(&bytes, &self.params)?;
                if file.recover_proofs.len() != core_index.recover_references.len()
                    || file.deactivate_proofs.len() != core_index.deactivate_references.len()
                {
                    return Err(TrellisError::CoreProofCountMismatch {
                        got: file.proof_count(),
                        expected: core_index.recover_references.len()
                            + core_index.deactivate_references.len(),
                    });
                }
                Some(file)
            }
            None => None,
        };

        // ── Provisional index file ────────────────────────────────────────────
        // Transient fetch failures bubble up for retry; anything else
        // degrades to "no provisional content" and the core operations
        // still anchor.
        let provisional_index = match &core_index.provisional_index_file_uri {
            Some(uri) => match self.download_provisional_index(uri).await {
                Ok(file) => Some(file),
                Err(error) if error.is_transient() => return Err(error),
                Err(error) => {
                    warn!(%error, "provisional index file invalid; continuing with core operations only");
                    None
                }
            },
            None => None,
        };

        // Writer penalties: claiming more updates than paid for, or reusing
        // a core DID in the provisional index, removes every update
        // reference while the core operations still anchor.
        let declared_update_count = provisional_index
            .as_ref()
            .map(|file| file.update_references.len())
            .unwrap_or(0);
        let mut update_references = provisional_index
            .as_ref()
            .map(|file| file.update_references.clone())
            .unwrap_or_default();
        if update_references.len() as u64 > paid_count - core_count {
            warn!(
                updates = update_references.len(),
                paid_for = paid_count - core_count,
                "more updates than paid for; removing all update references"
            );
            update_references.clear();
        } else {
            let core_dids: HashSet<_> = core_index.did_suffixes().into_iter().collect();
            if update_references
                .iter()
                .any(|reference| core_dids.contains(&reference.did_suffix))
            {
                warn!("DID appears in both index files; removing all update references");
                update_references.clear();
            }
        }

        // ── Provisional proof file ────────────────────────────────────────────
        let provisional_proof = if update_references.is_empty() {
            None
        } else {
            // The index-file parse guarantees the proof URI exists whenever
            // update references do.
            let uri = provisional_index
                .as_ref()
                .and_then(|file| file.provisional_proof_file_uri.as_deref())
                .unwrap_or_default();
            match self.download_provisional_proof(uri, update_references.len()).await {
                Ok(file) => Some(file),
                Err(error) if error.is_transient() => return Err(error),
                Err(error) => {
                    warn!(%error, "provisional proof file invalid; removing all update references");
                    update_references.clear();
                    None
                }
            }
        };

        // ── Chunk file ────────────────────────────────────────────────────────
        // The expected delta count uses the counts the writer declared,
        // not the post-penalty ones: the chunk was assembled against the
        // original batch.
        let expected_delta_count = core_index.create_operations.len()
            + core_index.recover_references.len()
            + declared_update_count;
        let chunk = match &provisional_index {
            Some(file) => match self
                .download_chunk(&file.chunk_file_uri, expected_delta_count)
                .await
            {
                Ok(file) => Some(file),
                Err(error) if error.is_transient() => return Err(error),
                Err(error) => {
                    warn!(%error, "chunk file invalid; anchoring operations without deltas");
                    None
                }
            },
            None => None,
        };

        let anchored = self.compose_operations(
            transaction,
            &core_index,
            core_proof.as_ref(),
            &update_references,
            provisional_proof.as_ref(),
            chunk.as_ref(),
        )?;

        let count = anchored.len();
        self.operation_store.insert_or_replace(&anchored).await?;
        Ok(count)
    }

    async fn download_provisional_index(
        &self,
        uri: &str,
    ) -> Result<ProvisionalIndexFile, TrellisError> {
        let bytes = self
            .downloads
            .download(uri, self.params.max_provisional_index_file_size_in_bytes)
            .await
            .into_content(uri)?;
        ProvisionalIndexFile::parse(&bytes, &self.params)
    }

    async fn download_provisional_proof(
        &self,
        uri: &str,
        expected_count: usize,
    ) -> Result<ProvisionalProofFile, TrellisError> {
        let bytes = self
            .downloads
            .download(uri, self.params.max_proof_file_size_in_bytes)
            .await
            .into_content(uri)?;
        let file = ProvisionalProofFile::parse(&bytes, &self.params)?;
        if file.update_proofs.len() != expected_count {
            return Err(TrellisError::ProvisionalProofCountMismatch {
                got: file.update_proofs.len(),
                expected: expected_count,
            });
        }
        Ok(file)
    }

    async fn download_chunk(
        &self,
        uri: &str,
        expected_delta_count: usize,
    ) -> Result<ChunkFile, TrellisError> {
        let bytes = self
            .downloads
            .download(uri, self.params.max_chunk_file_size_in_bytes)
            .await
            .into_content(uri)?;
        let file = ChunkFile::parse(&bytes, &self.params)?;
        if file.deltas.len() != expected_delta_count {
            return Err(TrellisError::ChunkDeltaCountMismatch {
                got: file.deltas.len(),
                expected: expected_delta_count,
            });
        }
        Ok(file)
    }

    /// Compose anchored operations in the protocol's strict order —
    /// creates, recovers, deactivates, updates — with `operation_index`
    /// increasing monotonically across the whole sequence. Deltas attach
    /// by positional slice: recover deltas start at `|creates|`, update
    /// deltas at `|creates| + |recovers|`.
    fn compose_operations(
        &self,
        transaction: &TransactionModel,
        core_index: &CoreIndexFile,
        core_proof: Option<&CoreProofFile>,
        update_references: &[trellis_files::OperationReference],
        provisional_proof: Option<&ProvisionalProofFile>,
        chunk: Option<&ChunkFile>,
    ) -> Result<Vec<AnchoredOperationModel>, TrellisError> {
        let chunk_delta = |index: usize| chunk.and_then(|file| file.deltas.get(index));
        let mut anchored = Vec::new();
        let mut operation_index: u32 = 0;

        let create_count = core_index.create_operations.len();
        let recover_count = core_index.recover_references.len();

        for (i, create) in core_index.create_operations.iter().enumerate() {
            let delta = delta::accept_if_valid(
                chunk_delta(i),
                &create.suffix_data.delta_hash,
                &self.params,
            );
            let operation_buffer = compose::create_request(&create.suffix_data, delta.as_ref())?;
            anchored.push(AnchoredOperationModel {
                did_suffix: create.did_suffix.clone(),
                kind: OperationKind::Create,
                operation_buffer,
                transaction_number: transaction.transaction_number,
                transaction_time: transaction.transaction_time,
                operation_index,
            });
            operation_index += 1;
        }

        for (i, reference) in core_index.recover_references.iter().enumerate() {
            let proof = &core_proof
                .ok_or(TrellisError::CoreProofFileUriMissing)?
                .recover_proofs[i];
            let embedded = embedded_object(reference, &proof.to_compact());
            let operation = RecoverOperation::parse_embedded(&embedded, &self.params)?;
            let delta = delta::accept_if_valid(
                chunk_delta(create_count + i),
                &operation.signed_data.delta_hash,
                &self.params,
            );
            let operation_buffer = compose::recover_request(
                &operation.did_suffix,
                &operation.reveal_value,
                &operation.signed_data_jws.to_compact(),
                delta.as_ref(),
            )?;
            anchored.push(AnchoredOperationModel {
                did_suffix: operation.did_suffix.clone(),
                kind: OperationKind::Recover,
                operation_buffer,
                transaction_number: transaction.transaction_number,
                transaction_time: transaction.transaction_time,
                operation_index,
            });
            operation_index += 1;
        }

        for (i, reference) in core_index.deactivate_references.iter().enumerate() {
            let proof = &core_proof
                .ok_or(TrellisError::CoreProofFileUriMissing)?
                .deactivate_proofs[i];
            let embedded = embedded_object(reference, &proof.to_compact());
            let operation = DeactivateOperation::parse_embedded(&embedded, &self.params)?;
            anchored.push(AnchoredOperationModel {
                did_suffix: operation.did_suffix.clone(),
                kind: OperationKind::Deactivate,
                operation_buffer: operation.operation_buffer.clone(),
                transaction_number: transaction.transaction_number,
                transaction_time: transaction.transaction_time,
                operation_index,
            });
            operation_index += 1;
        }

        for (i, reference) in update_references.iter().enumerate() {
            let proof = &provisional_proof
                .ok_or(TrellisError::ProvisionalProofCountMismatch {
                    got: 0,
                    expected: update_references.len(),
                })?
                .update_proofs[i];
            let embedded = embedded_object(reference, &proof.to_compact());
            let operation = UpdateOperation::parse_embedded(&embedded, &self.params)?;
            let delta = delta::accept_if_valid(
                chunk_delta(create_count + recover_count + i),
                &operation.signed_data.delta_hash,
                &self.params,
            );
            let operation_buffer = compose::update_request(
                &operation.did_suffix,
                &operation.reveal_value,
                &operation.signed_data_jws.to_compact(),
                delta.as_ref(),
            )?;
            anchored.push(AnchoredOperationModel {
                did_suffix: operation.did_suffix.clone(),
                kind: OperationKind::Update,
                operation_buffer,
                transaction_number: transaction.transaction_number,
                transaction_time: transaction.transaction_time,
                operation_index,
            });
            operation_index += 1;
        }

        Ok(anchored)
    }
}

/// Rebuild the embedded operation object from an index-file reference and
/// its proof-file signature.
fn embedded_object(
    reference: &trellis_files::OperationReference,
    signed_data: &str,
) -> Map<String, Value> {
    let mut object = Map::new();
    object.insert(
        "did_suffix".into(),
        Value::String(reference.did_suffix.clone()),
    );
    object.insert(
        "reveal_value".into(),
        Value::String(reference.reveal_value.clone()),
    );
    object.insert("signed_data".into(), Value::String(signed_data.into()));
    object
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use trellis_core::test_utils::{MockCas, MockLedger};
    use trellis_core::types::ValueTimeLockModel;
    use trellis_ops::parser::{parse_operation, Operation};
    use trellis_ops::test_utils as requests;
    use trellis_store::SledOperationStore;

    struct Harness {
        ledger: Arc<MockLedger>,
        cas: Arc<MockCas>,
        store: Arc<SledOperationStore>,
        processor: TransactionProcessor,
    }

    fn harness(name: &str) -> Harness {
        let dir = std::env::temp_dir().join(format!("trellis_processor_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        let params = Arc::new(ProtocolParameters::default());
        let ledger = Arc::new(MockLedger::new());
        let cas = Arc::new(MockCas::new());
        let store = Arc::new(SledOperationStore::open(&dir).unwrap());
        let downloads = Arc::new(DownloadManager::new(
            cas.clone(),
            &params,
            Duration::from_secs(1),
        ));
        let processor = TransactionProcessor::new(
            params,
            ledger.clone(),
            downloads,
            store.clone(),
        );
        Harness {
            ledger,
            cas,
            store,
            processor,
        }
    }

    fn transaction(anchor_string: &str, fee_paid: u64) -> TransactionModel {
        TransactionModel {
            transaction_number: 42,
            transaction_time: 500,
            transaction_time_hash: "hash500".to_string(),
            anchor_string: anchor_string.to_string(),
            transaction_fee_paid: fee_paid,
            normalized_transaction_fee: Some(1_000),
            writer: "writer".to_string(),
        }
    }

    fn parsed_create() -> trellis_ops::create::CreateOperation {
        let (buffer, _) = requests::create_request();
        match parse_operation(&buffer, &ProtocolParameters::default()).unwrap() {
            Operation::Create(op) => op,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn malformed_anchor_string_is_permanently_skipped() {
        let h = harness("bad_anchor");
        for anchor in ["0.x", "01.x", "1"] {
            assert!(h.processor.process(&transaction(anchor, 1_000)).await);
        }
    }

    #[tokio::test]
    async fn underpaid_transaction_is_permanently_skipped() {
        let h = harness("underpaid");
        // Fee below the normalized fee; nothing is even downloaded.
        assert!(h.processor.process(&transaction("1.QmCore", 999)).await);
        assert_eq!(h.store.count_at_transaction_time(500).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_core_index_file_is_retried() {
        let h = harness("missing_core");
        assert!(!h.processor.process(&transaction("1.QmMissing", 1_000)).await);

        h.cas.set_unreachable(true);
        assert!(!h.processor.process(&transaction("1.QmMissing", 1_000)).await);
    }

    #[tokio::test]
    async fn over_claimed_core_operations_skip_the_transaction() {
        let h = harness("over_claim");
        let creates = [parsed_create(), parsed_create()];
        let core_index =
            CoreIndexFile::build(None, Some("QmProvisional"), None, &creates, &[], &[]).unwrap();
        h.cas.put("QmCore", core_index);

        // The anchor only paid for one operation but the file carries two.
        assert!(h.processor.process(&transaction("1.QmCore", 1_000)).await);
        let did = creates[0].did_suffix.clone();
        assert!(h.store.get(&did).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lock_owner_mismatch_skips_the_transaction() {
        let h = harness("lock_owner");
        h.ledger.add_lock(ValueTimeLockModel {
            identifier: "lock-1".to_string(),
            amount_locked: 1_000_000,
            lock_transaction_time: 400,
            unlock_transaction_time: 600,
            normalized_fee: 1_000,
            owner: "someone-else".to_string(),
        });

        let creates = [parsed_create()];
        let core_index = CoreIndexFile::build(
            Some("lock-1"),
            Some("QmProvisional"),
            None,
            &creates,
            &[],
            &[],
        )
        .unwrap();
        h.cas.put("QmCore", core_index);

        assert!(h.processor.process(&transaction("1.QmCore", 1_000)).await);
        assert!(h.store.get(&creates[0].did_suffix).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_chunk_file_is_retried_with_no_store_writes() {
        let h = harness("chunk_unreachable");
        let creates = [parsed_create()];
        let chunk = ChunkFile::build(&creates, &[], &[]).unwrap();
        let provisional = ProvisionalIndexFile::build(None, &[], "QmChunk").unwrap();
        let core_index =
            CoreIndexFile::build(None, Some("QmProvisional"), None, &creates, &[], &[]).unwrap();
        h.cas.put("QmCore", core_index);
        h.cas.put("QmProvisional", provisional);
        h.cas.put("QmChunk", chunk);
        h.cas
            .override_read("QmChunk", trellis_core::cas::FetchResult::CasNotReachable);

        assert!(!h.processor.process(&transaction("1.QmCore", 1_000)).await);
        assert!(h.store.get(&creates[0].did_suffix).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn wrong_delta_count_degrades_to_no_deltas() {
        let h = harness("delta_count");
        let creates = [parsed_create()];
        // Chunk with two deltas for a one-operation batch.
        let chunk = ChunkFile::build(&[creates[0].clone(), parsed_create()], &[], &[]).unwrap();
        let provisional = ProvisionalIndexFile::build(None, &[], "QmChunk").unwrap();
        let core_index =
            CoreIndexFile::build(None, Some("QmProvisional"), None, &creates, &[], &[]).unwrap();
        h.cas.put("QmCore", core_index);
        h.cas.put("QmProvisional", provisional);
        h.cas.put("QmChunk", chunk);

        assert!(h.processor.process(&transaction("1.QmCore", 1_000)).await);

        // The create still anchors, with a delta-less buffer.
        let anchored = h.store.get(&creates[0].did_suffix).await.unwrap();
        assert_eq!(anchored.len(), 1);
        let request: serde_json::Value =
            serde_json::from_slice(&anchored[0].operation_buffer).unwrap();
        assert!(request.get("delta").is_none());
    }

    #[tokio::test]
    async fn invalid_provisional_index_degrades_to_core_only() {
        let h = harness("bad_provisional");
        let creates = [parsed_create()];
        let core_index =
            CoreIndexFile::build(None, Some("QmProvisional"), None, &creates, &[], &[]).unwrap();
        h.cas.put("QmCore", core_index);
        h.cas.put("QmProvisional", b"not gzip at all".to_vec());

        assert!(h.processor.process(&transaction("1.QmCore", 1_000)).await);
        let anchored = h.store.get(&creates[0].did_suffix).await.unwrap();
        assert_eq!(anchored.len(), 1);
        assert_eq!(anchored[0].kind, OperationKind::Create);
    }

    #[tokio::test]
    async fn reprocessing_is_idempotent() {
        let h = harness("idempotent");
        let creates = [parsed_create()];
        let chunk = ChunkFile::build(&creates, &[], &[]).unwrap();
        let provisional = ProvisionalIndexFile::build(None, &[], "QmChunk").unwrap();
        let core_index =
            CoreIndexFile::build(None, Some("QmProvisional"), None, &creates, &[], &[]).unwrap();
        h.cas.put("QmCore", core_index);
        h.cas.put("QmProvisional", provisional);
        h.cas.put("QmChunk", chunk);

        assert!(h.processor.process(&transaction("1.QmCore", 1_000)).await);
        assert!(h.processor.process(&transaction("1.QmCore", 1_000)).await);
        assert_eq!(h.store.get(&creates[0].did_suffix).await.unwrap().len(), 1);
    }
}
