use std::sync::Arc;

use tracing::debug;
use trellis_core::store::OperationStore;
use trellis_core::types::TransactionModel;
use trellis_core::{ProtocolParameters, TrellisError};
use trellis_files::AnchoredData;

/// Selects which of a block's transactions the node will process, keeping
/// the block's total operation count within the protocol budget.
///
/// Selection is greedy by `(fee_paid desc, transaction_number asc)`; a
/// candidate that would overflow the remaining budget is skipped, later
/// smaller candidates may still fit. The result is returned in ledger
/// order.
pub struct ThroughputLimiter {
    params: Arc<ProtocolParameters>,
    operation_store: Arc<dyn OperationStore>,
}

impl ThroughputLimiter {
    pub fn new(params: Arc<ProtocolParameters>, operation_store: Arc<dyn OperationStore>) -> Self {
        Self {
            params,
            operation_store,
        }
    }

    pub async fn select(
        &self,
        transactions: &[TransactionModel],
    ) -> Result<Vec<TransactionModel>, TrellisError> {
        let Some(first) = transactions.first() else {
            return Ok(Vec::new());
        };
        let transaction_time = first.transaction_time;
        if transactions
            .iter()
            .any(|t| t.transaction_time != transaction_time)
        {
            return Err(TrellisError::TransactionsNotInSameBlock);
        }

        let already_anchored = self
            .operation_store
            .count_at_transaction_time(transaction_time)
            .await?;
        let mut budget = self
            .params
            .max_operations_per_transaction_time
            .saturating_sub(already_anchored);

        // Candidates whose anchor strings do not even deserialize are not
        // worth a budget slot.
        let mut candidates: Vec<(&TransactionModel, u64)> = transactions
            .iter()
            .filter_map(|transaction| {
                AnchoredData::deserialize(&transaction.anchor_string, &self.params)
                    .ok()
                    .map(|anchored| (transaction, anchored.number_of_operations))
            })
            .collect();
        candidates.sort_by(|(a, _), (b, _)| {
            b.transaction_fee_paid
                .cmp(&a.transaction_fee_paid)
                .then(a.transaction_number.cmp(&b.transaction_number))
        });

        let mut selected = Vec::new();
        for (transaction, operation_count) in candidates {
            if operation_count <= budget {
                budget -= operation_count;
                selected.push(transaction.clone());
            } else {
                debug!(
                    transaction_number = transaction.transaction_number,
                    operation_count,
                    remaining_budget = budget,
                    "transaction exceeds remaining block budget; skipped"
                );
            }
        }

        selected.sort_by_key(|transaction| transaction.transaction_number);
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::operation::{AnchoredOperationModel, OperationKind};
    use trellis_store::SledOperationStore;

    fn temp_store(name: &str) -> Arc<SledOperationStore> {
        let dir = std::env::temp_dir().join(format!("trellis_throughput_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        Arc::new(SledOperationStore::open(&dir).expect("open temp store"))
    }

    fn limiter(name: &str, max_operations: u64) -> (ThroughputLimiter, Arc<SledOperationStore>) {
        let mut params = ProtocolParameters::default();
        params.max_operations_per_transaction_time = max_operations;
        let store = temp_store(name);
        (
            ThroughputLimiter::new(Arc::new(params), store.clone()),
            store,
        )
    }

    fn tx(transaction_number: u64, transaction_time: u64, ops: u64, fee: u64) -> TransactionModel {
        TransactionModel {
            transaction_number,
            transaction_time,
            transaction_time_hash: format!("hash{transaction_time}"),
            anchor_string: format!("{ops}.Qm{transaction_number}"),
            transaction_fee_paid: fee,
            normalized_transaction_fee: None,
            writer: "writer".to_string(),
        }
    }

    #[tokio::test]
    async fn selects_highest_fee_first_and_returns_ledger_order() {
        // Budget 25; (ops, fee) per transaction as in the protocol's
        // reference scenario: the 12-op transaction is priced out, the
        // 1-op cheap one still fits.
        let (limiter, _store) = limiter("reference", 25);
        let transactions = vec![
            tx(1, 100, 12, 333),
            tx(2, 100, 11, 999),
            tx(3, 100, 8, 998),
            tx(4, 100, 1, 14),
        ];

        let selected = limiter.select(&transactions).await.unwrap();
        let numbers: Vec<u64> = selected.iter().map(|t| t.transaction_number).collect();
        assert_eq!(numbers, [2, 3, 4]);
        let total: u64 = selected
            .iter()
            .map(|t| t.anchor_string.split('.').next().unwrap().parse::<u64>().unwrap())
            .sum();
        assert_eq!(total, 20);
    }

    #[tokio::test]
    async fn mixed_blocks_rejected() {
        let (limiter, _store) = limiter("mixed", 25);
        let transactions = vec![tx(1, 100, 1, 10), tx(2, 101, 1, 10)];
        assert!(matches!(
            limiter.select(&transactions).await,
            Err(TrellisError::TransactionsNotInSameBlock)
        ));
    }

    #[tokio::test]
    async fn already_anchored_operations_shrink_the_budget() {
        let (limiter, store) = limiter("shrink", 10);
        store
            .insert_or_replace(&[
                AnchoredOperationModel {
                    did_suffix: "didA".to_string(),
                    kind: OperationKind::Create,
                    operation_buffer: vec![],
                    transaction_number: 0,
                    transaction_time: 100,
                    operation_index: 0,
                },
                AnchoredOperationModel {
                    did_suffix: "didB".to_string(),
                    kind: OperationKind::Create,
                    operation_buffer: vec![],
                    transaction_number: 0,
                    transaction_time: 100,
                    operation_index: 1,
                },
            ])
            .await
            .unwrap();

        // Budget left: 10 − 2 = 8. The 9-op transaction no longer fits.
        let transactions = vec![tx(1, 100, 9, 999), tx(2, 100, 8, 500)];
        let selected = limiter.select(&transactions).await.unwrap();
        let numbers: Vec<u64> = selected.iter().map(|t| t.transaction_number).collect();
        assert_eq!(numbers, [2]);
    }

    #[tokio::test]
    async fn fee_tie_breaks_by_transaction_number() {
        let (limiter, _store) = limiter("tie", 5);
        let transactions = vec![tx(7, 100, 5, 500), tx(3, 100, 5, 500)];
        let selected = limiter.select(&transactions).await.unwrap();
        // Only one fits; the lower transaction number wins the tie.
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].transaction_number, 3);
    }

    #[tokio::test]
    async fn unparseable_anchor_strings_are_ignored() {
        let (limiter, _store) = limiter("unparseable", 25);
        let mut bad = tx(1, 100, 1, 999);
        bad.anchor_string = "0.invalid".to_string();
        let transactions = vec![bad, tx(2, 100, 1, 10)];
        let selected = limiter.select(&transactions).await.unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].transaction_number, 2);
    }

    #[tokio::test]
    async fn empty_input_selects_nothing() {
        let (limiter, _store) = limiter("empty", 25);
        assert!(limiter.select(&[]).await.unwrap().is_empty());
    }
}
