use std::path::Path;

use async_trait::async_trait;
use trellis_core::constants::DUE_FOR_RETRY_DEFAULT_LIMIT;
use trellis_core::store::{UnresolvableTransactionModel, UnresolvableTransactionStore};
use trellis_core::types::{TransactionModel, TransactionNumber};
use trellis_core::TrellisError;

use crate::{serialization_error, storage_error};

/// Retry ledger for transactions whose CAS content is still missing.
///
/// Named tree:
///   unresolvable — tx_time be8 ++ tx_number be8
///                  → bincode(UnresolvableTransactionModel)
///
/// The `(transaction_time, transaction_number)` key is the uniqueness
/// constraint; repeated sightings rewrite the row with a doubled delay.
pub struct SledUnresolvableTransactionStore {
    _db: sled::Db,
    unresolvable: sled::Tree,
    base_retry_delay_ms: i64,
}

impl SledUnresolvableTransactionStore {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P, base_retry_delay_ms: i64) -> Result<Self, TrellisError> {
        let db = sled::open(path).map_err(storage_error)?;
        let unresolvable = db.open_tree("unresolvable").map_err(storage_error)?;
        Ok(Self {
            _db: db,
            unresolvable,
            base_retry_delay_ms,
        })
    }

    fn key(transaction: &TransactionModel) -> [u8; 16] {
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&transaction.transaction_time.to_be_bytes());
        key[8..].copy_from_slice(&transaction.transaction_number.to_be_bytes());
        key
    }
}

#[async_trait]
impl UnresolvableTransactionStore for SledUnresolvableTransactionStore {
    async fn record_fetch_attempt(
        &self,
        transaction: &TransactionModel,
        now: i64,
    ) -> Result<(), TrellisError> {
        let key = Self::key(transaction);
        let row = match self.unresolvable.get(key).map_err(storage_error)? {
            None => UnresolvableTransactionModel {
                transaction: transaction.clone(),
                first_fetch_time: now,
                retry_attempts: 0,
                next_retry_time: now,
            },
            Some(bytes) => {
                let existing: UnresolvableTransactionModel =
                    bincode::deserialize(&bytes).map_err(serialization_error)?;
                let backoff = self
                    .base_retry_delay_ms
                    .saturating_mul(1i64 << existing.retry_attempts.min(32));
                UnresolvableTransactionModel {
                    transaction: transaction.clone(),
                    first_fetch_time: existing.first_fetch_time,
                    retry_attempts: existing.retry_attempts + 1,
                    next_retry_time: existing.first_fetch_time.saturating_add(backoff),
                }
            }
        };
        let bytes = bincode::serialize(&row).map_err(serialization_error)?;
        self.unresolvable.insert(key, bytes).map_err(storage_error)?;
        Ok(())
    }

    async fn due_for_retry(
        &self,
        now: i64,
        limit: Option<usize>,
    ) -> Result<Vec<TransactionModel>, TrellisError> {
        let limit = limit.unwrap_or(DUE_FOR_RETRY_DEFAULT_LIMIT);
        let mut due = Vec::new();
        for item in self.unresolvable.iter() {
            let (_, bytes) = item.map_err(storage_error)?;
            let row: UnresolvableTransactionModel =
                bincode::deserialize(&bytes).map_err(serialization_error)?;
            if row.next_retry_time <= now {
                due.push(row);
            }
        }
        due.sort_by_key(|row| row.next_retry_time);
        due.truncate(limit);
        Ok(due.into_iter().map(|row| row.transaction).collect())
    }

    async fn remove(&self, transaction: &TransactionModel) -> Result<(), TrellisError> {
        self.unresolvable
            .remove(Self::key(transaction))
            .map_err(storage_error)?;
        Ok(())
    }

    async fn remove_later_than(
        &self,
        transaction_number: Option<TransactionNumber>,
    ) -> Result<(), TrellisError> {
        let Some(after) = transaction_number else {
            self.unresolvable.clear().map_err(storage_error)?;
            return Ok(());
        };

        let mut doomed = Vec::new();
        for item in self.unresolvable.iter() {
            let (key, bytes) = item.map_err(storage_error)?;
            let row: UnresolvableTransactionModel =
                bincode::deserialize(&bytes).map_err(serialization_error)?;
            if row.transaction.transaction_number > after {
                doomed.push(key);
            }
        }
        for key in doomed {
            self.unresolvable.remove(key).map_err(storage_error)?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_DELAY_MS: i64 = 1_000;

    fn temp_store(name: &str) -> SledUnresolvableTransactionStore {
        let dir = std::env::temp_dir().join(format!("trellis_unresolvable_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        SledUnresolvableTransactionStore::open(&dir, BASE_DELAY_MS).expect("open temp store")
    }

    fn tx(transaction_number: u64, transaction_time: u64) -> TransactionModel {
        TransactionModel {
            transaction_number,
            transaction_time,
            transaction_time_hash: format!("hash{transaction_time}"),
            anchor_string: format!("1.Qm{transaction_number}"),
            transaction_fee_paid: 1_000,
            normalized_transaction_fee: None,
            writer: "writer".to_string(),
        }
    }

    #[tokio::test]
    async fn first_sighting_is_due_immediately() {
        let store = temp_store("first");
        store.record_fetch_attempt(&tx(5, 50), 10_000).await.unwrap();
        let due = store.due_for_retry(10_000, None).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].transaction_number, 5);
    }

    #[tokio::test]
    async fn backoff_doubles_from_first_fetch_time() {
        let store = temp_store("backoff");
        let transaction = tx(5, 50);

        store.record_fetch_attempt(&transaction, 10_000).await.unwrap();
        // Second sighting: next retry = 10_000 + 2^0 × 1_000.
        store.record_fetch_attempt(&transaction, 10_500).await.unwrap();
        assert!(store.due_for_retry(10_999, None).await.unwrap().is_empty());
        assert_eq!(store.due_for_retry(11_000, None).await.unwrap().len(), 1);

        // Third sighting: next retry = 10_000 + 2^1 × 1_000.
        store.record_fetch_attempt(&transaction, 11_100).await.unwrap();
        assert!(store.due_for_retry(11_999, None).await.unwrap().is_empty());
        assert_eq!(store.due_for_retry(12_000, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn due_list_is_ordered_and_limited() {
        let store = temp_store("ordered");
        // Three transactions first sighted at different times.
        store.record_fetch_attempt(&tx(1, 10), 3_000).await.unwrap();
        store.record_fetch_attempt(&tx(2, 20), 1_000).await.unwrap();
        store.record_fetch_attempt(&tx(3, 30), 2_000).await.unwrap();

        let due = store.due_for_retry(10_000, None).await.unwrap();
        let numbers: Vec<u64> = due.iter().map(|t| t.transaction_number).collect();
        assert_eq!(numbers, [2, 3, 1]);

        let due = store.due_for_retry(10_000, Some(2)).await.unwrap();
        assert_eq!(due.len(), 2);
    }

    #[tokio::test]
    async fn remove_and_remove_later_than() {
        let store = temp_store("remove");
        store.record_fetch_attempt(&tx(1, 10), 0).await.unwrap();
        store.record_fetch_attempt(&tx(2, 20), 0).await.unwrap();
        store.record_fetch_attempt(&tx(3, 30), 0).await.unwrap();

        store.remove(&tx(2, 20)).await.unwrap();
        assert_eq!(store.due_for_retry(0, None).await.unwrap().len(), 2);

        store.remove_later_than(Some(1)).await.unwrap();
        let due = store.due_for_retry(0, None).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].transaction_number, 1);

        store.remove_later_than(None).await.unwrap();
        assert!(store.due_for_retry(0, None).await.unwrap().is_empty());
    }
}
