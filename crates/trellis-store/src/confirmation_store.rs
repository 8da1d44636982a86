use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use trellis_core::store::{ConfirmationModel, ConfirmationStore};
use trellis_core::types::TransactionTime;
use trellis_core::TrellisError;

use crate::{serialization_error, storage_error};

/// Confirmation store backed by sled.
///
/// Named tree:
///   confirmations — u64 be sequence → bincode(ConfirmationModel)
///
/// Rows are append-only in submission order; `confirm` and `reset_after`
/// rewrite rows in place. The sequence counter doubles as the lock that
/// makes each store call atomic.
pub struct SledConfirmationStore {
    _db: sled::Db,
    confirmations: sled::Tree,
    sequence: Mutex<u64>,
}

impl SledConfirmationStore {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TrellisError> {
        let db = sled::open(path).map_err(storage_error)?;
        let confirmations = db.open_tree("confirmations").map_err(storage_error)?;
        let next_sequence = match confirmations.last().map_err(storage_error)? {
            Some((key, _)) => {
                let bytes: [u8; 8] = key
                    .as_ref()
                    .try_into()
                    .map_err(|_| TrellisError::Storage("malformed confirmation key".into()))?;
                u64::from_be_bytes(bytes) + 1
            }
            None => 0,
        };
        Ok(Self {
            _db: db,
            confirmations,
            sequence: Mutex::new(next_sequence),
        })
    }

    fn rows(&self) -> Result<Vec<(sled::IVec, ConfirmationModel)>, TrellisError> {
        let mut rows = Vec::new();
        for item in self.confirmations.iter() {
            let (key, bytes) = item.map_err(storage_error)?;
            rows.push((key, bincode::deserialize(&bytes).map_err(serialization_error)?));
        }
        Ok(rows)
    }

    fn rewrite(&self, key: &sled::IVec, row: &ConfirmationModel) -> Result<(), TrellisError> {
        let bytes = bincode::serialize(row).map_err(serialization_error)?;
        self.confirmations.insert(key, bytes).map_err(storage_error)?;
        Ok(())
    }
}

#[async_trait]
impl ConfirmationStore for SledConfirmationStore {
    async fn submit(
        &self,
        anchor_string: &str,
        submitted_at: TransactionTime,
    ) -> Result<(), TrellisError> {
        let mut sequence = self.sequence.lock().expect("confirmation lock poisoned");
        let row = ConfirmationModel {
            anchor_string: anchor_string.to_string(),
            submitted_at,
            confirmed_at: None,
        };
        let bytes = bincode::serialize(&row).map_err(serialization_error)?;
        self.confirmations
            .insert(sequence.to_be_bytes(), bytes)
            .map_err(storage_error)?;
        *sequence += 1;
        Ok(())
    }

    async fn confirm(
        &self,
        anchor_string: &str,
        confirmed_at: TransactionTime,
    ) -> Result<(), TrellisError> {
        let _guard = self.sequence.lock().expect("confirmation lock poisoned");
        for (key, mut row) in self.rows()? {
            if row.anchor_string == anchor_string {
                row.confirmed_at = Some(confirmed_at);
                self.rewrite(&key, &row)?;
            }
        }
        Ok(())
    }

    async fn reset_after(&self, t: Option<TransactionTime>) -> Result<(), TrellisError> {
        let _guard = self.sequence.lock().expect("confirmation lock poisoned");
        let Some(t) = t else {
            self.confirmations.clear().map_err(storage_error)?;
            return Ok(());
        };
        for (key, mut row) in self.rows()? {
            if row.confirmed_at.is_some_and(|confirmed| confirmed > t) {
                row.confirmed_at = None;
                self.rewrite(&key, &row)?;
            }
        }
        Ok(())
    }

    async fn last_submitted(&self) -> Result<Option<ConfirmationModel>, TrellisError> {
        let _guard = self.sequence.lock().expect("confirmation lock poisoned");
        Ok(self
            .rows()?
            .into_iter()
            .map(|(_, row)| row)
            .max_by_key(|row| row.submitted_at))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> SledConfirmationStore {
        let dir = std::env::temp_dir().join(format!("trellis_confirm_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        SledConfirmationStore::open(&dir).expect("open temp store")
    }

    #[tokio::test]
    async fn submit_then_confirm() {
        let store = temp_store("confirm");
        store.submit("1.QmA", 100).await.unwrap();

        let last = store.last_submitted().await.unwrap().unwrap();
        assert_eq!(last.anchor_string, "1.QmA");
        assert_eq!(last.submitted_at, 100);
        assert_eq!(last.confirmed_at, None);

        store.confirm("1.QmA", 101).await.unwrap();
        let last = store.last_submitted().await.unwrap().unwrap();
        assert_eq!(last.confirmed_at, Some(101));
    }

    #[tokio::test]
    async fn last_submitted_is_the_latest_by_time() {
        let store = temp_store("latest");
        store.submit("1.QmA", 100).await.unwrap();
        store.submit("1.QmB", 105).await.unwrap();
        let last = store.last_submitted().await.unwrap().unwrap();
        assert_eq!(last.anchor_string, "1.QmB");
    }

    #[tokio::test]
    async fn reorg_reset_clears_confirmations_after_the_fork() {
        let store = temp_store("reorg");
        store.submit("1.QmA", 100).await.unwrap();
        store.confirm("1.QmA", 101).await.unwrap();

        store.reset_after(Some(100)).await.unwrap();
        let last = store.last_submitted().await.unwrap().unwrap();
        // The row survives but is unconfirmed again.
        assert_eq!(last.anchor_string, "1.QmA");
        assert_eq!(last.confirmed_at, None);
    }

    #[tokio::test]
    async fn reset_after_keeps_older_confirmations() {
        let store = temp_store("partial_reset");
        store.submit("1.QmA", 100).await.unwrap();
        store.confirm("1.QmA", 101).await.unwrap();
        store.submit("1.QmB", 110).await.unwrap();
        store.confirm("1.QmB", 111).await.unwrap();

        store.reset_after(Some(105)).await.unwrap();
        let rows = store.rows().unwrap();
        let by_anchor: std::collections::HashMap<_, _> = rows
            .into_iter()
            .map(|(_, row)| (row.anchor_string.clone(), row))
            .collect();
        assert_eq!(by_anchor["1.QmA"].confirmed_at, Some(101));
        assert_eq!(by_anchor["1.QmB"].confirmed_at, None);
    }

    #[tokio::test]
    async fn full_reset_empties_the_store() {
        let store = temp_store("full_reset");
        store.submit("1.QmA", 100).await.unwrap();
        store.reset_after(None).await.unwrap();
        assert!(store.last_submitted().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn confirmations_survive_reopen() {
        let dir = std::env::temp_dir().join("trellis_confirm_test_reopen");
        let _ = std::fs::remove_dir_all(&dir);
        {
            let store = SledConfirmationStore::open(&dir).unwrap();
            store.submit("1.QmA", 100).await.unwrap();
            store.confirm("1.QmA", 101).await.unwrap();
        }

        let store = SledConfirmationStore::open(&dir).unwrap();
        let last = store.last_submitted().await.unwrap().unwrap();
        assert_eq!(last.anchor_string, "1.QmA");
        assert_eq!(last.confirmed_at, Some(101));

        // New submissions continue the recovered sequence.
        store.submit("1.QmB", 110).await.unwrap();
        assert_eq!(
            store.last_submitted().await.unwrap().unwrap().anchor_string,
            "1.QmB"
        );
    }
}
