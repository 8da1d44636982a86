use std::path::Path;

use async_trait::async_trait;
use trellis_core::operation::{AnchoredOperationModel, OperationKind};
use trellis_core::store::OperationStore;
use trellis_core::types::{DidSuffix, TransactionNumber, TransactionTime};
use trellis_core::TrellisError;

use crate::{serialization_error, storage_error};

/// Anchored-operation store backed by sled.
///
/// Named tree:
///   operations — did_suffix utf8 ++ 0x00 ++ tx_number be8 ++ op_index be4
///                → bincode(AnchoredOperationModel)
///
/// The 0x00 separator cannot appear in a base64url DID suffix, so prefix
/// scans per DID are exact, and the big-endian coordinates make sled's key
/// order the protocol's `(transaction_number, operation_index)` order.
pub struct SledOperationStore {
    _db: sled::Db,
    operations: sled::Tree,
}

impl SledOperationStore {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TrellisError> {
        let db = sled::open(path).map_err(storage_error)?;
        let operations = db.open_tree("operations").map_err(storage_error)?;
        Ok(Self { _db: db, operations })
    }

    fn key(did_suffix: &str, transaction_number: u64, operation_index: u32) -> Vec<u8> {
        let mut key = Vec::with_capacity(did_suffix.len() + 13);
        key.extend_from_slice(did_suffix.as_bytes());
        key.push(0);
        key.extend_from_slice(&transaction_number.to_be_bytes());
        key.extend_from_slice(&operation_index.to_be_bytes());
        key
    }

    fn prefix(did_suffix: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(did_suffix.len() + 1);
        prefix.extend_from_slice(did_suffix.as_bytes());
        prefix.push(0);
        prefix
    }
}

#[async_trait]
impl OperationStore for SledOperationStore {
    async fn insert_or_replace(
        &self,
        operations: &[AnchoredOperationModel],
    ) -> Result<(), TrellisError> {
        for operation in operations {
            let key = Self::key(
                &operation.did_suffix,
                operation.transaction_number,
                operation.operation_index,
            );
            let bytes = bincode::serialize(operation).map_err(serialization_error)?;
            self.operations.insert(key, bytes).map_err(storage_error)?;
        }
        Ok(())
    }

    async fn get(
        &self,
        did_suffix: &DidSuffix,
    ) -> Result<Vec<AnchoredOperationModel>, TrellisError> {
        let mut result = Vec::new();
        for item in self.operations.scan_prefix(Self::prefix(did_suffix)) {
            let (_, bytes) = item.map_err(storage_error)?;
            result.push(bincode::deserialize(&bytes).map_err(serialization_error)?);
        }
        Ok(result)
    }

    async fn delete(
        &self,
        after_transaction_number: Option<TransactionNumber>,
    ) -> Result<(), TrellisError> {
        let Some(after) = after_transaction_number else {
            self.operations.clear().map_err(storage_error)?;
            return Ok(());
        };

        let mut doomed = Vec::new();
        for item in self.operations.iter() {
            let (key, bytes) = item.map_err(storage_error)?;
            let operation: AnchoredOperationModel =
                bincode::deserialize(&bytes).map_err(serialization_error)?;
            if operation.transaction_number > after {
                doomed.push(key);
            }
        }
        for key in doomed {
            self.operations.remove(key).map_err(storage_error)?;
        }
        Ok(())
    }

    async fn delete_updates_earlier_than(
        &self,
        did_suffix: &DidSuffix,
        transaction_number: TransactionNumber,
        operation_index: u32,
    ) -> Result<(), TrellisError> {
        let mut doomed = Vec::new();
        for item in self.operations.scan_prefix(Self::prefix(did_suffix)) {
            let (key, bytes) = item.map_err(storage_error)?;
            let operation: AnchoredOperationModel =
                bincode::deserialize(&bytes).map_err(serialization_error)?;
            let earlier = (operation.transaction_number, operation.operation_index)
                < (transaction_number, operation_index);
            if operation.kind == OperationKind::Update && earlier {
                doomed.push(key);
            }
        }
        for key in doomed {
            self.operations.remove(key).map_err(storage_error)?;
        }
        Ok(())
    }

    async fn count_at_transaction_time(
        &self,
        transaction_time: TransactionTime,
    ) -> Result<u64, TrellisError> {
        let mut count = 0;
        for item in self.operations.iter() {
            let (_, bytes) = item.map_err(storage_error)?;
            let operation: AnchoredOperationModel =
                bincode::deserialize(&bytes).map_err(serialization_error)?;
            if operation.transaction_time == transaction_time {
                count += 1;
            }
        }
        Ok(count)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> SledOperationStore {
        let dir = std::env::temp_dir().join(format!("trellis_opstore_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        SledOperationStore::open(&dir).expect("open temp store")
    }

    fn op(
        did: &str,
        kind: OperationKind,
        transaction_number: u64,
        transaction_time: u64,
        operation_index: u32,
    ) -> AnchoredOperationModel {
        AnchoredOperationModel {
            did_suffix: did.to_string(),
            kind,
            operation_buffer: format!("{did}:{transaction_number}:{operation_index}").into_bytes(),
            transaction_number,
            transaction_time,
            operation_index,
        }
    }

    #[tokio::test]
    async fn get_returns_operations_in_anchor_order() {
        let store = temp_store("order");
        store
            .insert_or_replace(&[
                op("didA", OperationKind::Update, 7, 70, 2),
                op("didA", OperationKind::Create, 3, 30, 0),
                op("didA", OperationKind::Update, 7, 70, 0),
                op("didB", OperationKind::Create, 1, 10, 0),
            ])
            .await
            .unwrap();

        let result = store.get(&"didA".to_string()).await.unwrap();
        let coordinates: Vec<(u64, u32)> = result
            .iter()
            .map(|o| (o.transaction_number, o.operation_index))
            .collect();
        assert_eq!(coordinates, [(3, 0), (7, 0), (7, 2)]);
    }

    #[tokio::test]
    async fn insert_is_idempotent_and_replacing() {
        let store = temp_store("idempotent");
        let original = op("didA", OperationKind::Create, 3, 30, 0);
        store
            .insert_or_replace(std::slice::from_ref(&original))
            .await
            .unwrap();
        store
            .insert_or_replace(std::slice::from_ref(&original))
            .await
            .unwrap();
        assert_eq!(store.get(&"didA".to_string()).await.unwrap().len(), 1);

        // Same key, different buffer: the row is replaced, not duplicated.
        let mut replacement = original.clone();
        replacement.operation_buffer = b"replaced".to_vec();
        store.insert_or_replace(&[replacement]).await.unwrap();
        let result = store.get(&"didA".to_string()).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].operation_buffer, b"replaced");
    }

    #[tokio::test]
    async fn delete_after_transaction_number() {
        let store = temp_store("delete");
        store
            .insert_or_replace(&[
                op("didA", OperationKind::Create, 3, 30, 0),
                op("didA", OperationKind::Update, 7, 70, 0),
                op("didB", OperationKind::Create, 9, 90, 0),
            ])
            .await
            .unwrap();

        store.delete(Some(3)).await.unwrap();
        assert_eq!(store.get(&"didA".to_string()).await.unwrap().len(), 1);
        assert!(store.get(&"didB".to_string()).await.unwrap().is_empty());

        store.delete(None).await.unwrap();
        assert!(store.get(&"didA".to_string()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn prune_updates_before_a_coordinate() {
        let store = temp_store("prune");
        store
            .insert_or_replace(&[
                op("didA", OperationKind::Create, 1, 10, 0),
                op("didA", OperationKind::Update, 2, 20, 0),
                op("didA", OperationKind::Update, 2, 20, 5),
                op("didA", OperationKind::Update, 4, 40, 0),
            ])
            .await
            .unwrap();

        store
            .delete_updates_earlier_than(&"didA".to_string(), 2, 5)
            .await
            .unwrap();
        let remaining = store.get(&"didA".to_string()).await.unwrap();
        let coordinates: Vec<(u64, u32)> = remaining
            .iter()
            .map(|o| (o.transaction_number, o.operation_index))
            .collect();
        // The create survives (wrong kind); (2,0) is pruned; (2,5) and (4,0) stay.
        assert_eq!(coordinates, [(1, 0), (2, 5), (4, 0)]);
    }

    #[tokio::test]
    async fn counts_operations_per_block() {
        let store = temp_store("count");
        store
            .insert_or_replace(&[
                op("didA", OperationKind::Create, 1, 100, 0),
                op("didB", OperationKind::Create, 2, 100, 0),
                op("didC", OperationKind::Create, 3, 101, 0),
            ])
            .await
            .unwrap();
        assert_eq!(store.count_at_transaction_time(100).await.unwrap(), 2);
        assert_eq!(store.count_at_transaction_time(101).await.unwrap(), 1);
        assert_eq!(store.count_at_transaction_time(102).await.unwrap(), 0);
    }
}
