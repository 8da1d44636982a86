use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use trellis_core::operation::QueuedOperationModel;
use trellis_core::store::OperationQueue;
use trellis_core::types::DidSuffix;
use trellis_core::TrellisError;

/// Durable FIFO queue backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   queue      — u64 be sequence → bincode(QueuedOperationModel)
///   membership — did_suffix utf8 → u64 be sequence
///
/// Sequence numbers are monotonic across restarts (recovered from the last
/// queue key on open), so insertion order survives the process. Compound
/// operations hold `sequence` as the critical-section lock: the per-DID
/// uniqueness check plus insert is atomic, as is a multi-entry dequeue.
pub struct SledOperationQueue {
    _db: sled::Db,
    queue: sled::Tree,
    membership: sled::Tree,
    sequence: Mutex<u64>,
}

impl SledOperationQueue {
    /// Open or create the queue database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TrellisError> {
        let db = sled::open(path).map_err(storage_error)?;
        let queue = db.open_tree("queue").map_err(storage_error)?;
        let membership = db.open_tree("membership").map_err(storage_error)?;

        let next_sequence = match queue.last().map_err(storage_error)? {
            Some((key, _)) => decode_sequence(&key)? + 1,
            None => 0,
        };

        Ok(Self {
            _db: db,
            queue,
            membership,
            sequence: Mutex::new(next_sequence),
        })
    }

    fn first_entries(&self, count: usize) -> Result<Vec<(sled::IVec, QueuedOperationModel)>, TrellisError> {
        let mut entries = Vec::new();
        for item in self.queue.iter().take(count) {
            let (key, bytes) = item.map_err(storage_error)?;
            let model = bincode::deserialize(&bytes)
                .map_err(|e| TrellisError::Serialization(e.to_string()))?;
            entries.push((key, model));
        }
        Ok(entries)
    }
}

#[async_trait]
impl OperationQueue for SledOperationQueue {
    async fn enqueue(
        &self,
        did_suffix: &DidSuffix,
        operation_buffer: Vec<u8>,
    ) -> Result<(), TrellisError> {
        let mut sequence = self.sequence.lock().expect("queue lock poisoned");

        if self
            .membership
            .contains_key(did_suffix.as_bytes())
            .map_err(storage_error)?
        {
            return Err(TrellisError::QueueingMultipleOperationsPerDidNotAllowed(
                did_suffix.clone(),
            ));
        }

        let model = QueuedOperationModel {
            did_suffix: did_suffix.clone(),
            operation_buffer,
        };
        let bytes =
            bincode::serialize(&model).map_err(|e| TrellisError::Serialization(e.to_string()))?;
        self.queue
            .insert(sequence.to_be_bytes(), bytes)
            .map_err(storage_error)?;
        self.membership
            .insert(did_suffix.as_bytes(), sequence.to_be_bytes().to_vec())
            .map_err(storage_error)?;
        *sequence += 1;
        Ok(())
    }

    async fn peek(&self, count: usize) -> Result<Vec<QueuedOperationModel>, TrellisError> {
        let _guard = self.sequence.lock().expect("queue lock poisoned");
        Ok(self
            .first_entries(count)?
            .into_iter()
            .map(|(_, model)| model)
            .collect())
    }

    async fn dequeue(&self, count: usize) -> Result<Vec<QueuedOperationModel>, TrellisError> {
        let _guard = self.sequence.lock().expect("queue lock poisoned");
        let entries = self.first_entries(count)?;
        let mut dequeued = Vec::with_capacity(entries.len());
        for (key, model) in entries {
            self.queue.remove(&key).map_err(storage_error)?;
            self.membership
                .remove(model.did_suffix.as_bytes())
                .map_err(storage_error)?;
            dequeued.push(model);
        }
        Ok(dequeued)
    }

    async fn contains(&self, did_suffix: &DidSuffix) -> Result<bool, TrellisError> {
        self.membership
            .contains_key(did_suffix.as_bytes())
            .map_err(storage_error)
    }

    async fn size(&self) -> Result<usize, TrellisError> {
        Ok(self.queue.len())
    }
}

fn storage_error(e: sled::Error) -> TrellisError {
    TrellisError::Storage(e.to_string())
}

fn decode_sequence(key: &[u8]) -> Result<u64, TrellisError> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| TrellisError::Storage("malformed queue key".to_string()))?;
    Ok(u64::from_be_bytes(bytes))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
