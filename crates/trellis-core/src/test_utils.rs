//! In-memory doubles for the consumed interfaces (ledger, CAS), used by
//! tests across the workspace. Gated behind the `test_utils` feature.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::cas::{CasClient, FetchResult};
use crate::error::TrellisError;
use crate::ledger::{LedgerClient, TransactionsPage};
use crate::types::{Fee, LedgerTime, TransactionModel, TransactionNumber, ValueTimeLockModel};

// ── MockLedger ───────────────────────────────────────────────────────────────

struct MockLedgerState {
    time: LedgerTime,
    normalized_fee: Fee,
    writer: String,
    writer_lock: Option<ValueTimeLockModel>,
    locks: HashMap<String, ValueTimeLockModel>,
    transactions: Vec<TransactionModel>,
    fail_writes: bool,
}

/// In-memory ledger: `write` appends a transaction at the current time,
/// `read` pages through everything appended or pushed so far.
pub struct MockLedger {
    state: Mutex<MockLedgerState>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockLedgerState {
                time: LedgerTime {
                    time: 500,
                    hash: "hash500".to_string(),
                },
                normalized_fee: 1_000,
                writer: "writer".to_string(),
                writer_lock: None,
                locks: HashMap::new(),
                transactions: Vec::new(),
                fail_writes: false,
            }),
        }
    }

    pub fn set_time(&self, time: u64) {
        let mut state = self.state.lock().unwrap();
        state.time = LedgerTime {
            time,
            hash: format!("hash{time}"),
        };
    }

    pub fn set_normalized_fee(&self, fee: Fee) {
        self.state.lock().unwrap().normalized_fee = fee;
    }

    pub fn set_writer_lock(&self, lock: Option<ValueTimeLockModel>) {
        let mut state = self.state.lock().unwrap();
        if let Some(lock) = &lock {
            state.locks.insert(lock.identifier.clone(), lock.clone());
        }
        state.writer_lock = lock;
    }

    pub fn add_lock(&self, lock: ValueTimeLockModel) {
        self.state
            .lock()
            .unwrap()
            .locks
            .insert(lock.identifier.clone(), lock);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    /// Append a hand-crafted transaction (observer-side tests).
    pub fn push_transaction(&self, transaction: TransactionModel) {
        self.state.lock().unwrap().transactions.push(transaction);
    }

    /// Everything written so far (writer-side assertions).
    pub fn transactions(&self) -> Vec<TransactionModel> {
        self.state.lock().unwrap().transactions.clone()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn latest_time(&self) -> Result<LedgerTime, TrellisError> {
        Ok(self.state.lock().unwrap().time.clone())
    }

    async fn fee_for(&self, _transaction_time: u64) -> Result<Fee, TrellisError> {
        Ok(self.state.lock().unwrap().normalized_fee)
    }

    async fn writer_value_time_lock(&self) -> Result<Option<ValueTimeLockModel>, TrellisError> {
        Ok(self.state.lock().unwrap().writer_lock.clone())
    }

    async fn value_time_lock(
        &self,
        identifier: &str,
    ) -> Result<Option<ValueTimeLockModel>, TrellisError> {
        Ok(self.state.lock().unwrap().locks.get(identifier).cloned())
    }

    async fn write(&self, anchor_string: &str, fee: Fee) -> Result<(), TrellisError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(TrellisError::Ledger("mock ledger write failure".into()));
        }
        let transaction_number = state.transactions.len() as u64;
        let transaction = TransactionModel {
            transaction_number,
            transaction_time: state.time.time,
            transaction_time_hash: state.time.hash.clone(),
            anchor_string: anchor_string.to_string(),
            transaction_fee_paid: fee,
            normalized_transaction_fee: Some(state.normalized_fee),
            writer: state.writer.clone(),
        };
        state.transactions.push(transaction);
        Ok(())
    }

    async fn read(
        &self,
        since_transaction_number: Option<TransactionNumber>,
        _transaction_time_hash: Option<&str>,
    ) -> Result<TransactionsPage, TrellisError> {
        let state = self.state.lock().unwrap();
        let transactions = state
            .transactions
            .iter()
            .filter(|t| match since_transaction_number {
                Some(since) => t.transaction_number > since,
                None => true,
            })
            .cloned()
            .collect();
        Ok(TransactionsPage {
            more_available: false,
            transactions,
        })
    }
}

// ── MockCas ──────────────────────────────────────────────────────────────────

struct MockCasState {
    content: HashMap<String, Vec<u8>>,
    next_id: u64,
    unreachable: bool,
    fail_writes: bool,
    read_overrides: HashMap<String, FetchResult>,
}

/// In-memory CAS with injectable failures. URIs are synthetic
/// (`"cas0"`, `"cas1"`, …) rather than content-derived, which is enough
/// for engine tests.
pub struct MockCas {
    state: Mutex<MockCasState>,
}

impl Default for MockCas {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCas {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockCasState {
                content: HashMap::new(),
                next_id: 0,
                unreachable: false,
                fail_writes: false,
                read_overrides: HashMap::new(),
            }),
        }
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    /// Force every read of `uri` to return the given result.
    pub fn override_read(&self, uri: &str, result: FetchResult) {
        self.state
            .lock()
            .unwrap()
            .read_overrides
            .insert(uri.to_string(), result);
    }

    /// Store content under a chosen URI (hand-built file fixtures).
    pub fn put(&self, uri: &str, content: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .content
            .insert(uri.to_string(), content);
    }

    pub fn stored(&self, uri: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().content.get(uri).cloned()
    }
}

#[async_trait]
impl CasClient for MockCas {
    async fn write(&self, content: &[u8]) -> Result<String, TrellisError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes || state.unreachable {
            return Err(TrellisError::CasNotReachable);
        }
        let uri = format!("cas{}", state.next_id);
        state.next_id += 1;
        state.content.insert(uri.clone(), content.to_vec());
        Ok(uri)
    }

    async fn read(&self, uri: &str, max_size_in_bytes: u64) -> FetchResult {
        let state = self.state.lock().unwrap();
        if state.unreachable {
            return FetchResult::CasNotReachable;
        }
        if let Some(result) = state.read_overrides.get(uri) {
            return result.clone();
        }
        match state.content.get(uri) {
            Some(content) if content.len() as u64 > max_size_in_bytes => {
                FetchResult::MaxSizeExceeded
            }
            Some(content) => FetchResult::Success(content.clone()),
            None => FetchResult::NotFound,
        }
    }
}
