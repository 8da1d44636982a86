use serde::{Deserialize, Serialize};

use crate::types::{DidSuffix, TransactionNumber, TransactionTime};

// ── OperationKind ────────────────────────────────────────────────────────────

/// The four identity-changing request kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Recover,
    Deactivate,
}

impl OperationKind {
    /// Wire name used in the `type` property of operation requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Recover => "recover",
            OperationKind::Deactivate => "deactivate",
        }
    }
}

// ── QueuedOperationModel ─────────────────────────────────────────────────────

/// An operation waiting in the writer's queue: the DID it targets plus the
/// canonical request bytes exactly as received.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedOperationModel {
    pub did_suffix: DidSuffix,
    pub operation_buffer: Vec<u8>,
}

// ── AnchoredOperationModel ───────────────────────────────────────────────────

/// An operation the observer has located on the ledger: the composed request
/// bytes plus its anchoring coordinates.
///
/// `(did_suffix, transaction_number, operation_index)` is the storage key;
/// `operation_index` is the operation's position within its batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchoredOperationModel {
    pub did_suffix: DidSuffix,
    pub kind: OperationKind,
    pub operation_buffer: Vec<u8>,
    pub transaction_number: TransactionNumber,
    pub transaction_time: TransactionTime,
    pub operation_index: u32,
}
