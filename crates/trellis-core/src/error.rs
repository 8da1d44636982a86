use thiserror::Error;

/// The closed set of failure codes produced by the Trellis engine.
///
/// Validation layers fail fast with one of these; the transaction processor
/// matches on `is_transient` to decide between "retry later" and
/// "permanently skip this transaction".
#[derive(Debug, Error)]
pub enum TrellisError {
    // ── Encoding / hashing ───────────────────────────────────────────────────
    #[error("`{0}` is not a non-empty base64url string")]
    NotBase64UrlString(String),

    #[error("multihash buffer is malformed")]
    MultihashMalformed,

    #[error("multihash algorithm {0:#x} is not supported")]
    MultihashUnsupportedHashAlgorithm(u64),

    #[error("multihash algorithm {got:#x} is not the latest supported algorithm {latest:#x}")]
    MultihashNotLatestSupportedHashAlgorithm { got: u64, latest: u64 },

    // ── JSON shape ───────────────────────────────────────────────────────────
    #[error("`{context}` is not valid JSON: {detail}")]
    JsonNotParsable { context: String, detail: String },

    #[error("`{0}` is not a JSON object")]
    NotAnObject(String),

    #[error("`{0}` is not a string")]
    NotAString(String),

    #[error("`{0}` is not an array")]
    NotAnArray(String),

    #[error("unexpected property `{property}` in `{context}`")]
    UnexpectedProperty { context: String, property: String },

    #[error("missing required property `{property}` in `{context}`")]
    MissingProperty { context: String, property: String },

    // ── Operation parsing ────────────────────────────────────────────────────
    #[error("operation type `{0}` is unknown")]
    OperationTypeUnknown(String),

    #[error("reveal value length {length} exceeds the maximum of {max}")]
    RevealValueTooLong { length: usize, max: usize },

    #[error("reveal value does not match the hash of the signing key")]
    RevealValueMismatch,

    #[error("deactivate signed did_suffix `{signed}` does not match the operation's `{expected}`")]
    DeactivateDidSuffixMismatch { signed: String, expected: String },

    #[error("JWS compact serialization must have exactly three dot-separated segments")]
    JwsIncorrectFormat,

    #[error("JWS protected header must be exactly {{\"alg\":\"ES256K\"}}")]
    JwsProtectedHeaderInvalid,

    #[error("JWS signature verification failed")]
    JwsSignatureInvalid,

    #[error("JWK is invalid: {0}")]
    JwkInvalid(String),

    // ── Compression ──────────────────────────────────────────────────────────
    #[error("gzip compression failed: {0}")]
    CompressionFailure(String),

    #[error("gzip decompression failed: {0}")]
    DecompressionFailure(String),

    #[error("decompressed data exceeded the maximum allowed size of {max} bytes")]
    CompressorMaxAllowedDecompressedDataSizeExceeded { max: u64 },

    // ── File validation ──────────────────────────────────────────────────────
    #[error("CAS URI `{0}` is not a valid content address")]
    CasUriInvalid(String),

    #[error("DID suffix `{0}` is referenced more than once in the file")]
    DuplicateDidSuffix(String),

    #[error("provisional index file URI is missing while create or recover operations are present")]
    ProvisionalIndexFileUriMissing,

    #[error("provisional index file URI must not be present without create or recover operations")]
    ProvisionalIndexFileUriNotAllowed,

    #[error("core proof file URI is missing while recover or deactivate operations are present")]
    CoreProofFileUriMissing,

    #[error("core proof file URI must not be present without recover or deactivate operations")]
    CoreProofFileUriNotAllowed,

    #[error("provisional index file must reference exactly one chunk; got {0}")]
    ChunkCountIncorrect(usize),

    #[error("update operations and the provisional proof file URI must be present together")]
    UpdatesAndProofFileMismatch,

    #[error("core proof file declares no operations")]
    CoreProofFileEmpty,

    #[error("core proof file has {got} proofs but the core index file references {expected} operations")]
    CoreProofCountMismatch { got: usize, expected: usize },

    #[error("provisional proof file has {got} proofs but the provisional index file references {expected} updates")]
    ProvisionalProofCountMismatch { got: usize, expected: usize },

    #[error("chunk file has {got} deltas but the index files reference {expected} operations")]
    ChunkDeltaCountMismatch { got: usize, expected: usize },

    // ── Anchor string ────────────────────────────────────────────────────────
    #[error("anchored data must be `<count>.<uri>`; got `{0}`")]
    AnchoredDataIncorrectFormat(String),

    #[error("anchored data operation count `{0}` is not a positive integer")]
    AnchoredDataNumberOfOperationsNotPositiveInteger(String),

    #[error("anchored data operation count {got} exceeds the maximum of {max}")]
    AnchoredDataNumberOfOperationsGreaterThanMax { got: u64, max: u64 },

    // ── Fees ─────────────────────────────────────────────────────────────────
    #[error("operation count must be greater than zero; got {0}")]
    OperationCountLessThanZero(i64),

    #[error("transaction fee paid {fee_paid} is less than the normalized fee {normalized_fee}")]
    TransactionFeePaidLessThanNormalizedFee { fee_paid: u64, normalized_fee: u64 },

    #[error("transaction fee paid {fee_paid} is below the per-operation minimum for {op_count} operations")]
    TransactionFeePaidInvalid { fee_paid: u64, op_count: u64 },

    // ── Value time lock ──────────────────────────────────────────────────────
    #[error("a value time lock is required for {op_count} operations (maximum without lock is {max})")]
    ValueTimeLockRequired { op_count: u64, max: u64 },

    #[error("value time lock owner `{owner}` does not match transaction writer `{writer}`")]
    ValueTimeLockOwnerMismatch { owner: String, writer: String },

    #[error("transaction time {transaction_time} is outside the lock window [{lock_time}, {unlock_time})")]
    ValueTimeLockOutsideWindow {
        transaction_time: u64,
        lock_time: u64,
        unlock_time: u64,
    },

    #[error("value time lock amount {amount_locked} is less than the required {required}")]
    ValueTimeLockAmountInsufficient { amount_locked: u64, required: u64 },

    // ── Transaction processing ───────────────────────────────────────────────
    #[error("core index file has {got} operations but the anchor string claims {claimed}")]
    CoreIndexFileOperationCountExceedsClaimed { got: u64, claimed: u64 },

    // ── Operation queue ──────────────────────────────────────────────────────
    #[error("an operation for DID suffix `{0}` is already queued")]
    QueueingMultipleOperationsPerDidNotAllowed(String),

    // ── Throughput limiter ───────────────────────────────────────────────────
    #[error("transactions handed to the throughput limiter span multiple blocks")]
    TransactionsNotInSameBlock,

    // ── CAS fetch results ────────────────────────────────────────────────────
    #[error("CAS is not reachable")]
    CasNotReachable,

    #[error("CAS file `{0}` not found")]
    CasFileNotFound(String),

    #[error("CAS file `{0}` exceeded the maximum allowed fetch size")]
    CasFileTooLarge(String),

    #[error("CAS URI `{0}` does not resolve to a file")]
    CasFileNotAFile(String),

    #[error("CAS file `{0}` failed content hash validation")]
    CasFileHashInvalid(String),

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    // ── Ledger ───────────────────────────────────────────────────────────────
    #[error("ledger error: {0}")]
    Ledger(String),
}

impl TrellisError {
    /// True for the I/O classes the transaction processor may retry later.
    /// Every other code is a permanent verdict on its input.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TrellisError::CasNotReachable | TrellisError::CasFileNotFound(_)
        )
    }
}
