use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::TrellisError;

/// Protocol parameters, loaded once at startup and shared read-only.
///
/// A deployment provides a JSON file overriding any subset of fields;
/// missing fields fall back to the compiled defaults in `constants`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolParameters {
    pub max_operations_per_batch: u64,
    pub max_operations_per_transaction_time: u64,
    pub max_number_of_operations_for_no_value_time_lock: u64,

    pub max_core_index_file_size_in_bytes: u64,
    pub max_provisional_index_file_size_in_bytes: u64,
    pub max_proof_file_size_in_bytes: u64,
    pub max_chunk_file_size_in_bytes: u64,
    pub estimated_decompression_multiplier: u64,

    pub max_delta_size_in_bytes: usize,
    pub max_encoded_reveal_value_length: usize,
    pub max_cas_uri_length: usize,

    /// Fixed to SHA-256 (0x12) for this protocol version.
    pub hash_algorithm_in_multihash_code: u64,

    pub normalized_to_per_operation_fee_factor: f64,
    pub normalized_fee_to_per_operation_fee_multiplier: f64,
    pub value_time_lock_amount_multiplier: f64,

    pub min_confirmations: u64,

    pub max_concurrent_downloads: usize,
    pub unresolvable_transaction_base_retry_delay_ms: i64,
}

impl Default for ProtocolParameters {
    fn default() -> Self {
        Self {
            max_operations_per_batch: constants::MAX_OPERATIONS_PER_BATCH,
            max_operations_per_transaction_time: constants::MAX_OPERATIONS_PER_TRANSACTION_TIME,
            max_number_of_operations_for_no_value_time_lock:
                constants::MAX_NUMBER_OF_OPERATIONS_FOR_NO_VALUE_TIME_LOCK,
            max_core_index_file_size_in_bytes: constants::MAX_CORE_INDEX_FILE_SIZE_IN_BYTES,
            max_provisional_index_file_size_in_bytes:
                constants::MAX_PROVISIONAL_INDEX_FILE_SIZE_IN_BYTES,
            max_proof_file_size_in_bytes: constants::MAX_PROOF_FILE_SIZE_IN_BYTES,
            max_chunk_file_size_in_bytes: constants::MAX_CHUNK_FILE_SIZE_IN_BYTES,
            estimated_decompression_multiplier: constants::ESTIMATED_DECOMPRESSION_MULTIPLIER,
            max_delta_size_in_bytes: constants::MAX_DELTA_SIZE_IN_BYTES,
            max_encoded_reveal_value_length: constants::MAX_ENCODED_REVEAL_VALUE_LENGTH,
            max_cas_uri_length: constants::MAX_CAS_URI_LENGTH,
            hash_algorithm_in_multihash_code: constants::SHA256_MULTIHASH_CODE,
            normalized_to_per_operation_fee_factor:
                constants::NORMALIZED_TO_PER_OPERATION_FEE_FACTOR,
            normalized_fee_to_per_operation_fee_multiplier:
                constants::NORMALIZED_FEE_TO_PER_OPERATION_FEE_MULTIPLIER,
            value_time_lock_amount_multiplier: constants::VALUE_TIME_LOCK_AMOUNT_MULTIPLIER,
            min_confirmations: constants::MIN_CONFIRMATIONS,
            max_concurrent_downloads: constants::MAX_CONCURRENT_DOWNLOADS,
            unresolvable_transaction_base_retry_delay_ms:
                constants::UNRESOLVABLE_TRANSACTION_BASE_RETRY_DELAY_MS,
        }
    }
}

impl ProtocolParameters {
    /// Load parameters from a JSON file, falling back to defaults for any
    /// field the file omits.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, TrellisError> {
        let json = std::fs::read_to_string(path.as_ref())
            .map_err(|e| TrellisError::Storage(format!("reading protocol parameters: {e}")))?;
        serde_json::from_str(&json).map_err(|e| TrellisError::JsonNotParsable {
            context: "protocol parameters".into(),
            detail: e.to_string(),
        })
    }

    /// Decompression cap for a file type: `size cap × ratio bound`.
    pub fn max_decompressed_size(&self, compressed_size_limit: u64) -> u64 {
        compressed_size_limit * self.estimated_decompression_multiplier
    }
}
