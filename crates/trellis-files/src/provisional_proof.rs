use serde_json::{json, Value};
use trellis_core::{ProtocolParameters, TrellisError};
use trellis_crypto::jws::CompactJws;
use trellis_ops::update::UpdateOperation;
use trellis_ops::validation::{ensure_allowed_properties, parse_json_object, require_object};

use crate::compressor;
use crate::core_proof::parse_proof_array;

/// Signed data for the provisional index file's update references, in the
/// same order as the references themselves.
#[derive(Clone, Debug, PartialEq)]
pub struct ProvisionalProofFile {
    pub update_proofs: Vec<CompactJws>,
}

impl ProvisionalProofFile {
    /// Assemble and gzip the file for CAS upload.
    pub fn build(updates: &[UpdateOperation]) -> Result<Vec<u8>, TrellisError> {
        let entries: Vec<Value> = updates
            .iter()
            .map(|op| json!({ "signed_data": op.signed_data_jws.to_compact() }))
            .collect();
        let serialized = serde_json::to_vec(&json!({ "operations": { "update": entries } }))
            .map_err(|e| TrellisError::Serialization(e.to_string()))?;
        compressor::compress(&serialized)
    }

    /// Decompress, decode, and strictly validate a fetched provisional
    /// proof file.
    pub fn parse(
        compressed: &[u8],
        params: &ProtocolParameters,
    ) -> Result<Self, TrellisError> {
        let max_decompressed = params.max_decompressed_size(params.max_proof_file_size_in_bytes);
        let content = compressor::decompress(compressed, max_decompressed)?;
        let root = parse_json_object(&content, "provisional proof file")?;
        ensure_allowed_properties(&root, "provisional proof file", &["operations"])?;

        let operations = require_object(&root, "provisional proof file", "operations")?;
        ensure_allowed_properties(&operations, "provisional proof file.operations", &["update"])?;

        let update_proofs = parse_proof_array(&operations, "update")?;
        if update_proofs.is_empty() {
            return Err(TrellisError::ProvisionalProofCountMismatch {
                got: 0,
                expected: 1,
            });
        }
        Ok(Self { update_proofs })
    }
}
