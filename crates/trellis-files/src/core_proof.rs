use serde_json::{json, Map, Value};
use trellis_core::{ProtocolParameters, TrellisError};
use trellis_crypto::jws::CompactJws;
use trellis_ops::deactivate::DeactivateOperation;
use trellis_ops::recover::RecoverOperation;
use trellis_ops::validation::{
    ensure_allowed_properties, into_object, parse_json_object, require_object, require_string,
};

use crate::compressor;

/// Signed data for the core index file's recover and deactivate
/// references, in the same order as the references themselves.
#[derive(Clone, Debug, PartialEq)]
pub struct CoreProofFile {
    pub recover_proofs: Vec<CompactJws>,
    pub deactivate_proofs: Vec<CompactJws>,
}

impl CoreProofFile {
    pub fn proof_count(&self) -> usize {
        self.recover_proofs.len() + self.deactivate_proofs.len()
    }

    /// Assemble and gzip the file for CAS upload.
    pub fn build(
        recovers: &[RecoverOperation],
        deactivates: &[DeactivateOperation],
    ) -> Result<Vec<u8>, TrellisError> {
        let mut operations = Map::new();
        if !recovers.is_empty() {
            let entries: Vec<Value> = recovers
                .iter()
                .map(|op| json!({ "signed_data": op.signed_data_jws.to_compact() }))
                .collect();
            operations.insert("recover".into(), Value::Array(entries));
        }
        if !deactivates.is_empty() {
            let entries: Vec<Value> = deactivates
                .iter()
                .map(|op| json!({ "signed_data": op.signed_data_jws.to_compact() }))
                .collect();
            operations.insert("deactivate".into(), Value::Array(entries));
        }

        let serialized = serde_json::to_vec(&json!({ "operations": operations }))
            .map_err(|e| TrellisError::Serialization(e.to_string()))?;
        compressor::compress(&serialized)
    }

    /// Decompress, decode, and strictly validate a fetched core proof file.
    pub fn parse(
        compressed: &[u8],
        params: &ProtocolParameters,
    ) -> Result<Self, TrellisError> {
        let max_decompressed = params.max_decompressed_size(params.max_proof_file_size_in_bytes);
        let content = compressor::decompress(compressed, max_decompressed)?;
        let root = parse_json_object(&content, "core proof file")?;
        ensure_allowed_properties(&root, "core proof file", &["operations"])?;

        let operations = require_object(&root, "core proof file", "operations")?;
        ensure_allowed_properties(
            &operations,
            "core proof file.operations",
            &["recover", "deactivate"],
        )?;

        let recover_proofs = parse_proof_array(&operations, "recover")?;
        let deactivate_proofs = parse_proof_array(&operations, "deactivate")?;

        let file = Self {
            recover_proofs,
            deactivate_proofs,
        };
        if file.proof_count() == 0 {
            return Err(TrellisError::CoreProofFileEmpty);
        }
        Ok(file)
    }
}

/// Parse an optional array of `{ signed_data }` proof entries.
pub(crate) fn parse_proof_array(
    operations: &Map<String, Value>,
    property: &str,
) -> Result<Vec<CompactJws>, TrellisError> {
    let items = match operations.get(property) {
        None => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(TrellisError::NotAnArray(format!("operations.{property}"))),
    };

    let mut proofs = Vec::with_capacity(items.len());
    for item in items {
        let object = into_object(item.clone(), "proof entry")?;
        ensure_allowed_properties(&object, "proof entry", &["signed_data"])?;
        let compact = require_string(&object, "proof entry", "signed_data")?;
        proofs.push(CompactJws::parse(compact)?);
    }
    Ok(proofs)
}
