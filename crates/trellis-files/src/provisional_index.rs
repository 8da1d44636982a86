use std::collections::HashSet;

use serde_json::{json, Map, Value};
use trellis_core::{ProtocolParameters, TrellisError};
use trellis_ops::update::UpdateOperation;
use trellis_ops::validation::{
    ensure_allowed_properties, into_object, optional_string, parse_json_object, require_array,
    require_string,
};

use crate::compressor;
use crate::reference::{validate_cas_uri, OperationReference};

/// The batch's second-tier index: which DIDs are updated, and the chunk
/// file carrying the batch's deltas. This protocol version mandates
/// exactly one chunk entry.
#[derive(Clone, Debug, PartialEq)]
pub struct ProvisionalIndexFile {
    pub provisional_proof_file_uri: Option<String>,
    pub update_references: Vec<OperationReference>,
    pub chunk_file_uri: String,
}

impl ProvisionalIndexFile {
    /// Assemble and gzip the file for CAS upload.
    pub fn build(
        provisional_proof_file_uri: Option<&str>,
        updates: &[UpdateOperation],
        chunk_file_uri: &str,
    ) -> Result<Vec<u8>, TrellisError> {
        let mut root = Map::new();
        if let Some(uri) = provisional_proof_file_uri {
            root.insert("provisional_proof_file_uri".into(), json!(uri));
        }
        if !updates.is_empty() {
            let entries: Vec<Value> = updates
                .iter()
                .map(|op| json!({ "did_suffix": op.did_suffix, "reveal_value": op.reveal_value }))
                .collect();
            root.insert("operations".into(), json!({ "update": entries }));
        }
        root.insert(
            "chunks".into(),
            json!([{ "chunk_file_uri": chunk_file_uri }]),
        );

        let serialized = serde_json::to_vec(&Value::Object(root))
            .map_err(|e| TrellisError::Serialization(e.to_string()))?;
        compressor::compress(&serialized)
    }

    /// Decompress, decode, and strictly validate a fetched provisional
    /// index file.
    pub fn parse(
        compressed: &[u8],
        params: &ProtocolParameters,
    ) -> Result<Self, TrellisError> {
        let max_decompressed =
            params.max_decompressed_size(params.max_provisional_index_file_size_in_bytes);
        let content = compressor::decompress(compressed, max_decompressed)?;
        let root = parse_json_object(&content, "provisional index file")?;
        ensure_allowed_properties(
            &root,
            "provisional index file",
            &["provisional_proof_file_uri", "operations", "chunks"],
        )?;

        let provisional_proof_file_uri =
            optional_string(&root, "provisional index file", "provisional_proof_file_uri")?
                .map(str::to_string);
        if let Some(uri) = &provisional_proof_file_uri {
            validate_cas_uri(uri, params)?;
        }

        let mut update_references = Vec::new();
        if let Some(operations_value) = root.get("operations") {
            let operations =
                into_object(operations_value.clone(), "provisional index file.operations")?;
            ensure_allowed_properties(&operations, "provisional index file.operations", &["update"])?;
            let items = require_array(&operations, "provisional index file.operations", "update")?;
            update_references =
                OperationReference::parse_array(&items, "update reference", params)?;
        }

        // Updates carry signatures in the proof file; each requires the
        // other.
        if update_references.is_empty() != provisional_proof_file_uri.is_none() {
            return Err(TrellisError::UpdatesAndProofFileMismatch);
        }

        let chunks = require_array(&root, "provisional index file", "chunks")?;
        if chunks.len() != 1 {
            return Err(TrellisError::ChunkCountIncorrect(chunks.len()));
        }
        let chunk_object = into_object(chunks[0].clone(), "chunk entry")?;
        ensure_allowed_properties(&chunk_object, "chunk entry", &["chunk_file_uri"])?;
        let chunk_file_uri = require_string(&chunk_object, "chunk entry", "chunk_file_uri")?;
        validate_cas_uri(chunk_file_uri, params)?;

        let mut seen = HashSet::new();
        for reference in &update_references {
            if !seen.insert(reference.did_suffix.clone()) {
                return Err(TrellisError::DuplicateDidSuffix(
                    reference.did_suffix.clone(),
                ));
            }
        }

        Ok(Self {
            provisional_proof_file_uri,
            update_references,
            chunk_file_uri: chunk_file_uri.to_string(),
        })
    }
}
