use std::collections::HashSet;

use serde_json::{json, Map, Value};
use trellis_core::types::DidSuffix;
use trellis_core::{ProtocolParameters, TrellisError};
use trellis_ops::create::CreateOperation;
use trellis_ops::deactivate::DeactivateOperation;
use trellis_ops::recover::RecoverOperation;
use trellis_ops::validation::{
    ensure_allowed_properties, into_object, optional_string, parse_json_object,
};

use crate::compressor;
use crate::reference::{validate_cas_uri, OperationReference};

/// The batch's root artifact: which DIDs are created, recovered, or
/// deactivated, plus the URIs of the dependent files.
#[derive(Clone, Debug, PartialEq)]
pub struct CoreIndexFile {
    pub writer_lock_id: Option<String>,
    pub provisional_index_file_uri: Option<String>,
    pub core_proof_file_uri: Option<String>,
    pub create_operations: Vec<CreateOperation>,
    pub recover_references: Vec<OperationReference>,
    pub deactivate_references: Vec<OperationReference>,
}

impl CoreIndexFile {
    /// Total operations declared by this file.
    pub fn operation_count(&self) -> u64 {
        (self.create_operations.len()
            + self.recover_references.len()
            + self.deactivate_references.len()) as u64
    }

    /// Every DID suffix referenced by this file (guaranteed unique after a
    /// successful parse).
    pub fn did_suffixes(&self) -> Vec<DidSuffix> {
        let mut suffixes: Vec<DidSuffix> = self
            .create_operations
            .iter()
            .map(|op| op.did_suffix.clone())
            .collect();
        suffixes.extend(self.recover_references.iter().map(|r| r.did_suffix.clone()));
        suffixes.extend(
            self.deactivate_references
                .iter()
                .map(|r| r.did_suffix.clone()),
        );
        suffixes
    }

    /// Assemble and gzip the file for CAS upload.
    pub fn build(
        writer_lock_id: Option<&str>,
        provisional_index_file_uri: Option<&str>,
        core_proof_file_uri: Option<&str>,
        creates: &[CreateOperation],
        recovers: &[RecoverOperation],
        deactivates: &[DeactivateOperation],
    ) -> Result<Vec<u8>, TrellisError> {
        let mut root = Map::new();
        if let Some(lock_id) = writer_lock_id {
            root.insert("writer_lock_id".into(), json!(lock_id));
        }
        if let Some(uri) = provisional_index_file_uri {
            root.insert("provisional_index_file_uri".into(), json!(uri));
        }
        if let Some(uri) = core_proof_file_uri {
            root.insert("core_proof_file_uri".into(), json!(uri));
        }

        let mut operations = Map::new();
        if !creates.is_empty() {
            let entries: Vec<Value> = creates
                .iter()
                .map(|op| json!({ "suffix_data": op.suffix_data }))
                .collect();
            operations.insert("create".into(), Value::Array(entries));
        }
        if !recovers.is_empty() {
            let entries: Vec<Value> = recovers
                .iter()
                .map(|op| json!({ "did_suffix": op.did_suffix, "reveal_value": op.reveal_value }))
                .collect();
            operations.insert("recover".into(), Value::Array(entries));
        }
        if !deactivates.is_empty() {
            let entries: Vec<Value> = deactivates
                .iter()
                .map(|op| json!({ "did_suffix": op.did_suffix, "reveal_value": op.reveal_value }))
                .collect();
            operations.insert("deactivate".into(), Value::Array(entries));
        }
        if !operations.is_empty() {
            root.insert("operations".into(), Value::Object(operations));
        }

        let serialized = serde_json::to_vec(&Value::Object(root))
            .map_err(|e| TrellisError::Serialization(e.to_string()))?;
        compressor::compress(&serialized)
    }

    /// Decompress, decode, and strictly validate a fetched core index file.
    pub fn parse(
        compressed: &[u8],
        params: &ProtocolParameters,
    ) -> Result<Self, TrellisError> {
        let max_decompressed =
            params.max_decompressed_size(params.max_core_index_file_size_in_bytes);
        let content = compressor::decompress(compressed, max_decompressed)?;
        let root = parse_json_object(&content, "core index file")?;
        ensure_allowed_properties(
            &root,
            "core index file",
            &[
                "writer_lock_id",
                "provisional_index_file_uri",
                "core_proof_file_uri",
                "operations",
            ],
        )?;

        let writer_lock_id =
            optional_string(&root, "core index file", "writer_lock_id")?.map(str::to_string);
        let provisional_index_file_uri =
            optional_string(&root, "core index file", "provisional_index_file_uri")?
                .map(str::to_string);
        let core_proof_file_uri =
            optional_string(&root, "core index file", "core_proof_file_uri")?.map(str::to_string);
        if let Some(uri) = &provisional_index_file_uri {
            validate_cas_uri(uri, params)?;
        }
        if let Some(uri) = &core_proof_file_uri {
            validate_cas_uri(uri, params)?;
        }

        let mut create_operations = Vec::new();
        let mut recover_references = Vec::new();
        let mut deactivate_references = Vec::new();

        if let Some(operations_value) = root.get("operations") {
            let operations = into_object(operations_value.clone(), "core index file.operations")?;
            ensure_allowed_properties(
                &operations,
                "core index file.operations",
                &["create", "recover", "deactivate"],
            )?;

            if let Some(create_value) = operations.get("create") {
                let items = match create_value {
                    Value::Array(items) => items,
                    _ => return Err(TrellisError::NotAnArray("operations.create".into())),
                };
                for item in items {
                    let object = match item {
                        Value::Object(object) => object,
                        _ => return Err(TrellisError::NotAnObject("create reference".into())),
                    };
                    create_operations.push(CreateOperation::parse_embedded(object)?);
                }
            }
            if let Some(recover_value) = operations.get("recover") {
                let items = match recover_value {
                    Value::Array(items) => items.as_slice(),
                    _ => return Err(TrellisError::NotAnArray("operations.recover".into())),
                };
                recover_references =
                    OperationReference::parse_array(items, "recover reference", params)?;
            }
            if let Some(deactivate_value) = operations.get("deactivate") {
                let items = match deactivate_value {
                    Value::Array(items) => items.as_slice(),
                    _ => return Err(TrellisError::NotAnArray("operations.deactivate".into())),
                };
                deactivate_references =
                    OperationReference::parse_array(items, "deactivate reference", params)?;
            }
        }

        let file = Self {
            writer_lock_id,
            provisional_index_file_uri,
            core_proof_file_uri,
            create_operations,
            recover_references,
            deactivate_references,
        };
        file.validate_uri_presence()?;
        file.validate_unique_did_suffixes()?;
        Ok(file)
    }

    /// `provisional_index_file_uri` is required when any create or recover
    /// is present and forbidden when the file's operations are deactivates
    /// only (an update-only batch has no core operations and may still
    /// carry the URI); `core_proof_file_uri` is required exactly when the
    /// batch has core proofs (recovers or deactivates).
    fn validate_uri_presence(&self) -> Result<(), TrellisError> {
        let needs_provisional =
            !self.create_operations.is_empty() || !self.recover_references.is_empty();
        let deactivates_only = !needs_provisional && !self.deactivate_references.is_empty();
        match (&self.provisional_index_file_uri, needs_provisional) {
            (None, true) => return Err(TrellisError::ProvisionalIndexFileUriMissing),
            (Some(_), false) if deactivates_only => {
                return Err(TrellisError::ProvisionalIndexFileUriNotAllowed)
            }
            _ => {}
        }

        let needs_core_proof =
            !self.recover_references.is_empty() || !self.deactivate_references.is_empty();
        match (&self.core_proof_file_uri, needs_core_proof) {
            (None, true) => return Err(TrellisError::CoreProofFileUriMissing),
            (Some(_), false) => return Err(TrellisError::CoreProofFileUriNotAllowed),
            _ => {}
        }
        Ok(())
    }

    fn validate_unique_did_suffixes(&self) -> Result<(), TrellisError> {
        let mut seen = HashSet::new();
        for suffix in self.did_suffixes() {
            if !seen.insert(suffix.clone()) {
                return Err(TrellisError::DuplicateDidSuffix(suffix));
            }
        }
        Ok(())
    }
}
