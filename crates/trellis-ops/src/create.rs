use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use trellis_core::types::DidSuffix;
use trellis_core::{ProtocolParameters, TrellisError};
use trellis_crypto::multihash;

use crate::compose;
use crate::delta;
use crate::validation::{ensure_allowed_properties, require_object, require_string};

// ── SuffixData ───────────────────────────────────────────────────────────────

/// The portion of a create request that is hashed into the DID suffix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuffixData {
    /// Encoded multihash of the create delta.
    pub delta_hash: String,
    /// Commitment the first recover operation must reveal against.
    pub recovery_commitment: String,
}

impl SuffixData {
    /// Parse and validate a `suffix_data` object.
    pub fn parse(object: &Map<String, Value>) -> Result<Self, TrellisError> {
        ensure_allowed_properties(object, "suffix_data", &["delta_hash", "recovery_commitment"])?;
        let delta_hash = require_string(object, "suffix_data", "delta_hash")?;
        let recovery_commitment = require_string(object, "suffix_data", "recovery_commitment")?;
        multihash::verify_computed_using_latest_algorithm(delta_hash)?;
        multihash::verify_computed_using_latest_algorithm(recovery_commitment)?;
        Ok(Self {
            delta_hash: delta_hash.to_string(),
            recovery_commitment: recovery_commitment.to_string(),
        })
    }

    /// The DID suffix this data commits to.
    pub fn to_did_suffix(&self) -> Result<DidSuffix, TrellisError> {
        multihash::canonicalize_then_hash_then_encode(self)
    }
}

// ── CreateOperation ──────────────────────────────────────────────────────────

/// A validated create request.
#[derive(Clone, Debug, PartialEq)]
pub struct CreateOperation {
    /// Computed: `b64url(multihash(canonical(suffix_data)))`.
    pub did_suffix: DidSuffix,
    pub suffix_data: SuffixData,
    /// Absent when the delta was pruned, oversize, or failed its hash check.
    pub delta: Option<Value>,
    pub operation_buffer: Vec<u8>,
}

impl CreateOperation {
    /// Parse a full create request: `{ type, suffix_data, delta? }`.
    pub fn parse(buffer: &[u8], params: &ProtocolParameters) -> Result<Self, TrellisError> {
        let object = crate::validation::parse_json_object(buffer, "create operation")?;
        ensure_allowed_properties(&object, "create operation", &["type", "suffix_data", "delta"])?;

        let operation_type = require_string(&object, "create operation", "type")?;
        if operation_type != "create" {
            return Err(TrellisError::OperationTypeUnknown(operation_type.to_string()));
        }

        let suffix_data_object = require_object(&object, "create operation", "suffix_data")?;
        let suffix_data = SuffixData::parse(&suffix_data_object)?;
        let did_suffix = suffix_data.to_did_suffix()?;
        let delta = delta::accept_if_valid(object.get("delta"), &suffix_data.delta_hash, params);

        Ok(Self {
            did_suffix,
            suffix_data,
            delta,
            operation_buffer: buffer.to_vec(),
        })
    }

    /// Parse the embedded form found in core index files: `{ suffix_data }`.
    pub fn parse_embedded(object: &Map<String, Value>) -> Result<Self, TrellisError> {
        ensure_allowed_properties(object, "create reference", &["suffix_data"])?;
        let suffix_data_object = require_object(object, "create reference", "suffix_data")?;
        let suffix_data = SuffixData::parse(&suffix_data_object)?;
        let did_suffix = suffix_data.to_did_suffix()?;
        let operation_buffer = compose::create_request(&suffix_data, None)?;

        Ok(Self {
            did_suffix,
            suffix_data,
            delta: None,
            operation_buffer,
        })
    }
}
