use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use trellis_core::types::DidSuffix;
use trellis_core::{ProtocolParameters, TrellisError};
use trellis_crypto::jws::{CompactJws, Jwk};
use trellis_crypto::multihash;

use crate::delta;
use crate::validation::{
    ensure_allowed_properties, require_string, validate_did_suffix, validate_reveal_value,
};

/// Signed-data payload of a recover: the new delta commitment, the recovery
/// key being revealed, and the commitment for the next recovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecoverSignedData {
    pub delta_hash: String,
    pub recovery_key: Jwk,
    pub recovery_commitment: String,
}

/// A validated recover request.
#[derive(Clone, Debug, PartialEq)]
pub struct RecoverOperation {
    pub did_suffix: DidSuffix,
    pub reveal_value: String,
    pub signed_data_jws: CompactJws,
    pub signed_data: RecoverSignedData,
    /// Absent when the delta was pruned, oversize, or failed its hash check.
    pub delta: Option<Value>,
    pub operation_buffer: Vec<u8>,
}

impl RecoverOperation {
    /// Parse a full recover request:
    /// `{ type, did_suffix, reveal_value, signed_data, delta? }`.
    pub fn parse(buffer: &[u8], params: &ProtocolParameters) -> Result<Self, TrellisError> {
        let object = crate::validation::parse_json_object(buffer, "recover operation")?;
        ensure_allowed_properties(
            &object,
            "recover operation",
            &["type", "did_suffix", "reveal_value", "signed_data", "delta"],
        )?;
        let operation_type = require_string(&object, "recover operation", "type")?;
        if operation_type != "recover" {
            return Err(TrellisError::OperationTypeUnknown(operation_type.to_string()));
        }
        Self::parse_parts(&object, "recover operation", buffer.to_vec(), params)
    }

    /// Parse the embedded form composed from an index-file reference and its
    /// proof: `{ did_suffix, reveal_value, signed_data }`.
    pub fn parse_embedded(
        object: &Map<String, Value>,
        params: &ProtocolParameters,
    ) -> Result<Self, TrellisError> {
        ensure_allowed_properties(
            object,
            "recover reference",
            &["did_suffix", "reveal_value", "signed_data"],
        )?;
        let operation_buffer = crate::compose::map_to_buffer(object)?;
        Self::parse_parts(object, "recover reference", operation_buffer, params)
    }

    fn parse_parts(
        object: &Map<String, Value>,
        context: &str,
        operation_buffer: Vec<u8>,
        params: &ProtocolParameters,
    ) -> Result<Self, TrellisError> {
        let did_suffix = require_string(object, context, "did_suffix")?;
        validate_did_suffix(did_suffix, "did_suffix")?;

        let reveal_value = require_string(object, context, "reveal_value")?;
        validate_reveal_value(
            reveal_value,
            params.max_encoded_reveal_value_length,
            "reveal_value",
        )?;

        let compact = require_string(object, context, "signed_data")?;
        let signed_data_jws = CompactJws::parse(compact)?;
        let signed_data: RecoverSignedData = signed_data_jws.decode_payload()?;
        multihash::verify_computed_using_latest_algorithm(&signed_data.delta_hash)?;
        multihash::verify_computed_using_latest_algorithm(&signed_data.recovery_commitment)?;

        let key_hash = multihash::canonicalize_then_hash_then_encode(&signed_data.recovery_key)?;
        if key_hash != reveal_value {
            return Err(TrellisError::RevealValueMismatch);
        }

        let delta = delta::accept_if_valid(object.get("delta"), &signed_data.delta_hash, params);

        Ok(Self {
            did_suffix: did_suffix.to_string(),
            reveal_value: reveal_value.to_string(),
            signed_data_jws,
            signed_data,
            delta,
            operation_buffer,
        })
    }
}
