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

/// Signed-data payload of an update: the delta being committed to and the
/// key whose hash must match the operation's reveal value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSignedData {
    pub delta_hash: String,
    pub update_key: Jwk,
}

/// A validated update request.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateOperation {
    pub did_suffix: DidSuffix,
    pub reveal_value: String,
    pub signed_data_jws: CompactJws,
    pub signed_data: UpdateSignedData,
    /// Absent when the delta was pruned, oversize, or failed its hash check.
    pub delta: Option<Value>,
    pub operation_buffer: Vec<u8>,
}

impl UpdateOperation {
    /// Parse a full update request:
    /// `{ type, did_suffix, reveal_value, signed_data, delta? }`.
    pub fn parse(buffer: &[u8], params: &ProtocolParameters) -> Result<Self, TrellisError> {
        let object = crate::validation::parse_json_object(buffer, "update operation")?;
        ensure_allowed_properties(
            &object,
            "update operation",
            &["type", "did_suffix", "reveal_value", "signed_data", "delta"],
        )?;
        let operation_type = require_string(&object, "update operation", "type")?;
        if operation_type != "update" {
            return Err(TrellisError::OperationTypeUnknown(operation_type.to_string()));
        }
        Self::parse_parts(&object, "update operation", buffer.to_vec(), params)
    }

    /// Parse the embedded form composed from an index-file reference and its
    /// proof: `{ did_suffix, reveal_value, signed_data }`.
    pub fn parse_embedded(
        object: &Map<String, Value>,
        params: &ProtocolParameters,
    ) -> Result<Self, TrellisError> {
        ensure_allowed_properties(
            object,
            "update reference",
            &["did_suffix", "reveal_value", "signed_data"],
        )?;
        let operation_buffer = crate::compose::map_to_buffer(object)?;
        Self::parse_parts(object, "update reference", operation_buffer, params)
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
        let signed_data: UpdateSignedData = signed_data_jws.decode_payload()?;
        multihash::verify_computed_using_latest_algorithm(&signed_data.delta_hash)?;

        // The reveal value must be the hash of the key authorizing this
        // update; the resolver later matches it against the commitment
        // chain, so the binding is checked where the key first appears.
        let key_hash = multihash::canonicalize_then_hash_then_encode(&signed_data.update_key)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::Secp256k1;
    use serde_json::json;

    fn params() -> ProtocolParameters {
        ProtocolParameters::default()
    }

    fn valid_request() -> (Value, Value) {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut rand::thread_rng());
        let update_key = Jwk::from_public_key(&public_key);

        let update_delta = json!({"patches": [{"action": "replace"}]});
        let signed_data = UpdateSignedData {
            delta_hash: delta::hash(&update_delta).unwrap(),
            update_key: update_key.clone(),
        };
        let compact = CompactJws::sign(&signed_data, &secret_key).unwrap();

        let request = json!({
            "type": "update",
            "did_suffix": "EiDyOQbbZAa3aiRzeCkV7LOx3SERjjH93EXoIM3UoN4oWg",
            "reveal_value": multihash::canonicalize_then_hash_then_encode(&update_key).unwrap(),
            "signed_data": compact,
            "delta": update_delta.clone(),
        });
        (request, update_delta)
    }

    #[test]
    fn full_request_parses() {
        let (request, update_delta) = valid_request();
        let buffer = serde_json::to_vec(&request).unwrap();
        let operation = UpdateOperation::parse(&buffer, &params()).unwrap();
        assert_eq!(operation.delta, Some(update_delta));
        assert_eq!(operation.operation_buffer, buffer);
    }

    #[test]
    fn reveal_value_must_hash_the_update_key() {
        let (mut request, _) = valid_request();
        request["reveal_value"] = json!(multihash::hash_then_encode(b"some other key"));
        let buffer = serde_json::to_vec(&request).unwrap();
        assert!(matches!(
            UpdateOperation::parse(&buffer, &params()),
            Err(TrellisError::RevealValueMismatch)
        ));
    }

    #[test]
    fn oversize_reveal_value_rejected() {
        let (request, _) = valid_request();
        let buffer = serde_json::to_vec(&request).unwrap();
        let mut p = params();
        p.max_encoded_reveal_value_length = 4;
        assert!(matches!(
            UpdateOperation::parse(&buffer, &p),
            Err(TrellisError::RevealValueTooLong { .. })
        ));
    }

    #[test]
    fn signed_data_payload_is_additive_strict() {
        let (mut request, _) = valid_request();
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut rand::thread_rng());
        let payload = json!({
            "delta_hash": multihash::hash_then_encode(b"d"),
            "update_key": Jwk::from_public_key(&public_key),
            "surprise": true,
        });
        request["signed_data"] = json!(CompactJws::sign(&payload, &secret_key).unwrap());
        let buffer = serde_json::to_vec(&request).unwrap();
        assert!(UpdateOperation::parse(&buffer, &params()).is_err());
    }

    #[test]
    fn mismatched_delta_is_pruned_not_fatal() {
        let (mut request, _) = valid_request();
        request["delta"] = json!({"patches": ["tampered"]});
        let buffer = serde_json::to_vec(&request).unwrap();
        let operation = UpdateOperation::parse(&buffer, &params()).unwrap();
        assert_eq!(operation.delta, None);
    }

    #[test]
    fn embedded_form_rejects_delta() {
        let (request, _) = valid_request();
        let embedded = json!({
            "did_suffix": request["did_suffix"].clone(),
            "reveal_value": request["reveal_value"].clone(),
            "signed_data": request["signed_data"].clone(),
        });
        assert!(UpdateOperation::parse_embedded(embedded.as_object().unwrap(), &params()).is_ok());

        let with_delta = json!({
            "did_suffix": request["did_suffix"].clone(),
            "reveal_value": request["reveal_value"].clone(),
            "signed_data": request["signed_data"].clone(),
            "delta": {"patches": []},
        });
        assert!(matches!(
            UpdateOperation::parse_embedded(with_delta.as_object().unwrap(), &params()),
            Err(TrellisError::UnexpectedProperty { .. })
        ));
    }
}
