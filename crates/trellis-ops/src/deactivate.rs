use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use trellis_core::types::DidSuffix;
use trellis_core::{ProtocolParameters, TrellisError};
use trellis_crypto::jws::{CompactJws, Jwk};
use trellis_crypto::multihash;

use crate::validation::{
    ensure_allowed_properties, require_string, validate_did_suffix, validate_reveal_value,
};

/// Signed-data payload of a deactivate: the DID being retired and the
/// recovery key authorizing its retirement. There is no delta and no next
/// commitment; a deactivated DID is final.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeactivateSignedData {
    pub did_suffix: String,
    pub recovery_key: Jwk,
}

/// A validated deactivate request.
#[derive(Clone, Debug, PartialEq)]
pub struct DeactivateOperation {
    pub did_suffix: DidSuffix,
    pub reveal_value: String,
    pub signed_data_jws: CompactJws,
    pub signed_data: DeactivateSignedData,
    pub operation_buffer: Vec<u8>,
}

impl DeactivateOperation {
    /// Parse a full deactivate request:
    /// `{ type, did_suffix, reveal_value, signed_data }`.
    pub fn parse(buffer: &[u8], params: &ProtocolParameters) -> Result<Self, TrellisError> {
        let object = crate::validation::parse_json_object(buffer, "deactivate operation")?;
        ensure_allowed_properties(
            &object,
            "deactivate operation",
            &["type", "did_suffix", "reveal_value", "signed_data"],
        )?;
        let operation_type = require_string(&object, "deactivate operation", "type")?;
        if operation_type != "deactivate" {
            return Err(TrellisError::OperationTypeUnknown(operation_type.to_string()));
        }
        Self::parse_parts(&object, "deactivate operation", buffer.to_vec(), params)
    }

    /// Parse the embedded form composed from an index-file reference and its
    /// proof: `{ did_suffix, reveal_value, signed_data }`.
    pub fn parse_embedded(
        object: &Map<String, Value>,
        params: &ProtocolParameters,
    ) -> Result<Self, TrellisError> {
        ensure_allowed_properties(
            object,
            "deactivate reference",
            &["did_suffix", "reveal_value", "signed_data"],
        )?;
        let operation_buffer = crate::compose::map_to_buffer(object)?;
        Self::parse_parts(object, "deactivate reference", operation_buffer, params)
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
        let signed_data: DeactivateSignedData = signed_data_jws.decode_payload()?;

        if signed_data.did_suffix != did_suffix {
            return Err(TrellisError::DeactivateDidSuffixMismatch {
                signed: signed_data.did_suffix.clone(),
                expected: did_suffix.to_string(),
            });
        }

        let key_hash = multihash::canonicalize_then_hash_then_encode(&signed_data.recovery_key)?;
        if key_hash != reveal_value {
            return Err(TrellisError::RevealValueMismatch);
        }

        Ok(Self {
            did_suffix: did_suffix.to_string(),
            reveal_value: reveal_value.to_string(),
            signed_data_jws,
            signed_data,
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

    fn valid_request(did_suffix: &str) -> Value {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut rand::thread_rng());
        let recovery_key = Jwk::from_public_key(&public_key);

        let signed_data = DeactivateSignedData {
            did_suffix: did_suffix.to_string(),
            recovery_key: recovery_key.clone(),
        };
        json!({
            "type": "deactivate",
            "did_suffix": did_suffix,
            "reveal_value": multihash::canonicalize_then_hash_then_encode(&recovery_key).unwrap(),
            "signed_data": CompactJws::sign(&signed_data, &secret_key).unwrap(),
        })
    }

    #[test]
    fn full_request_parses() {
        let request = valid_request("EiDyOQbbZAa3aiRzeCkV7LOx3SERjjH93EXoIM3UoN4oWg");
        let buffer = serde_json::to_vec(&request).unwrap();
        let operation = DeactivateOperation::parse(&buffer, &params()).unwrap();
        assert_eq!(operation.signed_data.did_suffix, operation.did_suffix);
    }

    #[test]
    fn delta_property_rejected() {
        let mut request = valid_request("EiDyOQbbZAa3aiRzeCkV7LOx3SERjjH93EXoIM3UoN4oWg");
        request["delta"] = json!({"patches": []});
        let buffer = serde_json::to_vec(&request).unwrap();
        assert!(matches!(
            DeactivateOperation::parse(&buffer, &params()),
            Err(TrellisError::UnexpectedProperty { .. })
        ));
    }

    #[test]
    fn signed_did_suffix_must_match() {
        let mut request = valid_request("EiDyOQbbZAa3aiRzeCkV7LOx3SERjjH93EXoIM3UoN4oWg");
        request["did_suffix"] = json!("EiAotherSuffixEntirely");
        let buffer = serde_json::to_vec(&request).unwrap();
        assert!(matches!(
            DeactivateOperation::parse(&buffer, &params()),
            Err(TrellisError::DeactivateDidSuffixMismatch { .. })
        ));
    }
}
