//! Canonical re-assembly of operation requests.
//!
//! The observer reconstructs full request buffers from index-file
//! references, proofs, and chunk-file deltas; composition always emits
//! canonical JSON so every node derives identical buffers.

use serde_json::{Map, Value};
use trellis_core::TrellisError;
use trellis_crypto::canonicalizer;

use crate::create::SuffixData;

/// Canonical bytes of an already-assembled object.
pub fn map_to_buffer(object: &Map<String, Value>) -> Result<Vec<u8>, TrellisError> {
    canonicalizer::canonicalize(object)
}

/// `{ type: "create", suffix_data, delta? }`
pub fn create_request(
    suffix_data: &SuffixData,
    delta: Option<&Value>,
) -> Result<Vec<u8>, TrellisError> {
    let mut object = Map::new();
    object.insert("type".into(), Value::String("create".into()));
    object.insert(
        "suffix_data".into(),
        serde_json::to_value(suffix_data).map_err(|e| TrellisError::Serialization(e.to_string()))?,
    );
    if let Some(delta) = delta {
        object.insert("delta".into(), delta.clone());
    }
    canonicalizer::canonicalize(&object)
}

/// `{ type: "update", did_suffix, reveal_value, signed_data, delta? }`
pub fn update_request(
    did_suffix: &str,
    reveal_value: &str,
    signed_data: &str,
    delta: Option<&Value>,
) -> Result<Vec<u8>, TrellisError> {
    signed_request("update", did_suffix, reveal_value, signed_data, delta)
}

/// `{ type: "recover", did_suffix, reveal_value, signed_data, delta? }`
pub fn recover_request(
    did_suffix: &str,
    reveal_value: &str,
    signed_data: &str,
    delta: Option<&Value>,
) -> Result<Vec<u8>, TrellisError> {
    signed_request("recover", did_suffix, reveal_value, signed_data, delta)
}

/// `{ type: "deactivate", did_suffix, reveal_value, signed_data }`
pub fn deactivate_request(
    did_suffix: &str,
    reveal_value: &str,
    signed_data: &str,
) -> Result<Vec<u8>, TrellisError> {
    signed_request("deactivate", did_suffix, reveal_value, signed_data, None)
}

fn signed_request(
    operation_type: &str,
    did_suffix: &str,
    reveal_value: &str,
    signed_data: &str,
    delta: Option<&Value>,
) -> Result<Vec<u8>, TrellisError> {
    let mut object = Map::new();
    object.insert("type".into(), Value::String(operation_type.into()));
    object.insert("did_suffix".into(), Value::String(did_suffix.into()));
    object.insert("reveal_value".into(), Value::String(reveal_value.into()));
    object.insert("signed_data".into(), Value::String(signed_data.into()));
    if let Some(delta) = delta {
        object.insert("delta".into(), delta.clone());
    }
    canonicalizer::canonicalize(&object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn composition_is_canonical() {
        let buffer = deactivate_request("EiAd", "EiAr", "h.p.s").unwrap();
        let text = String::from_utf8(buffer).unwrap();
        // JCS orders keys lexicographically.
        assert_eq!(
            text,
            r#"{"did_suffix":"EiAd","reveal_value":"EiAr","signed_data":"h.p.s","type":"deactivate"}"#
        );
    }

    #[test]
    fn delta_is_included_when_present() {
        let delta = json!({"patches": []});
        let buffer = update_request("EiAd", "EiAr", "h.p.s", Some(&delta)).unwrap();
        let parsed: Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(parsed["delta"], delta);
    }
}
