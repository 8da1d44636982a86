use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use trellis_core::types::DidSuffix;
use trellis_core::{ProtocolParameters, TrellisError};
use trellis_ops::validation::{
    ensure_allowed_properties, require_string, validate_did_suffix, validate_reveal_value,
};

/// The index-file reference form of a non-create operation:
/// the DID it targets and the reveal authorizing it. The signed data
/// travels separately in the matching proof file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationReference {
    pub did_suffix: DidSuffix,
    pub reveal_value: String,
}

impl OperationReference {
    /// Parse and validate `{ did_suffix, reveal_value }`.
    pub fn parse(
        object: &Map<String, Value>,
        context: &str,
        params: &ProtocolParameters,
    ) -> Result<Self, TrellisError> {
        ensure_allowed_properties(object, context, &["did_suffix", "reveal_value"])?;
        let did_suffix = require_string(object, context, "did_suffix")?;
        validate_did_suffix(did_suffix, "did_suffix")?;
        let reveal_value = require_string(object, context, "reveal_value")?;
        validate_reveal_value(
            reveal_value,
            params.max_encoded_reveal_value_length,
            "reveal_value",
        )?;
        Ok(Self {
            did_suffix: did_suffix.to_string(),
            reveal_value: reveal_value.to_string(),
        })
    }

    /// Parse an array of references, enforcing the shared property rules.
    pub fn parse_array(
        items: &[Value],
        context: &str,
        params: &ProtocolParameters,
    ) -> Result<Vec<Self>, TrellisError> {
        items
            .iter()
            .map(|item| match item {
                Value::Object(object) => Self::parse(object, context, params),
                _ => Err(TrellisError::NotAnObject(context.to_string())),
            })
            .collect()
    }
}

/// Validate a CAS URI referenced from a file or an anchor string: a
/// non-empty single-token string within the configured length cap.
pub fn validate_cas_uri(uri: &str, params: &ProtocolParameters) -> Result<(), TrellisError> {
    if uri.is_empty()
        || uri.len() > params.max_cas_uri_length
        || uri.chars().any(|c| c.is_whitespace() || c == '.')
    {
        return Err(TrellisError::CasUriInvalid(uri.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> ProtocolParameters {
        ProtocolParameters::default()
    }

    #[test]
    fn reference_parses() {
        let object = json!({"did_suffix": "EiAd", "reveal_value": "EiAr"});
        let reference =
            OperationReference::parse(object.as_object().unwrap(), "recover", &params()).unwrap();
        assert_eq!(reference.did_suffix, "EiAd");
    }

    #[test]
    fn reference_rejects_extra_properties() {
        let object = json!({"did_suffix": "EiAd", "reveal_value": "EiAr", "delta": {}});
        assert!(matches!(
            OperationReference::parse(object.as_object().unwrap(), "recover", &params()),
            Err(TrellisError::UnexpectedProperty { .. })
        ));
    }

    #[test]
    fn cas_uri_rules() {
        let p = params();
        assert!(validate_cas_uri("QmWvQxTqbG2Z9HPJgG57jjwR154cKo8k152", &p).is_ok());
        assert!(validate_cas_uri("", &p).is_err());
        assert!(validate_cas_uri("has space", &p).is_err());
        assert!(validate_cas_uri("dotted.uri", &p).is_err());
        assert!(validate_cas_uri(&"x".repeat(p.max_cas_uri_length + 1), &p).is_err());
    }
}
