//! Property-by-property helpers shared by the operation and file parsers.

use serde_json::{Map, Value};
use trellis_core::TrellisError;
use trellis_crypto::encoder;

/// Decode a buffer into a JSON object, naming the context on failure.
pub fn parse_json_object(buffer: &[u8], context: &str) -> Result<Map<String, Value>, TrellisError> {
    let value: Value =
        serde_json::from_slice(buffer).map_err(|e| TrellisError::JsonNotParsable {
            context: context.to_string(),
            detail: e.to_string(),
        })?;
    into_object(value, context)
}

/// Require a value to be a JSON object and take ownership of its map.
pub fn into_object(value: Value, context: &str) -> Result<Map<String, Value>, TrellisError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(TrellisError::NotAnObject(context.to_string())),
    }
}

/// Reject any property outside the allowed set. Missing properties are the
/// caller's concern; this only enforces additive strictness.
pub fn ensure_allowed_properties(
    object: &Map<String, Value>,
    context: &str,
    allowed: &[&str],
) -> Result<(), TrellisError> {
    for property in object.keys() {
        if !allowed.contains(&property.as_str()) {
            return Err(TrellisError::UnexpectedProperty {
                context: context.to_string(),
                property: property.clone(),
            });
        }
    }
    Ok(())
}

/// A required string property.
pub fn require_string<'a>(
    object: &'a Map<String, Value>,
    context: &str,
    property: &str,
) -> Result<&'a str, TrellisError> {
    match object.get(property) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(TrellisError::NotAString(format!("{context}.{property}"))),
        None => Err(TrellisError::MissingProperty {
            context: context.to_string(),
            property: property.to_string(),
        }),
    }
}

/// An optional string property (absent is fine, non-string is not).
pub fn optional_string<'a>(
    object: &'a Map<String, Value>,
    context: &str,
    property: &str,
) -> Result<Option<&'a str>, TrellisError> {
    match object.get(property) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(TrellisError::NotAString(format!("{context}.{property}"))),
    }
}

/// A required object property, cloned out of the parent.
pub fn require_object(
    object: &Map<String, Value>,
    context: &str,
    property: &str,
) -> Result<Map<String, Value>, TrellisError> {
    match object.get(property) {
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(TrellisError::NotAnObject(format!("{context}.{property}"))),
        None => Err(TrellisError::MissingProperty {
            context: context.to_string(),
            property: property.to_string(),
        }),
    }
}

/// A required array property, cloned out of the parent.
pub fn require_array(
    object: &Map<String, Value>,
    context: &str,
    property: &str,
) -> Result<Vec<Value>, TrellisError> {
    match object.get(property) {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(_) => Err(TrellisError::NotAnArray(format!("{context}.{property}"))),
        None => Err(TrellisError::MissingProperty {
            context: context.to_string(),
            property: property.to_string(),
        }),
    }
}

/// Validate a DID suffix: non-empty base64url.
pub fn validate_did_suffix(did_suffix: &str, context: &str) -> Result<(), TrellisError> {
    encoder::validate(did_suffix, context)
}

/// Validate a reveal value: non-empty base64url within the length cap.
pub fn validate_reveal_value(
    reveal_value: &str,
    max_length: usize,
    context: &str,
) -> Result<(), TrellisError> {
    encoder::validate(reveal_value, context)?;
    if reveal_value.len() > max_length {
        return Err(TrellisError::RevealValueTooLong {
            length: reveal_value.len(),
            max: max_length,
        });
    }
    Ok(())
}
