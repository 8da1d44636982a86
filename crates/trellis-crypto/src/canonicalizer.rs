use serde::Serialize;
use trellis_core::TrellisError;

/// Serialize a value to RFC 8785 (JCS) canonical JSON bytes.
///
/// Every hash in the protocol is computed over this form, so two encoders
/// observing the same object always agree on the digest.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<Vec<u8>, TrellisError> {
    serde_jcs::to_vec(value).map_err(|e| TrellisError::Serialization(e.to_string()))
}

/// Canonical JSON as a string, for callers that embed it in larger buffers.
pub fn canonicalize_to_string<T: Serialize>(value: &T) -> Result<String, TrellisError> {
    serde_jcs::to_string(value).map_err(|e| TrellisError::Serialization(e.to_string()))
}
