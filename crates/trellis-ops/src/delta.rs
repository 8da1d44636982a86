use serde_json::Value;
use trellis_core::{ProtocolParameters, TrellisError};
use trellis_crypto::{canonicalizer, multihash};

/// Validate an optional delta against its committed hash.
///
/// Returns `Some(delta)` only when the value is a JSON object within the
/// size cap whose canonical form hashes to `expected_delta_hash`. Any other
/// outcome yields `None`: an operation whose delta was pruned or corrupted
/// in transit still anchors, it just carries no payload.
pub fn accept_if_valid(
    delta: Option<&Value>,
    expected_delta_hash: &str,
    params: &ProtocolParameters,
) -> Option<Value> {
    let delta = delta?;
    if !delta.is_object() {
        return None;
    }
    let canonical = canonicalizer::canonicalize(delta).ok()?;
    if canonical.len() > params.max_delta_size_in_bytes {
        return None;
    }
    match multihash::verify_encoded_multihash(&canonical, expected_delta_hash) {
        Ok(true) => Some(delta.clone()),
        _ => None,
    }
}

/// Compute the encoded multihash a delta commits to.
pub fn hash(delta: &Value) -> Result<String, TrellisError> {
    multihash::canonicalize_then_hash_then_encode(delta)
}
