use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use trellis_core::TrellisError;

/// Encode bytes as base64url without padding.
pub fn encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode a base64url string, first validating the alphabet so that a
/// malformed input reports the caller's property name.
pub fn decode(input: &str, context: &str) -> Result<Vec<u8>, TrellisError> {
    validate(input, context)?;
    URL_SAFE_NO_PAD
        .decode(input)
        .map_err(|_| TrellisError::NotBase64UrlString(context.to_string()))
}

/// A valid encoded string is non-empty, unpadded, and drawn entirely from
/// `[A-Za-z0-9_-]`.
pub fn validate(input: &str, context: &str) -> Result<(), TrellisError> {
    if !is_base64url(input) {
        return Err(TrellisError::NotBase64UrlString(context.to_string()));
    }
    Ok(())
}

pub fn is_base64url(input: &str) -> bool {
    !input.is_empty()
        && input
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let bytes = b"anchor payload \x00\xff";
        let encoded = encode(bytes);
        assert_eq!(decode(&encoded, "payload").unwrap(), bytes);
    }

    #[test]
    fn rejects_empty_padded_and_foreign_alphabets() {
        for bad in ["", "abc=", "a+b", "a/b", "white space", "é"] {
            assert!(
                matches!(
                    validate(bad, "field"),
                    Err(TrellisError::NotBase64UrlString(ref f)) if f == "field"
                ),
                "expected rejection for {bad:?}"
            );
        }
    }

    #[test]
    fn accepts_full_alphabet() {
        assert!(is_base64url("AZaz09_-"));
    }
}
