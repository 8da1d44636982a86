use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use trellis_core::TrellisError;

use crate::encoder;
use crate::multihash::hash_digest;

/// The only signing algorithm this protocol version accepts.
const ALGORITHM: &str = "ES256K";

// ── Jwk ──────────────────────────────────────────────────────────────────────

/// A secp256k1 public key in JWK form, as embedded in signed-data payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    /// Base64url x-coordinate (32 bytes).
    pub x: String,
    /// Base64url y-coordinate (32 bytes).
    pub y: String,
}

impl Jwk {
    /// Build the JWK for a secp256k1 public key.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let uncompressed = public_key.serialize_uncompressed();
        Self {
            kty: "EC".to_string(),
            crv: "secp256k1".to_string(),
            x: encoder::encode(&uncompressed[1..33]),
            y: encoder::encode(&uncompressed[33..65]),
        }
    }

    /// Reconstruct the secp256k1 public key, validating curve and shape.
    pub fn to_public_key(&self) -> Result<PublicKey, TrellisError> {
        if self.kty != "EC" {
            return Err(TrellisError::JwkInvalid(format!("kty `{}`", self.kty)));
        }
        if self.crv != "secp256k1" {
            return Err(TrellisError::JwkInvalid(format!("crv `{}`", self.crv)));
        }
        let x = encoder::decode(&self.x, "jwk.x")?;
        let y = encoder::decode(&self.y, "jwk.y")?;
        if x.len() != 32 || y.len() != 32 {
            return Err(TrellisError::JwkInvalid("coordinate length".to_string()));
        }
        let mut uncompressed = [0u8; 65];
        uncompressed[0] = 0x04;
        uncompressed[1..33].copy_from_slice(&x);
        uncompressed[33..65].copy_from_slice(&y);
        PublicKey::from_slice(&uncompressed)
            .map_err(|e| TrellisError::JwkInvalid(e.to_string()))
    }
}

// ── CompactJws ───────────────────────────────────────────────────────────────

/// A parsed compact JWS: three base64url segments with a validated
/// `{"alg":"ES256K"}` protected header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompactJws {
    /// Base64url protected header, kept verbatim for signing-input fidelity.
    pub protected: String,
    /// Base64url payload.
    pub payload: String,
    /// Base64url signature (64-byte compact ECDSA).
    pub signature: String,
}

/// Exactly `{"alg":"ES256K"}` once decoded; any other property set fails.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ProtectedHeader {
    alg: String,
}

impl CompactJws {
    /// Parse and structurally validate a compact serialization.
    pub fn parse(compact: &str) -> Result<Self, TrellisError> {
        let mut segments = compact.split('.');
        let (protected, payload, signature) =
            match (segments.next(), segments.next(), segments.next(), segments.next()) {
                (Some(h), Some(p), Some(s), None) => (h, p, s),
                _ => return Err(TrellisError::JwsIncorrectFormat),
            };

        let header_bytes = encoder::decode(protected, "jws.protected")?;
        let header: ProtectedHeader = serde_json::from_slice(&header_bytes)
            .map_err(|_| TrellisError::JwsProtectedHeaderInvalid)?;
        if header.alg != ALGORITHM {
            return Err(TrellisError::JwsProtectedHeaderInvalid);
        }

        encoder::validate(payload, "jws.payload")?;
        encoder::validate(signature, "jws.signature")?;

        Ok(Self {
            protected: protected.to_string(),
            payload: payload.to_string(),
            signature: signature.to_string(),
        })
    }

    /// Sign `payload` (serialized as JSON) into a compact JWS.
    pub fn sign<T: Serialize>(
        payload: &T,
        secret_key: &SecretKey,
    ) -> Result<String, TrellisError> {
        let header_json = format!(r#"{{"alg":"{ALGORITHM}"}}"#);
        let protected = encoder::encode(header_json.as_bytes());
        let payload_bytes = serde_json::to_vec(payload)
            .map_err(|e| TrellisError::Serialization(e.to_string()))?;
        let payload = encoder::encode(&payload_bytes);

        let signing_input = format!("{protected}.{payload}");
        let message = Message::from_digest(hash_digest(signing_input.as_bytes()));
        let secp = Secp256k1::signing_only();
        let signature = secp.sign_ecdsa(&message, secret_key);

        Ok(format!(
            "{protected}.{payload}.{}",
            encoder::encode(&signature.serialize_compact())
        ))
    }

    /// Verify the ES256K signature against `jwk`.
    pub fn verify_signature(&self, jwk: &Jwk) -> Result<(), TrellisError> {
        let public_key = jwk.to_public_key()?;
        let signature_bytes = encoder::decode(&self.signature, "jws.signature")?;
        let signature = Signature::from_compact(&signature_bytes)
            .map_err(|_| TrellisError::JwsSignatureInvalid)?;

        let signing_input = format!("{}.{}", self.protected, self.payload);
        let message = Message::from_digest(hash_digest(signing_input.as_bytes()));
        let secp = Secp256k1::verification_only();
        secp.verify_ecdsa(&message, &signature, &public_key)
            .map_err(|_| TrellisError::JwsSignatureInvalid)
    }

    /// Decode the payload segment as JSON.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, TrellisError> {
        let bytes = encoder::decode(&self.payload, "jws.payload")?;
        serde_json::from_slice(&bytes).map_err(|e| TrellisError::JsonNotParsable {
            context: "jws.payload".into(),
            detail: e.to_string(),
        })
    }

    /// Reassemble the compact serialization.
    pub fn to_compact(&self) -> String {
        format!("{}.{}.{}", self.protected, self.payload, self.signature)
    }
}
