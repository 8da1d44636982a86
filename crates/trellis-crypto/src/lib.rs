//! trellis-crypto
//!
//! Hashing and encoding discipline for the anchoring protocol: base64url
//! without padding, SHA-256 multihashes, RFC 8785 (JCS) canonicalization,
//! and compact ES256K JWS handling.

pub mod canonicalizer;
pub mod encoder;
pub mod jws;
pub mod multihash;

pub use canonicalizer::canonicalize;
pub use jws::{CompactJws, Jwk};
