use serde::Serialize;
use sha2::{Digest, Sha256};
use trellis_core::constants::SHA256_MULTIHASH_CODE;
use trellis_core::TrellisError;

use crate::canonicalizer::canonicalize;
use crate::encoder;

/// The one algorithm this protocol version hashes with.
pub fn latest_supported_algorithm() -> u64 {
    SHA256_MULTIHASH_CODE
}

/// Plain SHA-256 digest (no multihash framing).
pub fn hash_digest(content: &[u8]) -> [u8; 32] {
    Sha256::digest(content).into()
}

/// Multihash-wrap a SHA-256 digest of `content`: varint algorithm code,
/// varint digest length, digest bytes.
pub fn hash(content: &[u8], algorithm: u64) -> Result<Vec<u8>, TrellisError> {
    if algorithm != SHA256_MULTIHASH_CODE {
        return Err(TrellisError::MultihashUnsupportedHashAlgorithm(algorithm));
    }
    let digest = hash_digest(content);
    let mut out = Vec::with_capacity(2 + digest.len());
    write_varint(&mut out, algorithm);
    write_varint(&mut out, digest.len() as u64);
    out.extend_from_slice(&digest);
    Ok(out)
}

/// `b64url(multihash(content))` using the latest supported algorithm.
pub fn hash_then_encode(content: &[u8]) -> String {
    let digest = hash_digest(content);
    let mut multihash = Vec::with_capacity(2 + digest.len());
    write_varint(&mut multihash, SHA256_MULTIHASH_CODE);
    write_varint(&mut multihash, digest.len() as u64);
    multihash.extend_from_slice(&digest);
    encoder::encode(&multihash)
}

/// Canonicalize an object, hash it, and return the encoded multihash.
/// This is the form in which object hashes appear on the wire.
pub fn canonicalize_then_hash_then_encode<T: Serialize>(
    value: &T,
) -> Result<String, TrellisError> {
    let canonical = canonicalize(value)?;
    Ok(hash_then_encode(&canonical))
}

/// Double-hash variant used to derive commitments: the inner digest is a
/// plain SHA-256, the outer is multihash-wrapped. Committing to the hash
/// of the eventual reveal value keeps the reveal itself unguessable.
pub fn canonicalize_then_double_hash_then_encode<T: Serialize>(
    value: &T,
) -> Result<String, TrellisError> {
    let canonical = canonicalize(value)?;
    let inner = hash_digest(&canonical);
    Ok(hash_then_encode(&inner))
}

/// Split a multihash buffer into `(algorithm, digest)`.
pub fn decode(multihash: &[u8]) -> Result<(u64, &[u8]), TrellisError> {
    let (algorithm, rest) = read_varint(multihash)?;
    let (length, digest) = read_varint(rest)?;
    if digest.len() as u64 != length {
        return Err(TrellisError::MultihashMalformed);
    }
    Ok((algorithm, digest))
}

/// Verify that `encoded_multihash` is the hash of `content`.
///
/// The candidate is decoded to learn its algorithm (rejecting unsupported
/// ones), then the expected encoding is recomputed from `content` and
/// compared byte-for-byte. The string comparison makes alternative
/// encodings of the same digest fail verification.
pub fn verify_encoded_multihash(
    content: &[u8],
    encoded_multihash: &str,
) -> Result<bool, TrellisError> {
    let multihash_bytes = match encoder::decode(encoded_multihash, "multihash") {
        Ok(bytes) => bytes,
        Err(_) => return Ok(false),
    };
    let (algorithm, _) = decode(&multihash_bytes)?;
    if algorithm != SHA256_MULTIHASH_CODE {
        return Err(TrellisError::MultihashUnsupportedHashAlgorithm(algorithm));
    }
    let expected = hash_then_encode(content);
    Ok(expected == encoded_multihash)
}

/// Verify that an encoded multihash was produced with the latest supported
/// algorithm, without checking it against any content.
pub fn verify_computed_using_latest_algorithm(
    encoded_multihash: &str,
) -> Result<(), TrellisError> {
    let multihash_bytes = encoder::decode(encoded_multihash, "multihash")?;
    let (algorithm, _) = decode(&multihash_bytes)?;
    let latest = latest_supported_algorithm();
    if algorithm != latest {
        return Err(TrellisError::MultihashNotLatestSupportedHashAlgorithm {
            got: algorithm,
            latest,
        });
    }
    Ok(())
}

// ── Varint helpers ───────────────────────────────────────────────────────────

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn read_varint(input: &[u8]) -> Result<(u64, &[u8]), TrellisError> {
    let mut value: u64 = 0;
    for (i, &byte) in input.iter().enumerate() {
        if i >= 9 {
            return Err(TrellisError::MultihashMalformed);
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, &input[i + 1..]));
        }
    }
    Err(TrellisError::MultihashMalformed)
}
