//! Builders for well-formed, signed operation requests, used by tests in
//! dependent crates. Gated behind the `test_utils` feature.

use secp256k1::{Secp256k1, SecretKey};
use serde_json::{json, Value};
use trellis_crypto::jws::{CompactJws, Jwk};
use trellis_crypto::multihash;

use crate::create::SuffixData;
use crate::delta;

/// A fresh secp256k1 keypair in the shapes the protocol uses.
pub fn keypair() -> (SecretKey, Jwk) {
    let secp = Secp256k1::new();
    let (secret_key, public_key) = secp.generate_keypair(&mut rand::thread_rng());
    (secret_key, Jwk::from_public_key(&public_key))
}

/// A valid full create request with a unique DID suffix.
/// Returns `(request buffer, did_suffix)`.
pub fn create_request() -> (Vec<u8>, String) {
    let nonce: [u8; 16] = rand::random();
    let create_delta = json!({
        "patches": [{"action": "replace"}],
        "update_commitment": multihash::hash_then_encode(&nonce),
    });
    let suffix_data = SuffixData {
        delta_hash: delta::hash(&create_delta).expect("hash test delta"),
        recovery_commitment: multihash::hash_then_encode(&rand::random::<[u8; 16]>()),
    };
    let did_suffix = suffix_data.to_did_suffix().expect("derive test did");
    let request = json!({
        "type": "create",
        "suffix_data": suffix_data,
        "delta": create_delta,
    });
    (serde_json::to_vec(&request).expect("serialize"), did_suffix)
}

/// A valid full update request for `did_suffix`, signed with a fresh key.
pub fn update_request(did_suffix: &str) -> Vec<u8> {
    let (secret_key, update_key) = keypair();
    let update_delta = json!({
        "patches": [{"action": "add-services"}],
        "update_commitment": multihash::hash_then_encode(&rand::random::<[u8; 16]>()),
    });
    let payload = json!({
        "delta_hash": delta::hash(&update_delta).expect("hash test delta"),
        "update_key": update_key,
    });
    let request = json!({
        "type": "update",
        "did_suffix": did_suffix,
        "reveal_value": multihash::canonicalize_then_hash_then_encode(&update_key)
            .expect("hash test key"),
        "signed_data": CompactJws::sign(&payload, &secret_key).expect("sign"),
        "delta": update_delta,
    });
    serde_json::to_vec(&request).expect("serialize")
}

/// A valid full recover request for `did_suffix`, signed with a fresh key.
pub fn recover_request(did_suffix: &str) -> Vec<u8> {
    let (secret_key, recovery_key) = keypair();
    let recover_delta: Value = json!({
        "patches": [{"action": "replace"}],
        "update_commitment": multihash::hash_then_encode(&rand::random::<[u8; 16]>()),
    });
    let payload = json!({
        "delta_hash": delta::hash(&recover_delta).expect("hash test delta"),
        "recovery_key": recovery_key,
        "recovery_commitment": multihash::hash_then_encode(&rand::random::<[u8; 16]>()),
    });
    let request = json!({
        "type": "recover",
        "did_suffix": did_suffix,
        "reveal_value": multihash::canonicalize_then_hash_then_encode(&recovery_key)
            .expect("hash test key"),
        "signed_data": CompactJws::sign(&payload, &secret_key).expect("sign"),
        "delta": recover_delta,
    });
    serde_json::to_vec(&request).expect("serialize")
}

/// A valid full deactivate request for `did_suffix`, signed with a fresh key.
pub fn deactivate_request(did_suffix: &str) -> Vec<u8> {
    let (secret_key, recovery_key) = keypair();
    let payload = json!({
        "did_suffix": did_suffix,
        "recovery_key": recovery_key,
    });
    let request = json!({
        "type": "deactivate",
        "did_suffix": did_suffix,
        "reveal_value": multihash::canonicalize_then_hash_then_encode(&recovery_key)
            .expect("hash test key"),
        "signed_data": CompactJws::sign(&payload, &secret_key).expect("sign"),
    });
    serde_json::to_vec(&request).expect("serialize")
}
