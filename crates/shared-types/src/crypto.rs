//! # Crypto Helpers
//!
//! Thin wrappers over `sha2` and `ed25519-dalek`. Every signature covers
//! `networkIdentifier ‖ message` so that signatures never replay across
//! networks.

use crate::entities::{Address, Hash};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

/// SHA-256 of `data`.
pub fn hash(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Address of a public key: first 20 bytes of its hash.
pub fn address_from_public_key(public_key: &[u8]) -> Address {
    let digest = hash(public_key);
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[..20]);
    address
}

/// Deterministic signing key derived from a passphrase.
pub fn signing_key_from_passphrase(passphrase: &str) -> SigningKey {
    SigningKey::from_bytes(&hash(passphrase.as_bytes()))
}

/// Signs `networkIdentifier ‖ data`.
pub fn sign_data(network_identifier: &[u8], data: &[u8], key: &SigningKey) -> Vec<u8> {
    let message = [network_identifier, data].concat();
    key.sign(&message).to_bytes().to_vec()
}

/// Verifies a signature over `networkIdentifier ‖ data`.
///
/// Malformed keys or signatures verify as `false`.
pub fn verify_data(
    network_identifier: &[u8],
    data: &[u8],
    signature: &[u8],
    public_key: &[u8],
) -> bool {
    let Ok(key_bytes) = <[u8; 32]>::try_from(public_key) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    let message = [network_identifier, data].concat();
    key.verify(&message, &signature).is_ok()
}

/// The value a seed reveal commits to: the first 16 bytes of its hash.
pub fn seed_reveal_commitment(seed_reveal: &[u8]) -> Vec<u8> {
    hash(seed_reveal)[..16].to_vec()
}

const LEAF_PREFIX: u8 = 0x00;
const BRANCH_PREFIX: u8 = 0x01;

/// Merkle root over a list of IDs.
///
/// Leaves are `hash(0x00 ‖ id)`, branches `hash(0x01 ‖ left ‖ right)`. An odd
/// node at the end of a layer is carried up unchanged. The empty tree hashes
/// the empty string.
pub fn merkle_root(ids: &[Hash]) -> Hash {
    if ids.is_empty() {
        return hash(&[]);
    }
    let mut layer: Vec<Hash> = ids
        .iter()
        .map(|id| hash(&[&[LEAF_PREFIX][..], &id[..]].concat()))
        .collect();
    while layer.len() > 1 {
        layer = layer
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => hash(&[&[BRANCH_PREFIX][..], &left[..], &right[..]].concat()),
                _ => pair[0],
            })
            .collect();
    }
    layer[0]
}
