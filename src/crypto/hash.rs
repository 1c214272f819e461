//! BLAKE3 key derivation
//!
//! Topic keys travel as opaque strings inside pairing descriptors. Before they
//! can drive the AEAD cipher they are stretched into a fixed-size key.

/// Size of a derived key in bytes
pub const KEY_SIZE: usize = 32;

/// Context string for relay payload keys
const PAYLOAD_KEY_CONTEXT: &str = "walletlink 2022-06 relay payload key";

/// Key derivation operations
pub struct Hash;

impl Hash {
    /// Derive the payload encryption key for a shared topic key
    pub fn payload_key(topic_key: &str) -> [u8; KEY_SIZE] {
        blake3::derive_key(PAYLOAD_KEY_CONTEXT, topic_key.as_bytes())
    }

    /// Short, non-reversible fingerprint of a key, safe to log
    pub fn fingerprint(topic_key: &str) -> String {
        let digest = blake3::hash(topic_key.as_bytes());
        hex::encode(&digest.as_bytes()[..4])
    }
}
