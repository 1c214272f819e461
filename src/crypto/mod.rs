//! Cryptographic primitives for walletlink
//!
//! The protocol engine itself never encrypts anything; it hands opaque
//! strings to the relay together with the recipient's topic key. This module
//! provides what sits around that boundary:
//! - random topic and message identifiers
//! - generation and safe handling of local key material
//! - `cipher`: ChaCha20-Poly1305 sealing used by relay clients
//! - `hash`: BLAKE3 derivation of payload keys

pub mod cipher;
pub mod error;
pub mod hash;

// Re-export commonly used types
pub use cipher::Cipher;
pub use error::{CryptoError, CryptoResult};
pub use hash::Hash;

use rand::{distributions::Alphanumeric, Rng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of generated topic and message identifiers
pub const ID_LENGTH: usize = 20;

/// Size of generated key material in bytes (before hex encoding)
pub const KEY_MATERIAL_SIZE: usize = 32;

/// Generate cryptographically secure random bytes
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Generate a random alphanumeric identifier of [`ID_LENGTH`] characters
pub fn random_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Local key material for a session
///
/// The key is shared with the peer through the pairing descriptor and is
/// what relay clients seal topic traffic with. It is wiped from memory on drop
/// and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct KeyMaterial(String);

impl KeyMaterial {
    /// Generate fresh key material
    pub fn generate() -> Self {
        let mut bytes = random_bytes::<KEY_MATERIAL_SIZE>();
        let key = KeyMaterial(hex::encode(bytes));
        bytes.zeroize();
        key
    }

    /// Wrap existing key material, e.g. restored from persisted state
    pub fn from_string(key: impl Into<String>) -> Self {
        KeyMaterial(key.into())
    }

    /// The key as it travels on the wire
    ///
    /// # Security Warning
    /// Anyone holding this string can read the session's traffic. Never log it.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMaterial({})", Hash::fingerprint(&self.0))
    }
}
