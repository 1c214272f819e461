//! ChaCha20-Poly1305 payload sealing
//!
//! Relay payloads are sealed under a key derived from the topic's shared key,
//! with the topic id bound in as associated data so a payload cannot be
//! replayed onto another topic. The sealed form is base64 text:
//! `base64(nonce || ciphertext || tag)`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

use super::error::{CryptoError, CryptoResult};
use super::hash::Hash;

/// Size of the nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Size of the authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Symmetric cipher for relay payloads
pub struct Cipher;

impl Cipher {
    /// Seal a plaintext message for `topic` under the shared `topic_key`
    pub fn seal(topic_key: &str, topic: &str, plaintext: &str) -> CryptoResult<String> {
        let key = Hash::payload_key(topic_key);
        let cipher = ChaCha20Poly1305::new((&key).into());

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let payload = Payload {
            msg: plaintext.as_bytes(),
            aad: topic.as_bytes(),
        };

        let ciphertext = cipher
            .encrypt(nonce, payload)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    /// Open a payload produced by [`Cipher::seal`]
    pub fn open(topic_key: &str, topic: &str, sealed: &str) -> CryptoResult<String> {
        let bytes = BASE64
            .decode(sealed.trim())
            .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;

        // Minimum size: nonce + tag
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::InvalidEncoding(format!(
                "sealed payload too short: {} bytes",
                bytes.len()
            )));
        }

        let key = Hash::payload_key(topic_key);
        let cipher = ChaCha20Poly1305::new((&key).into());

        let nonce = Nonce::from_slice(&bytes[..NONCE_SIZE]);
        let payload = Payload {
            msg: &bytes[NONCE_SIZE..],
            aad: topic.as_bytes(),
        };

        let plaintext = cipher
            .decrypt(nonce, payload)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::InvalidEncoding(e.to_string()))
    }
}
