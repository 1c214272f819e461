//! Pairing descriptors and metadata sanitization
//!
//! A pairing descriptor is what an initiator shows out of band (QR code, deep
//! link) so a wallet can find the topic and learn the key to seal traffic
//! with. Its wire form is `base64(JSON)` of
//! `{metadata, topic, network, multiAccount}`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use super::error::{ProtocolError, ProtocolResult};

/// Description of an application or wallet, shown to the other party
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Icon URL
    #[serde(default)]
    pub icon: String,
    /// Origin URL
    #[serde(default)]
    pub url: String,
    /// Key the peer should seal topic traffic with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

impl Metadata {
    /// Create metadata with a name, description and icon
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        icon: impl Into<String>,
    ) -> Self {
        Metadata {
            name: name.into(),
            description: description.into(),
            icon: icon.into(),
            url: String::new(),
            public_key: None,
        }
    }

    /// Set the origin URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Copy with every rendered free-text field escaped
    ///
    /// Name, description and url are escaped; the icon and key are passed
    /// through untouched.
    pub fn sanitized(&self) -> Metadata {
        Metadata {
            name: sanitize(&self.name),
            description: sanitize(&self.description),
            icon: self.icon.clone(),
            url: sanitize(&self.url),
            public_key: self.public_key.clone(),
        }
    }
}

/// Result of opening or resuming a topic subscription
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    /// Topic the session lives on
    pub topic: String,
    /// Always zero; topics do not expire
    pub expires: u64,
}

impl ConnectionState {
    /// State for a freshly opened topic
    pub fn new(topic: impl Into<String>) -> Self {
        ConnectionState {
            topic: topic.into(),
            expires: 0,
        }
    }
}

/// Decoded pairing descriptor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingData {
    /// Initiator metadata, including the key to seal replies with
    pub metadata: Metadata,
    /// Topic to join
    pub topic: String,
    /// Ledger network, e.g. "testnet"
    pub network: String,
    /// Whether the wallet may return several accounts
    pub multi_account: bool,
}

impl PairingData {
    /// Encode as a shareable pairing string
    ///
    /// Fields are sanitized on the way out; decoding the result yields
    /// `self.sanitized()`.
    pub fn encode(&self) -> ProtocolResult<String> {
        let json = serde_json::to_string(&self.sanitized())
            .map_err(|e| ProtocolError::InvalidDescriptor(e.to_string()))?;
        Ok(BASE64.encode(json))
    }

    /// Decode a pairing string
    pub fn decode(pairing_string: &str) -> ProtocolResult<Self> {
        let bytes = BASE64
            .decode(pairing_string.trim())
            .map_err(|e| ProtocolError::InvalidDescriptor(format!("bad base64: {}", e)))?;
        let json = String::from_utf8(bytes)
            .map_err(|e| ProtocolError::InvalidDescriptor(format!("bad utf-8: {}", e)))?;
        serde_json::from_str(&json)
            .map_err(|e| ProtocolError::InvalidDescriptor(format!("bad json: {}", e)))
    }

    /// Copy with metadata and network sanitized
    pub fn sanitized(&self) -> PairingData {
        PairingData {
            metadata: self.metadata.sanitized(),
            topic: self.topic.clone(),
            network: sanitize(&self.network),
            multi_account: self.multi_account,
        }
    }
}

/// Escape a string for safe rendering by a peer
///
/// Every character outside `[A-Za-z0-9_. ]` becomes a numeric character
/// reference, one per UTF-16 code unit. A `.` is always kept literal.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut units = [0u16; 2];

    for c in input.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ' ') {
            out.push(c);
            continue;
        }
        for unit in c.encode_utf16(&mut units) {
            // Writing to a String cannot fail
            let _ = write!(out, "&#{};", unit);
        }
    }

    out
}
