//! Persisted session state
//!
//! Storage itself belongs to the application; this is the shape it stores and
//! the engine resumes from.

use serde::{Deserialize, Serialize};

use crate::crypto::KeyMaterial;
use crate::protocol::{Metadata, ProtocolError, ProtocolResult};

/// Everything needed to resume a session after a restart
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSession {
    /// Topic the session lives on
    pub topic: String,
    /// Pairing string shown to the wallet
    pub pairing_string: String,
    /// Local key material returned by `init`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<KeyMaterial>,
    /// Metadata of the paired peer, once pairing completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paired_peer_metadata: Option<Metadata>,
    /// Accounts shared by the peer
    #[serde(default)]
    pub paired_accounts: Vec<String>,
}

impl SavedSession {
    /// Whether a peer has approved this session
    pub fn is_paired(&self) -> bool {
        self.paired_peer_metadata.is_some()
    }

    /// Add accounts, skipping ones already known
    pub fn add_accounts<I, S>(&mut self, accounts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for account in accounts {
            let account = account.into();
            if !self.paired_accounts.contains(&account) {
                self.paired_accounts.push(account);
            }
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> ProtocolResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        serde_json::from_str(json).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
    }
}
