//! Session state owned by one engine
//!
//! A session holds the local identity (metadata and key material), the
//! topic/key registry, and the peers that completed pairing. It is shared
//! through an `Arc` between the engine and any relay client that needs topic
//! keys, so several independent sessions can live in one process.

mod registry;
mod saved;

pub use registry::TopicRegistry;
pub use saved::SavedSession;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::crypto::KeyMaterial;
use crate::protocol::Metadata;
use crate::transport::TopicKeys;

/// Where the session is in the pairing handshake
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairingState {
    /// `init` has not run
    Uninitialized,
    /// Key material and metadata are in place
    KeyGenerated,
    /// Subscribed to a topic
    TopicOpen,
    /// Pairing string handed out, waiting for the wallet
    Pairing,
    /// A peer approved the pairing
    Paired,
}

/// A peer that completed pairing on a topic
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedPeer {
    /// Topic shared with the peer
    pub topic: String,
    /// The peer's metadata
    pub metadata: Metadata,
    /// Accounts the peer shared, without duplicates
    pub accounts: Vec<String>,
    /// Network agreed at pairing
    pub network: String,
}

struct SessionState {
    stage: PairingState,
    metadata: Option<Metadata>,
    private_key: Option<KeyMaterial>,
    peers: HashMap<String, PairedPeer>,
}

/// Explicit per-engine session object
pub struct Session {
    registry: TopicRegistry,
    state: RwLock<SessionState>,
}

impl Session {
    /// Create an empty session
    pub fn new() -> Self {
        Session {
            registry: TopicRegistry::new(),
            state: RwLock::new(SessionState {
                stage: PairingState::Uninitialized,
                metadata: None,
                private_key: None,
                peers: HashMap::new(),
            }),
        }
    }

    /// Create an empty session behind an `Arc`
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// The topic/key registry
    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    /// Install local metadata and key material
    pub(crate) fn set_identity(&self, metadata: Metadata, private_key: KeyMaterial) {
        let mut state = self.state.write();
        state.metadata = Some(metadata);
        state.private_key = Some(private_key);
        state.stage = PairingState::KeyGenerated;
    }

    /// Local metadata, if `init` has run
    pub fn metadata(&self) -> Option<Metadata> {
        self.state.read().metadata.clone()
    }

    /// Local key material, if `init` has run
    pub fn private_key(&self) -> Option<KeyMaterial> {
        self.state.read().private_key.clone()
    }

    /// Current handshake stage
    pub fn stage(&self) -> PairingState {
        self.state.read().stage
    }

    /// Move to `stage`; never steps back from `Paired`
    pub(crate) fn advance(&self, stage: PairingState) {
        let mut state = self.state.write();
        if state.stage != PairingState::Paired {
            state.stage = stage;
        }
    }

    /// Record (or refresh) the peer paired on `topic`
    pub(crate) fn record_peer(
        &self,
        topic: &str,
        metadata: Metadata,
        accounts: &[String],
        network: &str,
    ) -> PairedPeer {
        let mut state = self.state.write();
        let peer = state
            .peers
            .entry(topic.to_string())
            .or_insert_with(|| PairedPeer {
                topic: topic.to_string(),
                metadata: metadata.clone(),
                accounts: Vec::new(),
                network: network.to_string(),
            });

        peer.metadata = metadata;
        peer.network = network.to_string();
        for account in accounts {
            if !peer.accounts.contains(account) {
                peer.accounts.push(account.clone());
            }
        }

        let peer = peer.clone();
        state.stage = PairingState::Paired;
        peer
    }

    /// Peer paired on `topic`
    pub fn paired_peer(&self, topic: &str) -> Option<PairedPeer> {
        self.state.read().peers.get(topic).cloned()
    }

    /// All paired peers
    pub fn paired_peers(&self) -> Vec<PairedPeer> {
        self.state.read().peers.values().cloned().collect()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicKeys for Session {
    /// The registered peer key, or the local key while pairing is pending
    fn topic_key(&self, topic: &str) -> Option<String> {
        self.registry
            .resolve(topic)
            .ok()
            .or_else(|| self.private_key().map(|key| key.expose().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_uninitialized() {
        let session = Session::new();
        assert_eq!(session.stage(), PairingState::Uninitialized);
        assert!(session.metadata().is_none());
        assert!(session.topic_key("t").is_none());
    }

    #[test]
    fn test_topic_key_falls_back_to_local_key() {
        let session = Session::new();
        session.set_identity(Metadata::default(), KeyMaterial::from_string("local"));

        assert_eq!(session.topic_key("t").as_deref(), Some("local"));

        session.registry().register("t", "peer");
        assert_eq!(session.topic_key("t").as_deref(), Some("peer"));
    }

    #[test]
    fn test_record_peer_merges_accounts() {
        let session = Session::new();
        let metadata = Metadata::new("Wallet", "", "");

        session.record_peer("t", metadata.clone(), &["a".into(), "b".into()], "testnet");
        let peer = session.record_peer("t", metadata, &["b".into(), "c".into()], "testnet");

        assert_eq!(peer.accounts, vec!["a", "b", "c"]);
        assert_eq!(session.paired_peers().len(), 1);
        assert_eq!(session.stage(), PairingState::Paired);
    }

    #[test]
    fn test_paired_stage_is_sticky() {
        let session = Session::new();
        session.record_peer("t", Metadata::default(), &[], "testnet");
        session.advance(PairingState::TopicOpen);

        assert_eq!(session.stage(), PairingState::Paired);
    }
}
