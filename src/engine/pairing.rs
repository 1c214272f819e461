//! Pairing handshake
//!
//! Initiator: `init` → `connect(None, None)` → `generate_pairing_string`, then
//! wait for [`EngineEvent::Pairing`](super::EngineEvent::Pairing).
//! Responder: `init` → `decode_pairing_string` → `pair` (or `reject`).

use tracing::{debug, info};

use super::{ConnectionStatus, Engine, EngineEvent, InitData};
use crate::crypto::{random_id, KeyMaterial};
use crate::protocol::{
    sanitize, ApprovePairing, ConnectionState, Metadata, PairingData, ProtocolError,
    ProtocolResult, Rejected,
};
use crate::session::{PairingState, SavedSession};
use crate::transport::Relay;

impl<R: Relay> Engine<R> {
    /// Set up local identity and open the relay
    ///
    /// Generates key material unless `private_key` is given, and stores
    /// `metadata` with its `publicKey` set to that key. Does not open a topic.
    pub async fn init(
        &self,
        mut metadata: Metadata,
        private_key: Option<KeyMaterial>,
    ) -> ProtocolResult<InitData> {
        debug!("Initializing");

        let private_key = match private_key {
            Some(key) => key,
            None => {
                let key = KeyMaterial::generate();
                debug!(key = ?key, "Generated new encryption key");
                key
            }
        };

        metadata.public_key = Some(private_key.expose().to_string());
        self.session().set_identity(metadata, private_key.clone());

        // Listen before the relay can deliver anything
        self.spawn_listener();
        self.relay().init().await?;
        self.emit(EngineEvent::ConnectionStatus(ConnectionStatus::Connected));

        info!("Initialized");
        Ok(InitData { private_key })
    }

    /// Open (or rejoin) a topic
    ///
    /// Without a topic a new random one is minted. With peer metadata, the
    /// peer's key is registered for the topic, which is how a paired session
    /// resumes.
    pub async fn connect(
        &self,
        topic: Option<&str>,
        peer: Option<&Metadata>,
    ) -> ProtocolResult<ConnectionState> {
        let topic = match topic {
            Some(topic) => topic.to_string(),
            None => {
                let topic = random_id();
                debug!(%topic, "Created new topic id");
                topic
            }
        };

        let peer_key = peer.and_then(|peer| peer.public_key.as_deref());
        if let Some(key) = peer_key {
            self.session().registry().register(topic.as_str(), key);
        }

        self.relay().subscribe(&topic).await?;

        self.session().advance(if peer_key.is_some() {
            PairingState::Paired
        } else {
            PairingState::TopicOpen
        });
        Ok(ConnectionState::new(topic))
    }

    /// Build the shareable pairing string for `state`
    pub fn generate_pairing_string(
        &self,
        state: &ConnectionState,
        network: &str,
        multi_account: bool,
    ) -> ProtocolResult<String> {
        debug!("Generating pairing string");
        let metadata = self.session().metadata().ok_or(ProtocolError::NotInitialized)?;

        let pairing_string = PairingData {
            metadata,
            topic: state.topic.clone(),
            network: network.to_string(),
            multi_account,
        }
        .encode()?;

        self.session().advance(PairingState::Pairing);
        Ok(pairing_string)
    }

    /// Decode a pairing string produced by an initiator
    pub fn decode_pairing_string(pairing_string: &str) -> ProtocolResult<PairingData> {
        PairingData::decode(pairing_string)
    }

    /// Approve a pairing as the wallet
    ///
    /// Joins the descriptor's topic, registers the initiator's key for it,
    /// and publishes an `ApprovePairing` carrying our metadata, `accounts` and
    /// `network`. The initiator observes completion; nothing is emitted
    /// locally.
    pub async fn pair(
        &self,
        pairing: &PairingData,
        accounts: &[String],
        network: &str,
    ) -> ProtocolResult<ConnectionState> {
        info!(peer = %pairing.metadata.name, "Pairing");

        let peer_key = pairing.metadata.public_key.clone().ok_or_else(|| {
            ProtocolError::InvalidDescriptor("pairing descriptor carries no public key".to_string())
        })?;
        let mut own = self.session().metadata().ok_or(ProtocolError::NotInitialized)?;

        let state = self.connect(Some(&pairing.topic), None).await?;
        self.session().registry().register(pairing.topic.as_str(), peer_key.as_str());

        // Replies are sealed with the initiator's key, so that is what we advertise
        own.public_key = Some(peer_key);
        let approval = ApprovePairing {
            id: String::new(),
            topic: pairing.topic.clone(),
            metadata: own.sanitized(),
            account_ids: accounts.to_vec(),
            network: sanitize(network),
        };

        self.publish(&pairing.topic, approval).await?;
        self.session()
            .record_peer(&pairing.topic, pairing.metadata.clone(), accounts, network);

        Ok(state)
    }

    /// Reject a pairing (or request) identified by `msg_id`
    pub async fn reject(&self, topic: &str, reason: &str, msg_id: &str) -> ProtocolResult<()> {
        let rejected = Rejected {
            id: String::new(),
            topic: topic.to_string(),
            reason: Some(sanitize(reason)),
            msg_id: msg_id.to_string(),
        };

        self.publish(topic, rejected).await?;
        Ok(())
    }

    /// Resume a persisted session
    ///
    /// Re-runs `init` with the stored key and reconnects to the stored topic,
    /// registering the paired peer's key when there is one.
    pub async fn resume(
        &self,
        saved: &SavedSession,
        metadata: Metadata,
    ) -> ProtocolResult<ConnectionState> {
        self.init(metadata, saved.private_key.clone()).await?;
        let state = self
            .connect(Some(&saved.topic), saved.paired_peer_metadata.as_ref())
            .await?;

        // The network is not persisted; it is refreshed by the next approval
        if let Some(peer) = &saved.paired_peer_metadata {
            self.session()
                .record_peer(&saved.topic, peer.clone(), &saved.paired_accounts, "");
        }

        info!(topic = %state.topic, "Resumed session");
        Ok(state)
    }
}
