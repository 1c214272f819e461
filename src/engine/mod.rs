//! The protocol engine
//!
//! An [`Engine`] drives one session over one relay. It plays either role:
//!
//! - as **initiator** (the dApp) it calls `init`, `connect`, hands out a
//!   pairing string, then sends requests once a wallet approves;
//! - as **responder** (the wallet) it calls `init`, `pair` with a decoded
//!   pairing string, then answers requests as they arrive.
//!
//! Inbound traffic is dispatched by a background task started in `init`.
//! Responses complete the request that is waiting for them; everything else
//! is broadcast as an [`EngineEvent`] to any number of subscribers.
//!
//! ```rust,no_run
//! use walletlink::{Engine, EngineConfig, Metadata, Session};
//! use walletlink::transport::{RelayConfig, WebSocketRelay};
//!
//! # async fn run() -> walletlink::ProtocolResult<()> {
//! let session = Session::shared();
//! let relay = WebSocketRelay::new(RelayConfig::default(), session.clone());
//! let engine = Engine::new(relay, session, EngineConfig::default());
//!
//! let init = engine.init(Metadata::new("My dApp", "Example", "https://example.com/icon.png"), None).await?;
//! let state = engine.connect(None, None).await?;
//! let pairing_string = engine.generate_pairing_string(&state, "testnet", true)?;
//! # let _ = (init, pairing_string);
//! # Ok(())
//! # }
//! ```

mod dispatch;
mod pairing;
mod pending;

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::crypto::KeyMaterial;
use crate::protocol::{
    codec, Acknowledge, AdditionalAccountRequest, ApprovePairing, AuthenticationRequest,
    ProtocolResult, Rejected, RelayMessage, Transaction,
};
use crate::session::Session;
use crate::transport::{Relay, RelayEvent};

use pending::PendingRequests;

/// What `init` hands back for the caller to persist
#[derive(Clone, Debug)]
pub struct InitData {
    /// Local key material; store it to resume the session later
    pub private_key: KeyMaterial,
}

/// Relay connection status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Relay initialized and listening
    Connected,
    /// The relay connection was lost; `init` reconnects
    Disconnected,
}

/// Unsolicited traffic and status changes, broadcast to subscribers
#[derive(Clone, Debug)]
pub enum EngineEvent {
    /// A wallet approved pairing
    Pairing(ApprovePairing),
    /// The peer rejected a pairing or request
    PairingRejected(Rejected),
    /// The peer asks for a transaction to be signed
    Transaction(Transaction),
    /// The peer asks for more accounts
    AdditionalAccountRequest(AdditionalAccountRequest),
    /// The peer sent an authentication challenge
    AuthenticationRequest(AuthenticationRequest),
    /// The peer acknowledged a message
    Acknowledge(Acknowledge),
    /// The relay connection changed
    ConnectionStatus(ConnectionStatus),
}

struct EngineInner<R: Relay> {
    relay: R,
    session: Arc<Session>,
    config: EngineConfig,
    pending: Arc<PendingRequests>,
    events: broadcast::Sender<EngineEvent>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl<R: Relay> Drop for EngineInner<R> {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}

/// Pairing and messaging engine for one session
///
/// Cheap to clone; clones share the session, relay and pending requests.
pub struct Engine<R: Relay> {
    inner: Arc<EngineInner<R>>,
}

impl<R: Relay> Clone for Engine<R> {
    fn clone(&self) -> Self {
        Engine {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Relay> Engine<R> {
    /// Create an engine over `relay` for `session`
    pub fn new(relay: R, session: Arc<Session>, config: EngineConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Engine {
            inner: Arc::new(EngineInner {
                relay,
                session,
                config,
                pending: Arc::new(PendingRequests::default()),
                events,
                listener: Mutex::new(None),
            }),
        }
    }

    /// Create an engine with a fresh session and default configuration
    pub fn with_relay(relay: R) -> Self {
        Self::new(relay, Session::shared(), EngineConfig::default())
    }

    /// The session this engine owns
    pub fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }

    /// The underlying relay
    pub fn relay(&self) -> &R {
        &self.inner.relay
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Subscribe to unsolicited messages and status changes
    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    /// Number of requests waiting for a response
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    /// Encode `message` for `topic` and publish it to `recipient_key`
    ///
    /// Returns the message id.
    async fn publish_to(
        &self,
        topic: &str,
        message: impl Into<RelayMessage>,
        recipient_key: &str,
    ) -> ProtocolResult<String> {
        let (id, text) = codec::prepare(message, topic)?;
        self.inner.relay.publish(topic, &text, recipient_key).await?;
        debug!(%topic, %id, "Published message");
        Ok(id)
    }

    /// Publish `message` to the key registered for `topic`
    async fn publish(&self, topic: &str, message: impl Into<RelayMessage>) -> ProtocolResult<String> {
        let key = self.inner.session.registry().resolve(topic)?;
        self.publish_to(topic, message, &key).await
    }

    /// Start the inbound dispatch task, once
    fn spawn_listener(&self) {
        let mut listener = self.inner.listener.lock();
        if listener.is_some() {
            return;
        }

        let Some(mut inbound) = self.inner.relay.take_inbound() else {
            warn!("Relay inbound stream already taken, not listening");
            return;
        };
        let weak: Weak<EngineInner<R>> = Arc::downgrade(&self.inner);

        *listener = Some(tokio::spawn(async move {
            while let Some(event) = inbound.recv().await {
                let Some(inner) = weak.upgrade() else { break };
                let engine = Engine { inner };

                match event {
                    RelayEvent::Payload { topic, payload } => {
                        if let Err(e) = engine.handle_payload(&topic, &payload).await {
                            warn!(%topic, "Ignoring inbound payload: {}", e);
                        }
                    }
                    RelayEvent::Closed => {
                        info!("Relay connection lost");
                        engine.emit(EngineEvent::ConnectionStatus(ConnectionStatus::Disconnected));
                    }
                }
            }
        }));
    }
}
