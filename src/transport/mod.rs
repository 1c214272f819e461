//! Relay transport abstraction
//!
//! The engine talks to a publish/subscribe relay through the [`Relay`] trait:
//! - In-memory hub (for testing and local demos)
//! - WebSocket relay client (for real-time communication via a relay server)
//!
//! # Design
//!
//! The engine hands the relay plain envelope text together with the key the
//! recipient expects. Whether and how the text is sealed on the wire is the
//! relay client's business; inbound payloads are delivered already opened,
//! tagged with the topic they arrived on.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod websocket;
pub use websocket::{RelayConfig, WebSocketRelay};

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed or never opened
    #[error("Connection closed")]
    Disconnected,

    /// Send failed
    #[error("Failed to send: {0}")]
    SendFailed(String),

    /// Receive failed
    #[error("Failed to receive: {0}")]
    ReceiveFailed(String),

    /// Invalid data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// No key to open or seal a payload for this topic
    #[error("No key for topic {0}")]
    UnknownTopicKey(String),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Source of per-topic keys for relay clients that seal payloads
pub trait TopicKeys: Send + Sync {
    /// Key that traffic on `topic` is sealed with, if one is known
    fn topic_key(&self, topic: &str) -> Option<String>;
}

/// What a relay delivers to its engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayEvent {
    /// An opened envelope and the topic it was received on
    Payload {
        /// Topic the relay delivered it on
        topic: String,
        /// Envelope text
        payload: String,
    },
    /// The connection to the relay ended
    Closed,
}

/// Abstract publish/subscribe relay
///
/// Publishing is fire-and-forget: `Ok` means the relay accepted the message,
/// not that the peer received it.
#[async_trait]
pub trait Relay: Send + Sync + 'static {
    /// Open the connection to the relay
    async fn init(&self) -> TransportResult<()>;

    /// Start receiving messages published to `topic`
    async fn subscribe(&self, topic: &str) -> TransportResult<()>;

    /// Publish envelope text to `topic`, addressed to `recipient_key`
    async fn publish(&self, topic: &str, message: &str, recipient_key: &str)
        -> TransportResult<()>;

    /// Take the inbound stream
    ///
    /// The stream is unbounded and lives as long as the relay. There is a
    /// single consumer: the first call gets it, later calls get `None`.
    fn take_inbound(&self) -> Option<mpsc::UnboundedReceiver<RelayEvent>>;
}

/// In-memory relay for testing
///
/// A hub routes messages between any number of clients by topic, the way a
/// relay server does. Every publish is also recorded for inspection.
pub mod memory {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// A message accepted by the hub
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct Published {
        /// Topic it was published to
        pub topic: String,
        /// Envelope text
        pub message: String,
        /// Key the sender addressed it to
        pub recipient_key: String,
    }

    #[derive(Default)]
    struct HubState {
        /// topic -> (client id, client inbound channel)
        subscriptions: HashMap<String, Vec<(usize, mpsc::UnboundedSender<RelayEvent>)>>,
        published: Vec<Published>,
        next_client: usize,
        offline: bool,
    }

    /// Shared routing table for in-memory relay clients
    #[derive(Clone, Default)]
    pub struct MemoryHub {
        state: Arc<Mutex<HubState>>,
    }

    impl MemoryHub {
        /// Create an empty hub
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a client attached to this hub
        pub fn client(&self) -> MemoryRelay {
            let id = {
                let mut state = self.state.lock();
                state.next_client += 1;
                state.next_client
            };
            let (inbound, receiver) = mpsc::unbounded_channel();

            MemoryRelay {
                id,
                hub: self.clone(),
                inbound,
                receiver: Mutex::new(Some(receiver)),
                connected: AtomicBool::new(false),
            }
        }

        /// Everything published so far, in order
        pub fn published(&self) -> Vec<Published> {
            self.state.lock().published.clone()
        }

        /// Messages published to `topic`
        pub fn published_to(&self, topic: &str) -> Vec<Published> {
            self.state
                .lock()
                .published
                .iter()
                .filter(|p| p.topic == topic)
                .cloned()
                .collect()
        }

        /// Whether any client subscribed to `topic`
        pub fn has_subscribers(&self, topic: &str) -> bool {
            self.state
                .lock()
                .subscriptions
                .get(topic)
                .map_or(false, |subs| !subs.is_empty())
        }

        /// Simulate the relay going down (or coming back)
        pub fn set_offline(&self, offline: bool) {
            self.state.lock().offline = offline;
        }

        fn is_offline(&self) -> bool {
            self.state.lock().offline
        }
    }

    /// In-memory relay client
    pub struct MemoryRelay {
        id: usize,
        hub: MemoryHub,
        inbound: mpsc::UnboundedSender<RelayEvent>,
        receiver: Mutex<Option<mpsc::UnboundedReceiver<RelayEvent>>>,
        connected: AtomicBool,
    }

    impl MemoryRelay {
        /// Deliver a raw payload on `topic` to this client, as if the relay sent it
        pub fn inject(&self, topic: &str, payload: impl Into<String>) {
            let _ = self.inbound.send(RelayEvent::Payload {
                topic: topic.to_string(),
                payload: payload.into(),
            });
        }

        /// Drop the connection, as if the relay went away
        ///
        /// Subscriptions are kept; `init` reconnects.
        pub fn close(&self) {
            if self.connected.swap(false, Ordering::SeqCst) {
                let _ = self.inbound.send(RelayEvent::Closed);
            }
        }

        fn check_connected(&self) -> TransportResult<()> {
            if !self.connected.load(Ordering::SeqCst) {
                return Err(TransportError::Disconnected);
            }
            if self.hub.is_offline() {
                return Err(TransportError::ConnectionFailed("relay offline".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Relay for MemoryRelay {
        async fn init(&self) -> TransportResult<()> {
            if self.hub.is_offline() {
                return Err(TransportError::ConnectionFailed("relay offline".to_string()));
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn subscribe(&self, topic: &str) -> TransportResult<()> {
            self.check_connected()?;

            let mut state = self.hub.state.lock();
            let subs = state.subscriptions.entry(topic.to_string()).or_default();
            if !subs.iter().any(|(id, _)| *id == self.id) {
                subs.push((self.id, self.inbound.clone()));
            }
            Ok(())
        }

        async fn publish(
            &self,
            topic: &str,
            message: &str,
            recipient_key: &str,
        ) -> TransportResult<()> {
            self.check_connected()?;

            let mut state = self.hub.state.lock();
            state.published.push(Published {
                topic: topic.to_string(),
                message: message.to_string(),
                recipient_key: recipient_key.to_string(),
            });

            // Deliver to every other subscriber of the topic
            if let Some(subs) = state.subscriptions.get(topic) {
                for (id, tx) in subs {
                    if *id != self.id {
                        let _ = tx.send(RelayEvent::Payload {
                            topic: topic.to_string(),
                            payload: message.to_string(),
                        });
                    }
                }
            }
            Ok(())
        }

        fn take_inbound(&self) -> Option<mpsc::UnboundedReceiver<RelayEvent>> {
            self.receiver.lock().take()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryHub;
    use super::*;

    fn payload(topic: &str, text: &str) -> RelayEvent {
        RelayEvent::Payload {
            topic: topic.to_string(),
            payload: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_memory_relay_routes_by_topic() {
        let hub = MemoryHub::new();
        let alice = hub.client();
        let bob = hub.client();
        let carol = hub.client();

        for client in [&alice, &bob, &carol] {
            client.init().await.unwrap();
        }
        alice.subscribe("t1").await.unwrap();
        bob.subscribe("t1").await.unwrap();
        carol.subscribe("t2").await.unwrap();

        let mut bob_rx = bob.take_inbound().unwrap();
        let mut carol_rx = carol.take_inbound().unwrap();
        let mut alice_rx = alice.take_inbound().unwrap();

        alice.publish("t1", "hello", "key").await.unwrap();

        assert_eq!(bob_rx.recv().await.unwrap(), payload("t1", "hello"));
        assert!(carol_rx.try_recv().is_err());
        // Publishers do not hear their own messages
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_memory_relay_records_publishes() {
        let hub = MemoryHub::new();
        let alice = hub.client();
        alice.init().await.unwrap();

        alice.publish("t1", "one", "k1").await.unwrap();
        alice.publish("t2", "two", "k2").await.unwrap();

        assert_eq!(hub.published().len(), 2);
        let to_t2 = hub.published_to("t2");
        assert_eq!(to_t2.len(), 1);
        assert_eq!(to_t2[0].recipient_key, "k2");
    }

    #[tokio::test]
    async fn test_memory_relay_requires_init() {
        let hub = MemoryHub::new();
        let alice = hub.client();

        assert!(matches!(
            alice.publish("t", "m", "k").await,
            Err(TransportError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_memory_relay_offline() {
        let hub = MemoryHub::new();
        let alice = hub.client();
        alice.init().await.unwrap();

        hub.set_offline(true);
        assert!(alice.subscribe("t").await.is_err());
        assert!(alice.publish("t", "m", "k").await.is_err());

        hub.set_offline(false);
        assert!(alice.publish("t", "m", "k").await.is_ok());
    }

    #[tokio::test]
    async fn test_inject() {
        let hub = MemoryHub::new();
        let alice = hub.client();
        let mut rx = alice.take_inbound().unwrap();

        alice.inject("t", "raw");
        assert_eq!(rx.recv().await.unwrap(), payload("t", "raw"));
    }

    #[test]
    fn test_inbound_has_one_consumer() {
        let alice = MemoryHub::new().client();

        assert!(alice.take_inbound().is_some());
        assert!(alice.take_inbound().is_none());
    }

    #[test]
    fn test_inbound_keeps_every_payload() {
        let alice = MemoryHub::new().client();
        let mut rx = alice.take_inbound().unwrap();

        for i in 0..1000 {
            alice.inject("t", i.to_string());
        }

        for i in 0..1000 {
            assert_eq!(rx.try_recv().unwrap(), payload("t", &i.to_string()));
        }
    }

    #[tokio::test]
    async fn test_close_reports_once() {
        let alice = MemoryHub::new().client();
        let mut rx = alice.take_inbound().unwrap();
        alice.init().await.unwrap();

        alice.close();
        alice.close();

        assert_eq!(rx.try_recv().unwrap(), RelayEvent::Closed);
        assert!(rx.try_recv().is_err());
        assert!(matches!(
            alice.publish("t", "m", "k").await,
            Err(TransportError::Disconnected)
        ));
    }
}
