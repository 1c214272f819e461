//! # walletlink
//!
//! Topic-scoped pairing and request/response messaging between a dApp and a
//! wallet, carried over a publish/subscribe relay.
//!
//! ## Features
//!
//! - **Pairing strings**: a base64 descriptor the dApp hands to the wallet
//! - **Typed envelopes** for transactions, account requests and
//!   authentication challenges
//! - **Request correlation**: requests suspend until the matching response
//!   arrives, with optional deadlines
//! - **Pluggable relay** (WebSocket, in-memory)
//! - **Session resume** from persisted state
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use walletlink::{Engine, Metadata};
//! use walletlink::transport::memory::MemoryHub;
//!
//! # async fn run() -> walletlink::ProtocolResult<()> {
//! let hub = MemoryHub::new();
//! let dapp = Engine::with_relay(hub.client());
//!
//! dapp.init(Metadata::new("My dApp", "Example", "https://example.com/icon.png"), None).await?;
//! let state = dapp.connect(None, None).await?;
//! println!("{}", dapp.generate_pairing_string(&state, "testnet", false)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 ENGINE                      │
//! │  Pairing | Requests | Dispatch | Events     │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │         PROTOCOL  +  SESSION                │
//! │  Envelopes | Codec | Topic registry         │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │             TRANSPORT LAYER                 │
//! │   WebSocket (ChaCha20-Poly1305) | Memory    │
//! └─────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod crypto;
pub mod engine;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-export main types at crate root
pub use config::EngineConfig;
pub use crypto::{CryptoError, CryptoResult, KeyMaterial};
pub use engine::{ConnectionStatus, Engine, EngineEvent, InitData};
pub use protocol::{
    ConnectionState, Metadata, PairingData, ProtocolError, ProtocolResult, RelayMessage,
    RelayMessageType,
};
pub use session::{PairedPeer, PairingState, SavedSession, Session};
pub use transport::{Relay, RelayEvent, TransportError, TransportResult};
