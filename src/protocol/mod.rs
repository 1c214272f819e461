//! Wire protocol: envelopes, pairing descriptors, and their codecs
//!
//! - `message`: the typed envelopes exchanged over a topic
//! - `codec`: JSON encoding with random ids and base64 binary fields
//! - `pairing`: pairing descriptors, metadata, and sanitization
//! - `error`: the engine's error taxonomy

pub mod codec;
pub mod error;
pub mod message;
pub mod pairing;

pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    Acknowledge, AdditionalAccountRequest, AdditionalAccountResponse, ApprovePairing,
    AuthenticationPayload, AuthenticationRequest, AuthenticationResponse, Rejected, RelayMessage,
    RelayMessageType, SignedPayload, Transaction, TransactionMetadata, TransactionResponse,
};
pub use pairing::{sanitize, ConnectionState, Metadata, PairingData};
