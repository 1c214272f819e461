//! Protocol engine error types

use thiserror::Error;

use super::message::RelayMessageType;
use crate::transport::TransportError;

/// Errors surfaced by the protocol engine
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A message was addressed to a topic with no registered key
    #[error("No key registered for topic {0}")]
    UnknownTopic(String),

    /// An envelope could not be encoded or decoded
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// A pairing string could not be decoded
    #[error("Invalid pairing descriptor: {0}")]
    InvalidDescriptor(String),

    /// The relay failed to initialize, subscribe or publish
    #[error("Relay failure: {0}")]
    TransportFailure(#[from] TransportError),

    /// A response arrived with no request waiting for it
    #[error("No pending request for {kind} (msg_id: {msg_id})")]
    NoPendingRequest {
        /// Kind of the stray response
        kind: RelayMessageType,
        /// Request id the response referred to, if any
        msg_id: String,
    },

    /// The operation needs `init` to have run first
    #[error("Engine has not been initialized")]
    NotInitialized,

    /// No response arrived before the request deadline
    #[error("Timed out waiting for {0}")]
    Timeout(RelayMessageType),

    /// The engine went away while a request was waiting
    #[error("Request cancelled before a response arrived")]
    Cancelled,
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
