//! Relay message types
//!
//! Every envelope is a flat JSON object with a `type` discriminator, a fresh
//! `id`, the `topic` it travels on, and the fields of its kind. Binary fields
//! are base64 strings on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::pairing::Metadata;

/// Kinds of relay messages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelayMessageType {
    /// Wallet approves a pairing request
    ApprovePairing,
    /// Pairing (or a request) was rejected
    RejectPairing,
    /// Transaction to sign
    Transaction,
    /// Result of a transaction request
    TransactionResponse,
    /// Ask the wallet for more accounts
    AdditionalAccountRequest,
    /// Accounts returned by the wallet
    AdditionalAccountResponse,
    /// Authentication challenge
    AuthenticationRequest,
    /// Answer to an authentication challenge
    AuthenticationResponse,
    /// Receipt for any other message
    Acknowledge,
}

impl RelayMessageType {
    /// Whether this kind answers an earlier request
    pub fn is_response(self) -> bool {
        matches!(
            self,
            RelayMessageType::TransactionResponse
                | RelayMessageType::AdditionalAccountResponse
                | RelayMessageType::AuthenticationResponse
        )
    }

    /// The response kind expected for a request kind
    pub fn response_kind(self) -> Option<RelayMessageType> {
        match self {
            RelayMessageType::Transaction => Some(RelayMessageType::TransactionResponse),
            RelayMessageType::AdditionalAccountRequest => {
                Some(RelayMessageType::AdditionalAccountResponse)
            }
            RelayMessageType::AuthenticationRequest => {
                Some(RelayMessageType::AuthenticationResponse)
            }
            _ => None,
        }
    }
}

impl fmt::Display for RelayMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Wallet's answer to a pairing descriptor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovePairing {
    /// Message id, assigned on send
    #[serde(default)]
    pub id: String,
    /// Topic the message travels on
    pub topic: String,
    /// Wallet metadata; `publicKey` carries the key traffic is sealed with
    pub metadata: Metadata,
    /// Accounts the wallet shares
    pub account_ids: Vec<String>,
    /// Ledger network the accounts live on
    pub network: String,
}

/// Rejection of a pairing or request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rejected {
    /// Message id, assigned on send
    #[serde(default)]
    pub id: String,
    /// Topic the message travels on
    pub topic: String,
    /// Why it was rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Id of the message being rejected
    pub msg_id: String,
}

/// Receipt for a delivered message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Acknowledge {
    /// Message id, assigned on send
    #[serde(default)]
    pub id: String,
    /// Topic the message travels on
    pub topic: String,
    /// Whether the message was accepted
    pub result: bool,
    /// Id of the message being acknowledged
    pub msg_id: String,
}

/// Signing instructions attached to a transaction
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMetadata {
    /// Account expected to sign
    pub account_to_sign: String,
    /// Return the signed transaction instead of submitting it
    pub return_transaction: bool,
    /// Ask the wallet to hide NFT details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_nft: Option<bool>,
}

/// Transaction bytes for the wallet to sign
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Message id, assigned on send
    #[serde(default)]
    pub id: String,
    /// Topic the message travels on
    pub topic: String,
    /// Serialized transaction
    #[serde(with = "super::codec::base64_bytes")]
    pub byte_array: Vec<u8>,
    /// Signing instructions
    pub metadata: TransactionMetadata,
}

/// Outcome of a transaction request
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    /// Message id, assigned on send
    #[serde(default)]
    pub id: String,
    /// Topic the message travels on
    pub topic: String,
    /// Id of the transaction request this answers
    #[serde(rename = "msg_id", default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,
    /// Whether the wallet carried out the request
    pub success: bool,
    /// Receipt when the wallet submitted the transaction
    #[serde(
        default,
        with = "super::codec::base64_bytes_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub receipt: Option<Vec<u8>>,
    /// Signed bytes when `return_transaction` was set
    #[serde(
        default,
        with = "super::codec::base64_bytes_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub signed_transaction: Option<Vec<u8>>,
    /// Failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Request for accounts beyond those shared at pairing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalAccountRequest {
    /// Message id, assigned on send
    #[serde(default)]
    pub id: String,
    /// Topic the message travels on
    pub topic: String,
    /// Ledger network the accounts live on
    pub network: String,
    /// Ask for more than one account
    pub multi_account: bool,
}

/// Accounts returned for an additional-account request
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalAccountResponse {
    /// Message id, assigned on send
    #[serde(default)]
    pub id: String,
    /// Topic the message travels on
    pub topic: String,
    /// Id of the request this answers
    #[serde(rename = "msg_id", default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,
    /// Accounts the wallet shares
    pub account_ids: Vec<String>,
    /// Ledger network the accounts live on
    pub network: String,
}

/// Data a server asks the user to sign during authentication
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationPayload {
    /// Url of the requesting server
    pub url: String,
    /// Application data to sign
    pub data: serde_json::Value,
}

/// Authentication challenge countersigned by a server account
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationRequest {
    /// Message id, assigned on send
    #[serde(default)]
    pub id: String,
    /// Topic the message travels on
    pub topic: String,
    /// Account expected to sign
    pub account_to_sign: String,
    /// Server account that countersigned the challenge
    pub server_signing_account: String,
    /// Server signature over the payload
    #[serde(with = "super::codec::base64_bytes")]
    pub server_signature: Vec<u8>,
    /// Data to sign
    pub payload: AuthenticationPayload,
}

/// The server-signed payload echoed back by the wallet
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPayload {
    /// Server signature over the payload
    #[serde(with = "super::codec::base64_bytes")]
    pub server_signature: Vec<u8>,
    /// Payload the server signed
    pub original_payload: AuthenticationPayload,
}

/// Wallet's answer to an authentication challenge
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponse {
    /// Message id, assigned on send
    #[serde(default)]
    pub id: String,
    /// Topic the message travels on
    pub topic: String,
    /// Id of the request this answers
    #[serde(rename = "msg_id", default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,
    /// Whether the wallet carried out the request
    pub success: bool,
    /// Failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// User signature over the signed payload
    #[serde(
        default,
        with = "super::codec::base64_bytes_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_signature: Option<Vec<u8>>,
    /// What the user signed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_payload: Option<SignedPayload>,
}

/// A relay envelope, tagged by `type`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayMessage {
    /// Wallet approves a pairing
    ApprovePairing(ApprovePairing),
    /// Pairing or request rejected
    RejectPairing(Rejected),
    /// Transaction to sign
    Transaction(Transaction),
    /// Answer to a transaction
    TransactionResponse(TransactionResponse),
    /// Request for more accounts
    AdditionalAccountRequest(AdditionalAccountRequest),
    /// Accounts for an earlier request
    AdditionalAccountResponse(AdditionalAccountResponse),
    /// Authentication challenge
    AuthenticationRequest(AuthenticationRequest),
    /// Answer to a challenge
    AuthenticationResponse(AuthenticationResponse),
    /// Receipt for a delivered message
    Acknowledge(Acknowledge),
}

impl RelayMessage {
    /// Kind of this envelope
    pub fn kind(&self) -> RelayMessageType {
        match self {
            RelayMessage::ApprovePairing(_) => RelayMessageType::ApprovePairing,
            RelayMessage::RejectPairing(_) => RelayMessageType::RejectPairing,
            RelayMessage::Transaction(_) => RelayMessageType::Transaction,
            RelayMessage::TransactionResponse(_) => RelayMessageType::TransactionResponse,
            RelayMessage::AdditionalAccountRequest(_) => {
                RelayMessageType::AdditionalAccountRequest
            }
            RelayMessage::AdditionalAccountResponse(_) => {
                RelayMessageType::AdditionalAccountResponse
            }
            RelayMessage::AuthenticationRequest(_) => RelayMessageType::AuthenticationRequest,
            RelayMessage::AuthenticationResponse(_) => RelayMessageType::AuthenticationResponse,
            RelayMessage::Acknowledge(_) => RelayMessageType::Acknowledge,
        }
    }

    /// Message id
    pub fn id(&self) -> &str {
        self.header().0
    }

    /// Topic the envelope travels on
    pub fn topic(&self) -> &str {
        self.header().1
    }

    /// Id of the request a response answers, if the sender named one
    pub fn msg_id(&self) -> Option<&str> {
        match self {
            RelayMessage::TransactionResponse(m) => m.msg_id.as_deref(),
            RelayMessage::AdditionalAccountResponse(m) => m.msg_id.as_deref(),
            RelayMessage::AuthenticationResponse(m) => m.msg_id.as_deref(),
            RelayMessage::RejectPairing(m) => Some(&m.msg_id),
            RelayMessage::Acknowledge(m) => Some(&m.msg_id),
            _ => None,
        }
    }

    /// Stamp the envelope with its id and topic
    pub(crate) fn address(&mut self, id: String, topic: &str) {
        let (slot_id, slot_topic) = self.header_mut();
        *slot_id = id;
        *slot_topic = topic.to_string();
    }

    fn header(&self) -> (&str, &str) {
        match self {
            RelayMessage::ApprovePairing(m) => (&m.id, &m.topic),
            RelayMessage::RejectPairing(m) => (&m.id, &m.topic),
            RelayMessage::Transaction(m) => (&m.id, &m.topic),
            RelayMessage::TransactionResponse(m) => (&m.id, &m.topic),
            RelayMessage::AdditionalAccountRequest(m) => (&m.id, &m.topic),
            RelayMessage::AdditionalAccountResponse(m) => (&m.id, &m.topic),
            RelayMessage::AuthenticationRequest(m) => (&m.id, &m.topic),
            RelayMessage::AuthenticationResponse(m) => (&m.id, &m.topic),
            RelayMessage::Acknowledge(m) => (&m.id, &m.topic),
        }
    }

    fn header_mut(&mut self) -> (&mut String, &mut String) {
        match self {
            RelayMessage::ApprovePairing(m) => (&mut m.id, &mut m.topic),
            RelayMessage::RejectPairing(m) => (&mut m.id, &mut m.topic),
            RelayMessage::Transaction(m) => (&mut m.id, &mut m.topic),
            RelayMessage::TransactionResponse(m) => (&mut m.id, &mut m.topic),
            RelayMessage::AdditionalAccountRequest(m) => (&mut m.id, &mut m.topic),
            RelayMessage::AdditionalAccountResponse(m) => (&mut m.id, &mut m.topic),
            RelayMessage::AuthenticationRequest(m) => (&mut m.id, &mut m.topic),
            RelayMessage::AuthenticationResponse(m) => (&mut m.id, &mut m.topic),
            RelayMessage::Acknowledge(m) => (&mut m.id, &mut m.topic),
        }
    }
}

macro_rules! into_relay_message {
    ($($payload:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$payload> for RelayMessage {
                fn from(payload: $payload) -> Self {
                    RelayMessage::$variant(payload)
                }
            }
        )*
    };
}

into_relay_message! {
    ApprovePairing => ApprovePairing,
    Rejected => RejectPairing,
    Transaction => Transaction,
    TransactionResponse => TransactionResponse,
    AdditionalAccountRequest => AdditionalAccountRequest,
    AdditionalAccountResponse => AdditionalAccountResponse,
    AuthenticationRequest => AuthenticationRequest,
    AuthenticationResponse => AuthenticationResponse,
    Acknowledge => Acknowledge,
}
