//! Envelope encoding and decoding
//!
//! The codec turns typed messages into the JSON text handed to the relay and
//! back. Outgoing envelopes get a fresh random id and the topic they are
//! published on.

use crate::crypto::random_id;

use super::error::{ProtocolError, ProtocolResult};
use super::message::{RelayMessage, RelayMessageType};

/// Address a message to `topic` under a fresh id and encode it
///
/// Returns the assigned id together with the wire text.
pub fn prepare(message: impl Into<RelayMessage>, topic: &str) -> ProtocolResult<(String, String)> {
    let mut message = message.into();
    let id = random_id();
    message.address(id.clone(), topic);

    let text = encode(&message)?;
    Ok((id, text))
}

/// Encode an envelope as it is
pub fn encode(message: &RelayMessage) -> ProtocolResult<String> {
    serde_json::to_string(message).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
}

/// Decode wire text into an envelope and its kind
///
/// Fails with `MalformedMessage` on invalid JSON, an unknown `type`, or an
/// invalid base64 field.
pub fn decode(text: &str) -> ProtocolResult<(RelayMessage, RelayMessageType)> {
    let message: RelayMessage =
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))?;
    let kind = message.kind();
    Ok((message, kind))
}

/// Serde adapter: `Vec<u8>` as a base64 string
pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BASE64.decode(s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter: `Option<Vec<u8>>` as an optional base64 string
pub(crate) mod base64_bytes_opt {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(bytes) => serializer.serialize_some(&BASE64.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        s.map(|s| BASE64.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ID_LENGTH;
    use crate::protocol::message::*;
    use crate::protocol::pairing::Metadata;

    fn samples() -> Vec<RelayMessage> {
        vec![
            ApprovePairing {
                id: String::new(),
                topic: String::new(),
                metadata: Metadata::new("Wallet", "A wallet", "icon.png"),
                account_ids: vec!["0.0.123".into(), "0.0.456".into()],
                network: "testnet".into(),
            }
            .into(),
            Rejected {
                id: String::new(),
                topic: String::new(),
                reason: Some("no thanks".into()),
                msg_id: "m1".into(),
            }
            .into(),
            Transaction {
                id: String::new(),
                topic: String::new(),
                byte_array: vec![0, 1, 2, 254, 255],
                metadata: TransactionMetadata {
                    account_to_sign: "0.0.123".into(),
                    return_transaction: false,
                    hide_nft: Some(true),
                },
            }
            .into(),
            TransactionResponse {
                msg_id: Some("m2".into()),
                success: true,
                receipt: Some(vec![9, 8, 7]),
                signed_transaction: Some(vec![1; 64]),
                ..Default::default()
            }
            .into(),
            AdditionalAccountRequest {
                id: String::new(),
                topic: String::new(),
                network: "mainnet".into(),
                multi_account: true,
            }
            .into(),
            AdditionalAccountResponse {
                msg_id: Some("m3".into()),
                account_ids: vec!["0.0.9".into()],
                network: "mainnet".into(),
                ..Default::default()
            }
            .into(),
            AuthenticationRequest {
                id: String::new(),
                topic: String::new(),
                account_to_sign: "0.0.123".into(),
                server_signing_account: "0.0.1".into(),
                server_signature: vec![7; 64],
                payload: AuthenticationPayload {
                    url: "https://server.example".into(),
                    data: serde_json::json!({ "nonce": 42, "scope": ["read"] }),
                },
            }
            .into(),
            AuthenticationResponse {
                msg_id: Some("m4".into()),
                success: true,
                user_signature: Some(vec![3; 64]),
                signed_payload: Some(SignedPayload {
                    server_signature: vec![7; 64],
                    original_payload: AuthenticationPayload {
                        url: "https://server.example".into(),
                        data: serde_json::json!("challenge"),
                    },
                }),
                ..Default::default()
            }
            .into(),
            Acknowledge {
                id: String::new(),
                topic: String::new(),
                result: true,
                msg_id: "m5".into(),
            }
            .into(),
        ]
    }

    #[test]
    fn test_every_kind_roundtrips() {
        for message in samples() {
            let expected_kind = message.kind();
            let (id, text) = prepare(message.clone(), "topic-x").unwrap();
            let (decoded, kind) = decode(&text).unwrap();

            assert_eq!(kind, expected_kind);
            assert_eq!(decoded.id(), id);
            assert_eq!(decoded.topic(), "topic-x");

            let mut addressed = message;
            addressed.address(id, "topic-x");
            assert_eq!(decoded, addressed);
        }
    }

    #[test]
    fn test_prepare_assigns_fresh_ids() {
        let ack = Acknowledge {
            id: String::new(),
            topic: String::new(),
            result: true,
            msg_id: "m".into(),
        };
        let (id1, _) = prepare(ack.clone(), "t").unwrap();
        let (id2, _) = prepare(ack, "t").unwrap();

        assert_eq!(id1.len(), ID_LENGTH);
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_wire_shape() {
        let tx = Transaction {
            id: String::new(),
            topic: String::new(),
            byte_array: b"hello".to_vec(),
            metadata: TransactionMetadata {
                account_to_sign: "0.0.5".into(),
                return_transaction: true,
                hide_nft: None,
            },
        };
        let (_, text) = prepare(tx, "T1").unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(json["type"], "Transaction");
        assert_eq!(json["topic"], "T1");
        assert_eq!(json["byteArray"], "aGVsbG8=");
        assert_eq!(json["metadata"]["accountToSign"], "0.0.5");
        assert_eq!(json["metadata"]["returnTransaction"], true);
    }

    #[test]
    fn test_response_wire_uses_msg_id() {
        let response = TransactionResponse {
            msg_id: Some("req-1".into()),
            success: false,
            error: Some("declined".into()),
            ..Default::default()
        };
        let (_, text) = prepare(response, "T1").unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(json["msg_id"], "req-1");
        assert!(json.get("receipt").is_none());
    }

    #[test]
    fn test_decode_invalid_json() {
        assert!(matches!(
            decode("{not json"),
            Err(ProtocolError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_decode_unknown_type() {
        let text = r#"{"type":"Teleport","id":"x","topic":"t"}"#;
        assert!(matches!(decode(text), Err(ProtocolError::MalformedMessage(_))));
    }

    #[test]
    fn test_decode_bad_base64_field() {
        let text = r#"{"type":"Transaction","id":"x","topic":"t","byteArray":"%%%","metadata":{"accountToSign":"a","returnTransaction":false}}"#;
        assert!(matches!(decode(text), Err(ProtocolError::MalformedMessage(_))));
    }

    #[test]
    fn test_decode_response_without_msg_id() {
        let text = r#"{"type":"TransactionResponse","id":"x","topic":"t","success":true}"#;
        let (message, kind) = decode(text).unwrap();

        assert_eq!(kind, RelayMessageType::TransactionResponse);
        assert_eq!(message.msg_id(), None);
    }
}
