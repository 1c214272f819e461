//! Requests, responses, and inbound routing

use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Engine, EngineEvent};
use crate::protocol::{
    codec, Acknowledge, AdditionalAccountRequest, AdditionalAccountResponse, ApprovePairing,
    AuthenticationPayload, AuthenticationRequest, AuthenticationResponse, ProtocolError,
    ProtocolResult, RelayMessage, RelayMessageType, Transaction, TransactionResponse,
};
use crate::transport::Relay;

impl<R: Relay> Engine<R> {
    /// Ask the wallet to sign `transaction` and wait for its answer
    ///
    /// `timeout` overrides the configured default deadline.
    pub async fn send_transaction(
        &self,
        topic: &str,
        transaction: Transaction,
        timeout: Option<Duration>,
    ) -> ProtocolResult<TransactionResponse> {
        match self.request(topic, transaction.into(), timeout).await? {
            RelayMessage::TransactionResponse(response) => Ok(response),
            other => Err(unexpected(other)),
        }
    }

    /// Ask the wallet for more accounts and wait for them
    pub async fn request_additional_accounts(
        &self,
        topic: &str,
        request: AdditionalAccountRequest,
        timeout: Option<Duration>,
    ) -> ProtocolResult<AdditionalAccountResponse> {
        match self.request(topic, request.into(), timeout).await? {
            RelayMessage::AdditionalAccountResponse(response) => Ok(response),
            other => Err(unexpected(other)),
        }
    }

    /// Send an authentication challenge signed by `server_signing_account`
    /// and wait for the user's signature
    pub async fn authenticate(
        &self,
        topic: &str,
        account_to_sign: &str,
        server_signing_account: &str,
        server_signature: &[u8],
        payload: AuthenticationPayload,
        timeout: Option<Duration>,
    ) -> ProtocolResult<AuthenticationResponse> {
        let request = AuthenticationRequest {
            id: String::new(),
            topic: topic.to_string(),
            account_to_sign: account_to_sign.to_string(),
            server_signing_account: server_signing_account.to_string(),
            server_signature: server_signature.to_vec(),
            payload,
        };

        match self.request(topic, request.into(), timeout).await? {
            RelayMessage::AuthenticationResponse(response) => Ok(response),
            other => Err(unexpected(other)),
        }
    }

    /// Answer a transaction request; returns the response's message id
    pub async fn send_transaction_response(
        &self,
        topic: &str,
        response: TransactionResponse,
    ) -> ProtocolResult<String> {
        self.publish(topic, response).await
    }

    /// Answer an additional-account request; returns the response's message id
    pub async fn send_additional_accounts(
        &self,
        topic: &str,
        response: AdditionalAccountResponse,
    ) -> ProtocolResult<String> {
        self.publish(topic, response).await
    }

    /// Answer an authentication challenge; returns the response's message id
    pub async fn send_authentication_response(
        &self,
        topic: &str,
        response: AuthenticationResponse,
    ) -> ProtocolResult<String> {
        self.publish(topic, response).await
    }

    /// Acknowledge message `msg_id`, addressed to `peer_key`
    pub async fn acknowledge(&self, topic: &str, peer_key: &str, msg_id: &str) -> ProtocolResult<()> {
        let ack = Acknowledge {
            id: String::new(),
            topic: topic.to_string(),
            result: true,
            msg_id: msg_id.to_string(),
        };

        self.publish_to(topic, ack, peer_key).await?;
        Ok(())
    }

    /// Fail every waiting request with `Cancelled`
    ///
    /// Returns how many requests were waiting.
    pub fn cancel_pending(&self) -> usize {
        let cancelled = self.inner.pending.clear();
        if cancelled > 0 {
            info!(cancelled, "Cancelled pending requests");
        }
        cancelled
    }

    /// Decode a message that arrived outside the relay
    pub fn decode_local_message(payload: &str) -> ProtocolResult<RelayMessage> {
        codec::decode(payload).map(|(message, _)| message)
    }

    /// Route one envelope received on `topic`
    ///
    /// Responses complete their waiting request; everything else is
    /// broadcast. An envelope naming a topic other than the one it arrived on
    /// is refused. Malformed input and stray responses come back as errors
    /// for the caller to log; the engine's state is unaffected either way.
    pub async fn handle_payload(
        &self,
        topic: &str,
        payload: &str,
    ) -> ProtocolResult<RelayMessageType> {
        if payload.is_empty() {
            return Err(ProtocolError::MalformedMessage("empty payload".to_string()));
        }

        let (message, kind) = codec::decode(payload)?;
        if message.topic() != topic {
            return Err(ProtocolError::MalformedMessage(format!(
                "{} for topic {} arrived on topic {}",
                kind,
                message.topic(),
                topic
            )));
        }
        debug!(%kind, %topic, "Received message");

        let ack = (self.config().auto_acknowledge && kind != RelayMessageType::Acknowledge)
            .then(|| message.id().to_string());

        let routed = self.route(message);

        if let Some(msg_id) = ack {
            self.auto_acknowledge(topic, &msg_id).await;
        }

        routed.map(|_| kind)
    }

    /// Send a request envelope and wait for the response that names it
    async fn request(
        &self,
        topic: &str,
        message: RelayMessage,
        timeout: Option<Duration>,
    ) -> ProtocolResult<RelayMessage> {
        let kind = message.kind();
        let expects = kind
            .response_kind()
            .ok_or_else(|| ProtocolError::MalformedMessage(format!("{} is not a request", kind)))?;

        let key = self.session().registry().resolve(topic)?;
        let (id, text) = codec::prepare(message, topic)?;

        // Armed before publishing so a fast reply cannot slip past
        let (_guard, rx) = self.inner.pending.arm(&id, topic, expects);
        self.relay().publish(topic, &text, &key).await?;
        debug!(%topic, %id, %kind, "Request sent, awaiting response");

        let received = match timeout.or_else(|| self.config().default_timeout()) {
            Some(limit) => tokio::time::timeout(limit, rx)
                .await
                .map_err(|_| ProtocolError::Timeout(expects))?,
            None => rx.await,
        };

        received.map_err(|_| ProtocolError::Cancelled)
    }

    fn route(&self, message: RelayMessage) -> ProtocolResult<()> {
        match message {
            response @ (RelayMessage::TransactionResponse(_)
            | RelayMessage::AdditionalAccountResponse(_)
            | RelayMessage::AuthenticationResponse(_)) => self.inner.pending.resolve(response),
            RelayMessage::ApprovePairing(approval) => {
                self.on_approval(&approval);
                self.emit(EngineEvent::Pairing(approval));
                Ok(())
            }
            RelayMessage::RejectPairing(rejected) => {
                self.emit(EngineEvent::PairingRejected(rejected));
                Ok(())
            }
            RelayMessage::Transaction(transaction) => {
                self.emit(EngineEvent::Transaction(transaction));
                Ok(())
            }
            RelayMessage::AdditionalAccountRequest(request) => {
                self.emit(EngineEvent::AdditionalAccountRequest(request));
                Ok(())
            }
            RelayMessage::AuthenticationRequest(request) => {
                self.emit(EngineEvent::AuthenticationRequest(request));
                Ok(())
            }
            RelayMessage::Acknowledge(ack) => {
                self.emit(EngineEvent::Acknowledge(ack));
                Ok(())
            }
        }
    }

    /// Bind the topic to the key the wallet advertised and remember the wallet
    fn on_approval(&self, approval: &ApprovePairing) {
        if let Some(key) = &approval.metadata.public_key {
            self.session()
                .registry()
                .register(approval.topic.as_str(), key.as_str());
        }

        let peer = self.session().record_peer(
            &approval.topic,
            approval.metadata.clone(),
            &approval.account_ids,
            &approval.network,
        );
        info!(
            topic = %peer.topic,
            wallet = %peer.metadata.name,
            accounts = peer.accounts.len(),
            "Paired with wallet"
        );
    }

    async fn auto_acknowledge(&self, topic: &str, msg_id: &str) {
        let key = match self.session().registry().resolve(topic) {
            Ok(key) => key,
            Err(_) => {
                debug!(%topic, "No key for topic, not acknowledging");
                return;
            }
        };

        if let Err(e) = self.acknowledge(topic, &key, msg_id).await {
            warn!(%topic, %msg_id, "Failed to acknowledge: {}", e);
        }
    }
}

fn unexpected(message: RelayMessage) -> ProtocolError {
    ProtocolError::MalformedMessage(format!("unexpected {} in response slot", message.kind()))
}
