//! Decoding of the messages posted by the injected page script.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{BridgeMessage, MessageKind, MessagePayload};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed bridge envelope: {0}")]
    Envelope(serde_json::Error),
    #[error("unknown message type: {0}")]
    UnknownType(String),
    #[error("malformed {kind:?} request: {source}")]
    Payload {
        kind: MessageKind,
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    identifier: String,
    msg_type: String,
    #[serde(default)]
    request: Value,
    #[serde(default)]
    url: Option<String>,
}

impl BridgeMessage {
    pub fn from_json(value: Value) -> Result<Self, WireError> {
        let envelope: Envelope = serde_json::from_value(value).map_err(WireError::Envelope)?;
        let kind = MessageKind::from_wire_name(&envelope.msg_type)
            .ok_or_else(|| WireError::UnknownType(envelope.msg_type.clone()))?;
        let request = envelope.request;

        let payload = match kind {
            MessageKind::Authorize => MessagePayload::Authorize(decode(kind, request)?),
            MessageKind::ListAccounts => MessagePayload::ListAccounts,
            MessageKind::SubscribeAccounts => MessagePayload::SubscribeAccounts,
            MessageKind::ListMetadata => MessagePayload::ListMetadata,
            MessageKind::ProvideMetadata => MessagePayload::ProvideMetadata(decode(kind, request)?),
            MessageKind::SignExtrinsic => MessagePayload::SignExtrinsic(decode(kind, request)?),
            MessageKind::SignBytes => MessagePayload::SignBytes(decode(kind, request)?),
        };

        Ok(BridgeMessage {
            identifier: envelope.identifier,
            source_url: envelope.url,
            payload,
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, WireError> {
        let value = serde_json::from_str(raw).map_err(WireError::Envelope)?;
        Self::from_json(value)
    }
}

fn decode<T: DeserializeOwned>(kind: MessageKind, request: Value) -> Result<T, WireError> {
    serde_json::from_value(request).map_err(|source| WireError::Payload { kind, source })
}
