use alloy::primitives::{Bytes, B256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Authorize,
    ListAccounts,
    SubscribeAccounts,
    ListMetadata,
    ProvideMetadata,
    SignExtrinsic,
    SignBytes,
}

impl MessageKind {
    pub const ALL: [MessageKind; 7] = [
        MessageKind::Authorize,
        MessageKind::ListAccounts,
        MessageKind::SubscribeAccounts,
        MessageKind::ListMetadata,
        MessageKind::ProvideMetadata,
        MessageKind::SignExtrinsic,
        MessageKind::SignBytes,
    ];

    /// Message type string used by the injected page script.
    pub fn wire_name(self) -> &'static str {
        match self {
            MessageKind::Authorize => "pub(authorize.tab)",
            MessageKind::ListAccounts => "pub(accounts.list)",
            MessageKind::SubscribeAccounts => "pub(accounts.subscribe)",
            MessageKind::ListMetadata => "pub(metadata.list)",
            MessageKind::ProvideMetadata => "pub(metadata.provide)",
            MessageKind::SignExtrinsic => "pub(extrinsic.sign)",
            MessageKind::SignBytes => "pub(bytes.sign)",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.wire_name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub origin: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDescriptor {
    pub chain: String,
    pub genesis_hash: String,
    pub spec_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ss58_format: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_decimals: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_calls: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtrinsicPayload {
    pub address: String,
    pub block_hash: String,
    pub block_number: String,
    pub era: String,
    pub genesis_hash: String,
    pub method: String,
    pub nonce: String,
    pub spec_version: String,
    pub tip: String,
    pub transaction_version: String,
    #[serde(default)]
    pub signed_extensions: Vec<String>,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBytesPayload {
    pub address: String,
    pub data: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genesis_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessagePayload {
    Authorize(AuthorizeRequest),
    ListAccounts,
    SubscribeAccounts,
    ListMetadata,
    ProvideMetadata(MetadataDescriptor),
    SignExtrinsic(ExtrinsicPayload),
    SignBytes(RawBytesPayload),
}

impl MessagePayload {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessagePayload::Authorize(_) => MessageKind::Authorize,
            MessagePayload::ListAccounts => MessageKind::ListAccounts,
            MessagePayload::SubscribeAccounts => MessageKind::SubscribeAccounts,
            MessagePayload::ListMetadata => MessageKind::ListMetadata,
            MessagePayload::ProvideMetadata(_) => MessageKind::ProvideMetadata,
            MessagePayload::SignExtrinsic(_) => MessageKind::SignExtrinsic,
            MessagePayload::SignBytes(_) => MessageKind::SignBytes,
        }
    }
}

/// One inbound request from the page, consumed exactly once.
///
/// The serde derives describe the snapshot format, not the page wire
/// format; see [`BridgeMessage::from_json`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub identifier: String,
    pub source_url: Option<String>,
    pub payload: MessagePayload,
}

impl BridgeMessage {
    pub fn new(identifier: impl Into<String>, payload: MessagePayload) -> Self {
        Self {
            identifier: identifier.into(),
            source_url: None,
            payload,
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    /// Identifier under which an authorization decision is remembered.
    ///
    /// Prefers the host of the page URL; falls back to the origin the page
    /// announced in its `Authorize` request.
    pub fn dapp_identifier(&self) -> Option<String> {
        if let Some(host) = self.source_url.as_deref().and_then(host_of) {
            return Some(host.to_owned());
        }
        match &self.payload {
            MessagePayload::Authorize(req) if !req.origin.trim().is_empty() => {
                Some(req.origin.trim().to_owned())
            }
            _ => None,
        }
    }
}

fn host_of(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let authority = rest.split(['/', '?', '#']).next()?;
    let host_port = authority.rsplit('@').next()?;
    let host = match host_port.strip_prefix('[') {
        // IPv6 literal, keep the brackets so the port split cannot cut it
        Some(inner) => {
            let end = inner.find(']')?;
            &host_port[..end + 2]
        }
        None => host_port.split(':').next()?,
    };
    if host.is_empty() || host == "[]" {
        None
    } else {
        Some(host)
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationOutcome {
    pub approved: bool,
}

impl AuthorizationOutcome {
    pub fn approved() -> Self {
        Self { approved: true }
    }

    pub fn denied() -> Self {
        Self { approved: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningOutcome {
    Approved(Bytes),
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningKind {
    Extrinsic,
    Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainMetadataRecord {
    pub genesis_hash: B256,
    pub spec_version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    pub genesis_hash: B256,
    pub name: String,
    pub address_prefix: u16,
    pub node_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genesis_hash: Option<B256>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub crypto_type: Option<String>,
}

/// Correlates an issued spec-version lookup with its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LookupTicket(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub request_id: String,
    pub dapp: Option<String>,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRequest {
    pub request_id: String,
    pub kind: SigningKind,
    pub chain: ChainDescriptor,
    pub account: Account,
    pub dapp: Option<String>,
    pub operation: Value,
}

/// Result handed back to the page for an approved signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerResult {
    pub id: u64,
    pub signature: Bytes,
}
