use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error category visible to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ProtocolViolation,
    Unsupported,
    Rejected,
    InvalidInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),
    #[error("Unsupported")]
    Unsupported,
    #[error("PermissionRejected")]
    PermissionRejected,
    #[error("Rejected")]
    Rejected,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("lookup failed: {0}")]
    InternalLookupFailure(String),
}

impl BridgeError {
    pub const AUTH_EXPECTED: BridgeError = BridgeError::ProtocolViolation("auth expected");
    pub const BUSY_AUTHORIZING: BridgeError = BridgeError::ProtocolViolation("busy authorizing");
    pub const BUSY_NEGOTIATING: BridgeError =
        BridgeError::ProtocolViolation("busy negotiating metadata");
    pub const BUSY_SIGNING: BridgeError = BridgeError::ProtocolViolation("busy signing");

    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::ProtocolViolation(_) => ErrorKind::ProtocolViolation,
            BridgeError::Unsupported | BridgeError::InternalLookupFailure(_) => {
                ErrorKind::Unsupported
            }
            BridgeError::PermissionRejected | BridgeError::Rejected => ErrorKind::Rejected,
            BridgeError::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    /// Message shown to the page. Lookup failures never carry their cause.
    pub fn page_message(&self) -> String {
        match self {
            BridgeError::ProtocolViolation(reason) => (*reason).to_owned(),
            BridgeError::InvalidInput(detail) => detail.clone(),
            BridgeError::InternalLookupFailure(_) => BridgeError::Unsupported.to_string(),
            other => other.to_string(),
        }
    }
}
