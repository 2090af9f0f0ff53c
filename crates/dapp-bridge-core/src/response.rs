//! Script payloads evaluated back in the page context.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::BridgeError;

pub const DEFAULT_SCRIPT_NAMESPACE: &str = "window.walletExtension";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptResponse {
    pub content: String,
}

#[derive(Debug, Error)]
#[error("failed to encode bridge payload: {0}")]
pub struct EncodingError(#[from] serde_json::Error);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEncoder {
    namespace: String,
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_SCRIPT_NAMESPACE)
    }
}

impl ResponseEncoder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn response<T: Serialize + ?Sized>(
        &self,
        identifier: &str,
        result: &T,
    ) -> Result<ScriptResponse, EncodingError> {
        let id = serde_json::to_string(identifier)?;
        let content = serde_json::to_string(result)?;
        Ok(self.script(format!("onAppResponse({id}, {content}, null)")))
    }

    pub fn error(
        &self,
        identifier: &str,
        error: &BridgeError,
    ) -> Result<ScriptResponse, EncodingError> {
        let id = serde_json::to_string(identifier)?;
        let payload = serde_json::to_string(&serde_json::json!({
            "kind": error.kind(),
            "message": error.page_message(),
        }))?;
        Ok(self.script(format!("onAppResponse({id}, null, {payload})")))
    }

    /// Pushes have no error channel.
    pub fn subscription_push<T: Serialize + ?Sized>(
        &self,
        request_id: &str,
        result: &T,
    ) -> Result<ScriptResponse, EncodingError> {
        let id = serde_json::to_string(request_id)?;
        let content = serde_json::to_string(result)?;
        Ok(self.script(format!("onAppSubscription({id}, {content})")))
    }

    fn script(&self, call: String) -> ScriptResponse {
        ScriptResponse {
            content: format!("{}.{call}", self.namespace),
        }
    }
}

/// Serializes a typed result into a JSON value for an outbound effect.
pub(crate) fn to_payload<T: Serialize>(result: &T) -> Result<Value, EncodingError> {
    Ok(serde_json::to_value(result)?)
}
