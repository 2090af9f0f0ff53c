use std::time::Duration;

use serde_json::{json, Value};

use dapp_bridge_core::{ChainDescriptor, PortError};

use crate::BridgeConfig;

/// Fetches the live runtime spec version from a chain node over JSON-RPC.
#[derive(Debug, Clone)]
pub struct SpecVersionClient {
    http: reqwest::Client,
}

impl SpecVersionClient {
    pub fn with_config(config: &BridgeConfig) -> Result<Self, PortError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.spec_version_timeout_ms))
            .build()
            .map_err(|e| PortError::Transport(format!("failed to build rpc client: {e}")))?;
        Ok(Self { http })
    }

    pub async fn fetch_spec_version(&self, chain: &ChainDescriptor) -> Result<u32, PortError> {
        let node_url = chain
            .node_url
            .as_deref()
            .ok_or_else(|| PortError::NotFound(format!("no node url for {}", chain.name)))?;
        let url = http_endpoint(node_url);

        let body = json!({
            "id": 1,
            "jsonrpc": "2.0",
            "method": "state_getRuntimeVersion",
            "params": []
        });

        let resp: Value = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| PortError::Transport(format!("runtime version request failed: {e}")))?
            .json()
            .await
            .map_err(|e| PortError::Transport(format!("runtime version body invalid: {e}")))?;

        if let Some(err) = resp.get("error") {
            return Err(PortError::Transport(format!("runtime version rpc error: {err}")));
        }
        resp.get("result")
            .and_then(|r| r.get("specVersion"))
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| PortError::Validation("runtime version missing specVersion".to_owned()))
    }
}

/// Node URLs are usually websocket endpoints; the same host serves HTTP RPC.
fn http_endpoint(node_url: &str) -> String {
    if let Some(rest) = node_url.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = node_url.strip_prefix("ws://") {
        format!("http://{rest}")
    } else {
        node_url.to_owned()
    }
}
