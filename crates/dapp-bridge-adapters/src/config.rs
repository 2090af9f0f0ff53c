use dapp_bridge_core::{ResponseEncoder, DEFAULT_SCRIPT_NAMESPACE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub script_namespace: String,
    pub spec_version_timeout_ms: u64,
    pub remember_authorizations: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            script_namespace: DEFAULT_SCRIPT_NAMESPACE.to_owned(),
            spec_version_timeout_ms: 15_000,
            remember_authorizations: true,
        }
    }
}

impl BridgeConfig {
    /// Reads `DAPP_BRIDGE_*` overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset, empty or unparsable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        if let Some(ns) = get("DAPP_BRIDGE_SCRIPT_NAMESPACE") {
            config.script_namespace = ns;
        }
        if let Some(ms) = get("DAPP_BRIDGE_SPEC_VERSION_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            config.spec_version_timeout_ms = ms;
        }
        if let Some(flag) = get("DAPP_BRIDGE_REMEMBER_AUTHORIZATIONS").and_then(|v| parse_flag(&v))
        {
            config.remember_authorizations = flag;
        }
        config
    }

    pub fn encoder(&self) -> ResponseEncoder {
        ResponseEncoder::new(self.script_namespace.clone())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
