use tokio::sync::mpsc;

use dapp_bridge_core::{
    AuthorizationRequest, ErrorKind, HostUiPort, PortError, ScriptResponse, SigningRequest,
    TransportPort,
};

/// Everything a session hands to the embedding app, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutput {
    Response {
        identifier: String,
        script: ScriptResponse,
    },
    SubscriptionPush {
        request_id: String,
        script: ScriptResponse,
    },
    Error {
        identifier: String,
        kind: ErrorKind,
        script: ScriptResponse,
    },
    AuthorizationRequested(AuthorizationRequest),
    SigningRequested(SigningRequest),
    RequestCancelled {
        request_id: String,
    },
}

impl BridgeOutput {
    /// Script to evaluate in the page, if this output carries one.
    pub fn script(&self) -> Option<&ScriptResponse> {
        match self {
            Self::Response { script, .. }
            | Self::SubscriptionPush { script, .. }
            | Self::Error { script, .. } => Some(script),
            _ => None,
        }
    }
}

pub fn output_channel() -> (
    mpsc::UnboundedSender<BridgeOutput>,
    mpsc::UnboundedReceiver<BridgeOutput>,
) {
    mpsc::unbounded_channel()
}

fn send(tx: &mpsc::UnboundedSender<BridgeOutput>, output: BridgeOutput) -> Result<(), PortError> {
    tx.send(output).map_err(|_| PortError::Closed)
}

#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<BridgeOutput>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::UnboundedSender<BridgeOutput>) -> Self {
        Self { tx }
    }
}

impl TransportPort for ChannelTransport {
    fn deliver_response(&self, identifier: &str, script: ScriptResponse) -> Result<(), PortError> {
        send(
            &self.tx,
            BridgeOutput::Response {
                identifier: identifier.to_owned(),
                script,
            },
        )
    }

    fn deliver_subscription_push(
        &self,
        request_id: &str,
        script: ScriptResponse,
    ) -> Result<(), PortError> {
        send(
            &self.tx,
            BridgeOutput::SubscriptionPush {
                request_id: request_id.to_owned(),
                script,
            },
        )
    }

    fn deliver_error(
        &self,
        identifier: &str,
        kind: ErrorKind,
        script: ScriptResponse,
    ) -> Result<(), PortError> {
        send(
            &self.tx,
            BridgeOutput::Error {
                identifier: identifier.to_owned(),
                kind,
                script,
            },
        )
    }
}

#[derive(Debug, Clone)]
pub struct ChannelHostUi {
    tx: mpsc::UnboundedSender<BridgeOutput>,
}

impl ChannelHostUi {
    pub fn new(tx: mpsc::UnboundedSender<BridgeOutput>) -> Self {
        Self { tx }
    }
}

impl HostUiPort for ChannelHostUi {
    fn request_authorization(&self, request: AuthorizationRequest) -> Result<(), PortError> {
        send(&self.tx, BridgeOutput::AuthorizationRequested(request))
    }

    fn request_signing(&self, request: SigningRequest) -> Result<(), PortError> {
        send(&self.tx, BridgeOutput::SigningRequested(request))
    }

    fn cancel_request(&self, request_id: &str) {
        let cancelled = BridgeOutput::RequestCancelled {
            request_id: request_id.to_owned(),
        };
        if send(&self.tx, cancelled).is_err() {
            tracing::debug!(%request_id, "host gone before cancellation");
        }
    }
}
